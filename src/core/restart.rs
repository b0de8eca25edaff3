//! # In-process restart engine.
//!
//! Re-enters the launch sequence after a clean shutdown, bounded by the
//! restart counter so a crash-restart-crash loop cannot spin forever. The
//! registry instance is reused: launch resets it and re-registers, so
//! restarts never accumulate duplicate records.

use crate::error::RuntimeError;
use crate::events::{Event, EventKind};

use super::launch::launch;
use super::orchestrator::Orchestrator;

/// Attempts an in-process restart.
///
/// Returns the restart counter value on success. Errors mean "fall back to
/// normal shutdown": either the counter exceeded its cap, configuration
/// could not be reloaded, or the relaunch itself failed.
pub(crate) async fn restart(orch: &Orchestrator) -> Result<u32, RuntimeError> {
    let count = orch.state.next_restart_count();
    let cap = orch.config().max_restarts;
    if count > cap {
        tracing::error!(count, cap, "too many restarts, refusing to relaunch");
        orch.bus
            .publish(Event::now(EventKind::RestartLimitExceeded).with_count(count));
        return Err(RuntimeError::RestartLimitExceeded { count });
    }

    tracing::info!(count, "initiating in-process restart");

    // Fresh configuration for the new run; a missing file degrades to
    // defaults exactly like the initial start.
    orch.reload_config()?;
    let cfg = orch.config();

    let specs = orch.specs.lock().unwrap().clone();
    launch(
        &cfg,
        &orch.registry,
        &orch.bus,
        &orch.state,
        &specs,
        &orch.runtime_token,
    )
    .await?;

    orch.state.clear_restart_requested();
    tracing::info!(count, "in-process restart complete");
    Ok(count)
}
