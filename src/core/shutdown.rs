//! # Graceful shutdown sequence.
//!
//! The one function every exit path funnels through. Idempotent under
//! concurrent or repeated triggers via the CAS guard in
//! [`SystemState`](super::state::SystemState): exactly one caller executes
//! the sequence, the rest are debug-logged no-ops.
//!
//! ## Sequence
//! ```text
//! claim guard (CAS)          ── repeat signals become no-ops here
//!   │
//!   ├─ log intent, record shutdown timestamps
//!   ├─ active-subsystems report
//!   ├─ landing readiness sweep          (best-effort, never gates)
//!   ├─ flip core flags (SeqCst), settle delay
//!   ├─ dependency-ordered stop
//!   ├─ release loaded configuration     (strictly after all stops)
//!   │
//!   ├─ restart requested?  ──no──► terminal summary, one-shot
//!   │                              "shutdown complete", process may exit
//!   └──yes──► re-arm guard, restart engine
//!                 │
//!                 ├─ Ok   ──► host running again
//!                 └─ Err  ──► fall back to the terminal path above
//! ```

use crate::events::{Event, EventKind};

use super::landing::landing_readiness;
use super::orchestrator::Orchestrator;
use super::restart::restart;
use super::stop::stop_all_in_dependency_order;
use super::LOG_RULE;

/// Terminal state of one `graceful_shutdown` invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ShutdownOutcome {
    /// Shutdown completed; the process is free to exit.
    Exited,
    /// The host restarted in-process and is running again.
    Restarted,
    /// Another shutdown sequence is already executing; this call did
    /// nothing.
    AlreadyInProgress,
}

/// Runs the shutdown/restart sequence.
///
/// `want_restart` marks the trigger's intent (SIGHUP vs SIGINT/SIGTERM);
/// the decision to actually restart is read back from the shared state at
/// the tail, so a restart request that arrived during an in-flight shutdown
/// is honored by the sequence that owns the guard.
pub(crate) async fn graceful_shutdown(orch: &Orchestrator, want_restart: bool) -> ShutdownOutcome {
    let state = &orch.state;
    if want_restart {
        state.request_restart();
    }

    if !state.begin_shutdown() {
        tracing::debug!("shutdown already in progress; trigger ignored");
        return ShutdownOutcome::AlreadyInProgress;
    }

    // Pin the configuration for the whole sequence; the release step below
    // only affects readers that come later.
    let cfg = orch.config();
    let restarting = state.restart_requested();
    let label = if restarting { "restart" } else { "shutdown" };

    state.record_shutdown_initiate();
    state.record_shutdown_start();

    tracing::info!("{LOG_RULE}");
    if restarting {
        tracing::info!("Initiating graceful restart sequence");
        orch.bus.publish(Event::now(EventKind::RestartRequested));
    } else {
        tracing::info!("Initiating graceful shutdown sequence");
        orch.bus.publish(Event::now(EventKind::ShutdownRequested));
    }

    tracing::info!("ACTIVE SUBSYSTEMS:");
    for line in orch.registry.running_status_report().lines() {
        tracing::info!("{line}");
    }

    let _ = landing_readiness(&orch.registry);

    // Core flags flip with SeqCst stores; give polling workers a moment to
    // observe them before their subsystems are stopped.
    state.mark_stopping();
    tokio::time::sleep(cfg.settle_delay).await;

    let stopped = stop_all_in_dependency_order(&cfg, &orch.registry, &orch.bus).await;
    tracing::info!(stopped, "primary {label} phase complete");

    // Resource teardown strictly after every subsystem that references the
    // configuration has stopped.
    orch.release_config();

    let leftover = orch.registry.running_count();
    if leftover > 0 {
        tracing::warn!(leftover, "subsystems still running after ordered stop");
    }
    state.record_shutdown_end();

    if !state.restart_requested() {
        finish_exit(orch, stopped);
        return ShutdownOutcome::Exited;
    }

    // Restart tail: re-arm the guard and the one-shot completion line for
    // the next run before handing over to the restart engine.
    state.log_shutdown_complete_once(true);
    state.clear_shutdown_guard();
    state.reset_shutdown_logged();

    match restart(orch).await {
        Ok(count) => {
            orch.bus
                .publish(Event::now(EventKind::RestartComplete).with_count(count));
            ShutdownOutcome::Restarted
        }
        Err(e) => {
            tracing::error!(error = %e, "restart failed, performing normal shutdown");
            orch.bus
                .publish(Event::now(EventKind::RestartFailed).with_reason(e.to_string()));
            state.clear_restart_requested();
            finish_exit(orch, stopped);
            ShutdownOutcome::Exited
        }
    }
}

/// Terminal exit path: final-shutdown mode, framed summary, the one-shot
/// completion line, and the `ShutdownComplete` event.
fn finish_exit(orch: &Orchestrator, stopped: usize) {
    let state = &orch.state;
    state.enter_final_shutdown();

    tracing::info!("{LOG_RULE}");
    tracing::info!("SHUTDOWN COMPLETE");
    if let Some(d) = state.shutdown_duration() {
        tracing::info!("Shutdown elapsed time:  {:.3}s", d.as_secs_f64());
    }
    if let Some(d) = state.total_running() {
        tracing::info!("Total running time:     {:.3}s", d.as_secs_f64());
    }
    if let Some(d) = state.total_elapsed() {
        tracing::info!("Total elapsed time:     {:.3}s", d.as_secs_f64());
    }
    tracing::info!("{LOG_RULE}");

    state.log_shutdown_complete_once(false);
    orch.bus
        .publish(Event::now(EventKind::ShutdownComplete).with_count(stopped as u32));
}
