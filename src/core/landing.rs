//! # Landing readiness sweep.
//!
//! Before the dependency-ordered stop begins, every registered subsystem is
//! asked whether it can be safely landed, and the framed Go/No-Go report is
//! logged. Landing is best-effort cleanup, not a gate like launch: the
//! aggregate verdict is an OR across subsystems, and even a sweep where
//! nothing reports ready only earns a warning; shutdown always makes
//! forward progress.

use crate::registry::{SubsystemRegistry, SubsystemState};
use crate::subsystem::{Readiness, ReadinessPhase, ReadinessResults};

use super::launch::log_readiness;
use super::LOG_RULE;

/// Runs every subsystem's landing readiness check and logs the framed
/// report. Returns the aggregate; callers consult `any_ready` but proceed
/// regardless of it.
pub(crate) fn landing_readiness(registry: &SubsystemRegistry) -> ReadinessResults {
    tracing::info!("{LOG_RULE}");
    tracing::info!("LANDING READINESS");

    let mut results = ReadinessResults::default();
    for view in registry.lifecycle_views() {
        let running = view.state == SubsystemState::Running;
        let readiness = Readiness::new(view.name.to_string())
            .require(
                running,
                "subsystem running",
                format!("subsystem {} (nothing to land)", view.state),
            )
            .merge(view.subsystem.check_landing_readiness())
            .decided(ReadinessPhase::Landing);
        log_readiness(&readiness);
        results.record(view.name, readiness.is_ready());
    }

    tracing::info!(
        checked = results.total_checked,
        ready = results.total_ready,
        not_ready = results.total_not_ready,
        "landing readiness totals"
    );
    if !results.any_ready && results.total_checked > 0 {
        tracing::warn!("no subsystems ready for landing; proceeding anyway");
    }
    results
}
