//! # Launch sequence.
//!
//! Brings the host from `Inactive` to `Running` in four phases, mirroring
//! the landing sequence in reverse:
//!
//! 1. **Registration**: reset the registry (restart support: reset, then
//!    re-register, never accumulate), register every spec, record declared
//!    dependencies.
//! 2. **Readiness**: run every subsystem's launch readiness check, logging
//!    the framed Go/No-Go report. Dependency-gate lines are derived from the
//!    registry snapshot; the subsystem's own check contributes the rest.
//! 3. **Start**: for each approved subsystem in registration order:
//!    `Starting` -> bounded `init` -> `Running` or `Error`. A failed
//!    *critical* subsystem aborts the launch and unwinds what already
//!    started; optional failures are logged and skipped.
//! 4. **Review**: framed summary of verdicts, the running-status report,
//!    and the startup-complete marker.

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::registry::{SubsystemId, SubsystemRegistry, SubsystemState};
use crate::subsystem::{Readiness, ReadinessPhase, ReadinessResults, SubsystemSpec};

use super::state::SystemState;
use super::stop::stop_all_in_dependency_order;
use super::LOG_RULE;

/// Runs the full launch sequence against a freshly reset registry.
pub(crate) async fn launch(
    cfg: &Config,
    registry: &SubsystemRegistry,
    bus: &Bus,
    state: &SystemState,
    specs: &[SubsystemSpec],
    runtime_token: &CancellationToken,
) -> Result<(), RuntimeError> {
    state.mark_starting();
    state.record_server_start();

    tracing::info!("{LOG_RULE}");
    tracing::info!(server = %cfg.server_name, "STARTUP");

    // The registry instance is reused across restarts; its contents are
    // not. Reset-then-reregister, never accumulate.
    registry.reset();

    // Phase 1: registration. A failed registration fails that one
    // subsystem's launch, not the whole sequence (unless it was critical,
    // which the gate below catches).
    let mut ids: Vec<Option<SubsystemId>> = Vec::with_capacity(specs.len());
    for spec in specs {
        match registry.register(spec.subsystem().clone(), runtime_token) {
            Ok(id) => {
                let mut ok = true;
                for dep in spec.dependencies() {
                    if let Err(e) = registry.add_dependency(id, dep) {
                        tracing::error!(
                            subsystem = spec.name(),
                            dependency = dep,
                            error = %e,
                            "dependency registration failed"
                        );
                        ok = false;
                    }
                }
                ids.push(ok.then_some(id));
            }
            Err(e) => {
                tracing::error!(subsystem = spec.name(), error = %e, "registration failed");
                ids.push(None);
            }
        }
    }

    // Phase 2: readiness.
    tracing::info!("{LOG_RULE}");
    tracing::info!("LAUNCH READINESS");
    let mut results = ReadinessResults::default();
    let mut approved: Vec<(usize, SubsystemId)> = Vec::new();
    for (index, spec) in specs.iter().enumerate() {
        let readiness = match ids[index] {
            Some(id) => launch_readiness_for(registry, spec, id),
            None => Readiness::new(spec.name())
                .no_go("registration failed")
                .decided(ReadinessPhase::Launch),
        };
        log_readiness(&readiness);
        results.record(readiness.subsystem().into(), readiness.is_ready());
        if readiness.is_ready() {
            if let Some(id) = ids[index] {
                approved.push((index, id));
            }
        }
    }

    // Phase 3: start approved subsystems in registration order.
    for (index, id) in approved {
        let spec = &specs[index];
        start_subsystem(cfg, registry, bus, spec, id).await;
    }

    // Critical gate: a critical subsystem that is not running by now aborts
    // the launch; everything already started is unwound.
    if let Some(spec) = specs
        .iter()
        .find(|s| s.is_critical() && !registry.is_running_by_name(s.name()))
    {
        tracing::error!(
            subsystem = spec.name(),
            "critical subsystem failed to launch; unwinding"
        );
        stop_all_in_dependency_order(cfg, registry, bus).await;
        return Err(RuntimeError::LaunchFailed {
            subsystem: spec.name().to_string(),
        });
    }

    // Phase 4: review.
    tracing::info!("{LOG_RULE}");
    tracing::info!("LAUNCH REVIEW");
    for (name, ready) in &results.results {
        if *ready {
            tracing::info!("  Go:      {name}");
        } else {
            tracing::warn!("  No-Go:   {name}");
        }
    }
    tracing::info!(
        checked = results.total_checked,
        ready = results.total_ready,
        not_ready = results.total_not_ready,
        "launch readiness totals"
    );
    for line in registry.running_status_report().lines() {
        tracing::info!("{line}");
    }

    state.mark_running();
    state.record_startup_complete();
    if let Some(d) = state.startup_duration() {
        tracing::info!(elapsed = ?d, "STARTUP COMPLETE");
    } else {
        tracing::info!("STARTUP COMPLETE");
    }
    tracing::info!("{LOG_RULE}");
    Ok(())
}

/// Composes one subsystem's launch readiness: dependency-gate lines from the
/// registry snapshot, then the subsystem's own pure check, then the Decide
/// line.
fn launch_readiness_for(
    registry: &SubsystemRegistry,
    spec: &SubsystemSpec,
    id: SubsystemId,
) -> Readiness {
    let mut readiness = Readiness::new(spec.name());
    match registry.dependency_status(id) {
        Ok(deps) => {
            for (dep, running) in deps {
                readiness = readiness.require(
                    running,
                    format!("dependency '{dep}' running"),
                    format!("dependency '{dep}' not running"),
                );
            }
        }
        Err(e) => {
            readiness = readiness.no_go(format!("dependency snapshot unavailable: {e}"));
        }
    }
    readiness
        .merge(spec.subsystem().check_launch_readiness())
        .decided(ReadinessPhase::Launch)
}

/// Logs a readiness trace: the subsystem header, then every Go/No-Go line at
/// a level matching its verdict.
pub(crate) fn log_readiness(readiness: &Readiness) {
    tracing::info!("{}", readiness.subsystem());
    for line in readiness.messages() {
        if line.contains("No-Go") {
            tracing::warn!("{line}");
        } else {
            tracing::info!("{line}");
        }
    }
}

/// Starts one approved subsystem: `Starting` -> bounded `init` -> `Running`
/// or `Error`.
async fn start_subsystem(
    cfg: &Config,
    registry: &SubsystemRegistry,
    bus: &Bus,
    spec: &SubsystemSpec,
    id: SubsystemId,
) {
    if let Err(e) = registry.update_state(id, SubsystemState::Starting) {
        tracing::error!(subsystem = spec.name(), error = %e, "cannot begin start");
        return;
    }
    bus.publish(Event::now(EventKind::SubsystemStarting).with_subsystem(spec.name().to_string()));
    tracing::info!("LAUNCH: {}", spec.name());

    let ctx = match registry.context_for(id) {
        Ok(ctx) => ctx,
        Err(e) => {
            record_failure(registry, bus, spec, id, format!("context unavailable: {e}"));
            return;
        }
    };

    match timeout(cfg.init_timeout, spec.subsystem().init(ctx)).await {
        Ok(Ok(())) => {
            if let Err(e) = registry.update_state(id, SubsystemState::Running) {
                tracing::error!(subsystem = spec.name(), error = %e, "cannot record start");
                return;
            }
            bus.publish(
                Event::now(EventKind::SubsystemRunning).with_subsystem(spec.name().to_string()),
            );
            tracing::info!(subsystem = spec.name(), "subsystem started");
        }
        Ok(Err(e)) => {
            record_failure(registry, bus, spec, id, e.to_string());
        }
        Err(_) => {
            record_failure(
                registry,
                bus,
                spec,
                id,
                format!("initialization timed out after {:?}", cfg.init_timeout),
            );
        }
    }
}

fn record_failure(
    registry: &SubsystemRegistry,
    bus: &Bus,
    spec: &SubsystemSpec,
    id: SubsystemId,
    reason: String,
) {
    tracing::error!(subsystem = spec.name(), reason = %reason, "subsystem failed to start");
    if let Err(e) = registry.update_state(id, SubsystemState::Error) {
        tracing::error!(subsystem = spec.name(), error = %e, "cannot record failure");
    }
    bus.publish(
        Event::now(EventKind::SubsystemFailed)
            .with_subsystem(spec.name().to_string())
            .with_reason(reason),
    );
}
