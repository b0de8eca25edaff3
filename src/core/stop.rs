//! # Dependency-ordered stop algorithm.
//!
//! Stops all `Running` subsystems such that no subsystem is stopped while
//! another *running* subsystem still lists it as a dependency: dependents
//! first, dependencies last (reverse topological order).
//!
//! ## Algorithm (iterative leaf-peeling)
//! ```text
//! loop {
//!     leaves = running subsystems with no running dependents   (under lock)
//!     if leaves is empty {
//!         if nothing is running          -> done
//!         else                           -> cycle guard:
//!                                           warn + force-stop remainder
//!                                           in insertion order, done
//!     }
//!     stop each leaf in insertion order  (outside the lock)
//!     sleep stop_pass_delay              (lets joins settle)
//! }
//! ```
//!
//! ## Per-subsystem stop sequence
//! 1. Re-check `Running` under the lock; transition to `Stopping`
//!    (idempotent no-op when another pass got there first).
//! 2. Outside the lock: cancel the subsystem's token, run its `shutdown`
//!    hook bounded by `stop_timeout`.
//! 3. Join the main worker, bounded by `stop_timeout`; on expiry the worker
//!    is force-cancelled and its worker set cleared.
//! 4. Transition to `Inactive`.
//!
//! Returns the count of subsystems stopped, for the shutdown summary.

use tokio::time::timeout;

use crate::config::Config;
use crate::events::{Bus, Event, EventKind};
use crate::registry::{SubsystemId, SubsystemRegistry};

/// Stops every running subsystem in reverse dependency order.
pub(crate) async fn stop_all_in_dependency_order(
    cfg: &Config,
    registry: &SubsystemRegistry,
    bus: &Bus,
) -> usize {
    let mut stopped = 0usize;

    loop {
        let leaves = registry.running_leaves();

        if leaves.is_empty() {
            let remaining = registry.running_ids();
            if remaining.is_empty() {
                break;
            }
            // Running subsystems but no leaves: a dependency cycle or a
            // tracking bug. Shutdown must terminate regardless, so stop the
            // remainder in insertion order.
            tracing::warn!(
                remaining = remaining.len(),
                "no stoppable leaves among running subsystems; \
                 dependency cycle or tracking bug, forcing stop in insertion order"
            );
            bus.publish(
                Event::now(EventKind::CycleDetected).with_count(remaining.len() as u32),
            );
            for id in remaining {
                if stop_one(cfg, registry, bus, id).await {
                    stopped += 1;
                }
            }
            break;
        }

        let mut any_stopped = false;
        for id in leaves {
            if stop_one(cfg, registry, bus, id).await {
                stopped += 1;
                any_stopped = true;
            }
        }

        if registry.running_count() == 0 {
            break;
        }
        if any_stopped {
            // Let asynchronous joins from this pass settle before leaf-ness
            // is re-evaluated.
            tokio::time::sleep(cfg.stop_pass_delay).await;
        }
    }

    stopped
}

/// Runs one subsystem's stop sequence.
///
/// Returns `true` when this call performed the stop, `false` when the
/// subsystem was not running (already stopped by another pass).
pub(crate) async fn stop_one(
    cfg: &Config,
    registry: &SubsystemRegistry,
    bus: &Bus,
    id: SubsystemId,
) -> bool {
    let handle = match registry.begin_stop(id) {
        Ok(Some(handle)) => handle,
        Ok(None) => return false,
        Err(e) => {
            tracing::debug!(error = %e, "stop skipped: stale subsystem id");
            return false;
        }
    };

    tracing::info!(subsystem = %handle.name, "stopping subsystem");
    bus.publish(Event::now(EventKind::SubsystemStopping).with_subsystem(handle.name.to_string()));

    // Cooperative phase: cancel, then give the shutdown hook its bounded
    // window to drain in-flight work.
    handle.cancel.cancel();
    if timeout(cfg.stop_timeout, handle.subsystem.shutdown())
        .await
        .is_err()
    {
        tracing::error!(
            subsystem = %handle.name,
            timeout = ?cfg.stop_timeout,
            "shutdown hook did not return within bound; proceeding"
        );
        bus.publish(
            Event::now(EventKind::StopTimeout)
                .with_subsystem(handle.name.to_string())
                .with_timeout(cfg.stop_timeout)
                .with_reason("shutdown hook did not return"),
        );
    }

    // Join phase: wait for the main worker, escalating to forced
    // cancellation only after the grace window elapses.
    let main = handle.main_task.lock().unwrap().take();
    if let Some(mut task) = main {
        match timeout(cfg.stop_timeout, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(join_err)) => {
                if join_err.is_panic() {
                    tracing::error!(subsystem = %handle.name, "main worker panicked");
                }
            }
            Err(_) => {
                tracing::error!(
                    subsystem = %handle.name,
                    timeout = ?cfg.stop_timeout,
                    "main worker did not exit within bound; force-cancelling"
                );
                bus.publish(
                    Event::now(EventKind::StopTimeout)
                        .with_subsystem(handle.name.to_string())
                        .with_timeout(cfg.stop_timeout)
                        .with_reason("main worker did not exit"),
                );
                task.abort();
                let _ = task.await;
                // The worker never reached its own deregistration.
                handle.workers.clear();
            }
        }
    }
    handle.workers.update_metrics();

    if let Err(e) = registry.finish_stop(id) {
        tracing::debug!(subsystem = %handle.name, error = %e, "could not record stop");
    }
    tracing::info!(subsystem = %handle.name, "subsystem stopped");
    bus.publish(Event::now(EventKind::SubsystemStopped).with_subsystem(handle.name.to_string()));
    true
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::error::InitError;
    use crate::registry::SubsystemState;
    use crate::subsystem::{Subsystem, SubsystemContext};

    struct Recorder {
        name: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Subsystem for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn init(&self, _ctx: SubsystemContext) -> Result<(), InitError> {
            Ok(())
        }

        async fn shutdown(&self) {
            self.order.lock().unwrap().push(self.name);
        }
    }

    fn test_cfg() -> Config {
        Config {
            stop_timeout: Duration::from_millis(200),
            stop_pass_delay: Duration::from_millis(1),
            ..Config::default()
        }
    }

    fn setup() -> (
        Arc<SubsystemRegistry>,
        Bus,
        Arc<Mutex<Vec<&'static str>>>,
        CancellationToken,
    ) {
        let registry = SubsystemRegistry::new(Arc::new(AtomicBool::new(true)));
        let bus = Bus::new(64);
        let order = Arc::new(Mutex::new(Vec::new()));
        (registry, bus, order, CancellationToken::new())
    }

    #[tokio::test]
    async fn stops_dependents_before_dependencies() {
        let (registry, bus, order, token) = setup();
        let reg = |name| {
            registry
                .register(
                    Arc::new(Recorder {
                        name,
                        order: Arc::clone(&order),
                    }),
                    &token,
                )
                .unwrap()
        };
        // Chain: A depends on B, B depends on C.
        let c = reg("C");
        let b = reg("B");
        let a = reg("A");
        registry.add_dependency(b, "C").unwrap();
        registry.add_dependency(a, "B").unwrap();
        for id in [c, b, a] {
            registry.force_state(id, SubsystemState::Running).unwrap();
        }

        let stopped = stop_all_in_dependency_order(&test_cfg(), &registry, &bus).await;

        assert_eq!(stopped, 3);
        assert_eq!(*order.lock().unwrap(), vec!["A", "B", "C"]);
        assert_eq!(registry.running_count(), 0);
    }

    #[tokio::test]
    async fn cycle_terminates_and_stops_everything() {
        let (registry, bus, order, token) = setup();
        let mut rx = bus.subscribe();
        let reg = |name| {
            registry
                .register(
                    Arc::new(Recorder {
                        name,
                        order: Arc::clone(&order),
                    }),
                    &token,
                )
                .unwrap()
        };
        let a = reg("A");
        let b = reg("B");
        // A depends on B, B depends on A.
        registry.add_dependency(a, "B").unwrap();
        registry.add_dependency(b, "A").unwrap();
        registry.force_state(a, SubsystemState::Running).unwrap();
        registry.force_state(b, SubsystemState::Running).unwrap();

        let stopped = stop_all_in_dependency_order(&test_cfg(), &registry, &bus).await;

        assert_eq!(stopped, 2);
        assert_eq!(registry.state_of(a).unwrap(), SubsystemState::Inactive);
        assert_eq!(registry.state_of(b).unwrap(), SubsystemState::Inactive);
        // Forced in insertion order.
        assert_eq!(*order.lock().unwrap(), vec!["A", "B"]);

        let mut saw_cycle = false;
        while let Ok(ev) = rx.try_recv() {
            saw_cycle |= ev.kind == EventKind::CycleDetected;
        }
        assert!(saw_cycle, "cycle guard should publish CycleDetected");
    }

    #[tokio::test]
    async fn stop_of_inactive_subsystem_is_a_noop() {
        let (registry, bus, order, token) = setup();
        let id = registry
            .register(
                Arc::new(Recorder {
                    name: "A",
                    order: Arc::clone(&order),
                }),
                &token,
            )
            .unwrap();

        assert!(!stop_one(&test_cfg(), &registry, &bus, id).await);
        assert!(order.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn hung_main_worker_is_force_cancelled() {
        struct Hung;

        #[async_trait]
        impl Subsystem for Hung {
            fn name(&self) -> &str {
                "Hung"
            }

            async fn init(&self, ctx: SubsystemContext) -> Result<(), InitError> {
                let workers = ctx.workers();
                ctx.spawn_main(async move {
                    workers.register_current();
                    // Ignores cancellation on purpose.
                    std::future::pending::<()>().await;
                });
                Ok(())
            }

            async fn shutdown(&self) {}
        }

        let registry = SubsystemRegistry::new(Arc::new(AtomicBool::new(true)));
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let token = CancellationToken::new();
        let id = registry.register(Arc::new(Hung), &token).unwrap();

        // Bring it up for real so the main worker exists.
        let ctx = registry.context_for(id).unwrap();
        registry.force_state(id, SubsystemState::Running).unwrap();
        let view = registry.lifecycle_views().pop().unwrap();
        view.subsystem.init(ctx).await.unwrap();
        tokio::task::yield_now().await;

        let cfg = Config {
            stop_timeout: Duration::from_millis(20),
            ..Config::default()
        };
        assert!(stop_one(&cfg, &registry, &bus, id).await);
        assert_eq!(registry.state_of(id).unwrap(), SubsystemState::Inactive);
        assert_eq!(registry.workers_of(id).unwrap().worker_count(), 0);

        let mut saw_timeout = false;
        while let Ok(ev) = rx.try_recv() {
            saw_timeout |= ev.kind == EventKind::StopTimeout;
        }
        assert!(saw_timeout, "forced cancellation should publish StopTimeout");
    }
}
