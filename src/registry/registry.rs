//! # Subsystem registry: the central lifecycle table.
//!
//! The registry maps subsystem name to {state, dependency list, worker set,
//! main worker handle, lifecycle hooks}. It is created once per orchestrator
//! and reused across in-process restarts: a restart resets the table and
//! re-registers, never accumulates.
//!
//! ## Rules
//! - One mutex guards the whole table; every critical section is short.
//! - The lock is **never** held across a subsystem's `init`/`shutdown` call
//!   or while formatting reports; callers copy what they need out first.
//! - `update_state` validates transitions against the lifecycle table;
//!   `force_state` bypasses validation for fault injection.
//! - Dependencies may only reference already-registered names, which
//!   constrains the graph to a DAG over insertion order. The stop algorithm
//!   still defends against cycles at runtime.
//!
//! ## Lifecycle states
//! ```text
//! Inactive ──► Starting ──► Running ──► Stopping ──► Inactive
//!                 │            │
//!                 └──► Error ◄─┘        Error ──► Starting (fresh attempt)
//! ```

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::RegistryError;
use crate::subsystem::{MainTaskSlot, SubsystemContext, SubsystemRef};

use super::threads::WorkerSet;

/// Lifecycle state of one subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubsystemState {
    /// Registered but not started, or stopped again.
    Inactive,
    /// `init` in progress.
    Starting,
    /// `init` succeeded; the subsystem is live.
    Running,
    /// Stop sequence in progress.
    Stopping,
    /// `init` failed or the subsystem faulted while running. Recoverable
    /// only by a fresh `Starting` attempt.
    Error,
}

impl fmt::Display for SubsystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubsystemState::Inactive => "Inactive",
            SubsystemState::Starting => "Starting",
            SubsystemState::Running => "Running",
            SubsystemState::Stopping => "Stopping",
            SubsystemState::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Lifecycle state table. Same-state updates are a no-op before this check.
fn transition_allowed(from: SubsystemState, to: SubsystemState) -> bool {
    use SubsystemState::*;
    matches!(
        (from, to),
        (Inactive, Starting)
            | (Starting, Running)
            | (Starting, Error)
            | (Running, Stopping)
            | (Running, Error)
            | (Stopping, Inactive)
            | (Error, Starting)
    )
}

/// Handle to a registered subsystem.
///
/// Ids carry the registry epoch: after a restart resets the table, stale ids
/// from the previous run fail to resolve instead of aliasing new records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubsystemId {
    index: usize,
    epoch: u64,
}

struct SubsystemRecord {
    name: Arc<str>,
    state: SubsystemState,
    state_changed_at: Instant,
    dependencies: Vec<Arc<str>>,
    subsystem: SubsystemRef,
    workers: Arc<WorkerSet>,
    cancel: CancellationToken,
    main_task: MainTaskSlot,
}

/// Everything the stop sequence needs, cloned out under the lock so the
/// lock is released before `shutdown` runs.
pub(crate) struct StopHandle {
    pub name: Arc<str>,
    pub subsystem: SubsystemRef,
    pub cancel: CancellationToken,
    pub main_task: MainTaskSlot,
    pub workers: Arc<WorkerSet>,
}

/// Read-only view used by the landing readiness sweep.
pub(crate) struct LifecycleView {
    pub name: Arc<str>,
    pub state: SubsystemState,
    pub subsystem: SubsystemRef,
}

struct Inner {
    records: Vec<SubsystemRecord>,
    epoch: u64,
}

impl Inner {
    fn resolve(&self, id: SubsystemId) -> Result<&SubsystemRecord, RegistryError> {
        if id.epoch != self.epoch {
            return Err(RegistryError::UnknownId { id: id.index });
        }
        self.records
            .get(id.index)
            .ok_or(RegistryError::UnknownId { id: id.index })
    }

    fn resolve_mut(&mut self, id: SubsystemId) -> Result<&mut SubsystemRecord, RegistryError> {
        if id.epoch != self.epoch {
            return Err(RegistryError::UnknownId { id: id.index });
        }
        self.records
            .get_mut(id.index)
            .ok_or(RegistryError::UnknownId { id: id.index })
    }
}

/// Central table of subsystem lifecycle records.
pub struct SubsystemRegistry {
    inner: Mutex<Inner>,
    quiet: Arc<AtomicBool>,
}

impl SubsystemRegistry {
    /// Creates an empty registry.
    ///
    /// `quiet` is the shared final-shutdown flag forwarded to each
    /// subsystem's [`WorkerSet`].
    pub fn new(quiet: Arc<AtomicBool>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                records: Vec::new(),
                epoch: 0,
            }),
            quiet,
        })
    }

    /// Registers a subsystem in `Inactive` state.
    ///
    /// Fails if the name is already registered; the table is unchanged in
    /// that case. The subsystem's cancellation token is derived from
    /// `parent` so a runtime-wide cancel reaches every subsystem.
    pub fn register(
        &self,
        subsystem: SubsystemRef,
        parent: &CancellationToken,
    ) -> Result<SubsystemId, RegistryError> {
        let name: Arc<str> = Arc::from(subsystem.name());
        let mut inner = self.inner.lock().unwrap();
        if inner.records.iter().any(|r| r.name == name) {
            return Err(RegistryError::DuplicateName {
                name: name.to_string(),
            });
        }
        let workers = WorkerSet::new(Arc::clone(&name), Arc::clone(&self.quiet));
        let record = SubsystemRecord {
            name,
            state: SubsystemState::Inactive,
            state_changed_at: Instant::now(),
            dependencies: Vec::new(),
            subsystem,
            workers,
            cancel: parent.child_token(),
            main_task: Arc::new(Mutex::new(None)),
        };
        inner.records.push(record);
        Ok(SubsystemId {
            index: inner.records.len() - 1,
            epoch: inner.epoch,
        })
    }

    /// Appends a dependency if not already present.
    ///
    /// Fails when `dependency` is not a registered subsystem name. A
    /// duplicate is a successful no-op.
    pub fn add_dependency(
        &self,
        id: SubsystemId,
        dependency: &str,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        let dep_name = inner
            .records
            .iter()
            .find(|r| &*r.name == dependency)
            .map(|r| Arc::clone(&r.name))
            .ok_or_else(|| RegistryError::UnknownDependency {
                name: dependency.to_string(),
            })?;
        let record = inner.resolve_mut(id)?;
        if !record.dependencies.iter().any(|d| *d == dep_name) {
            record.dependencies.push(dep_name);
        }
        Ok(())
    }

    /// Transitions a subsystem to `new_state`, validating against the
    /// lifecycle table. Same-state updates are a no-op.
    pub fn update_state(
        &self,
        id: SubsystemId,
        new_state: SubsystemState,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner.resolve_mut(id)?;
        if record.state == new_state {
            return Ok(());
        }
        if !transition_allowed(record.state, new_state) {
            return Err(RegistryError::InvalidTransition {
                name: record.name.to_string(),
                from: record.state,
                to: new_state,
            });
        }
        tracing::info!(
            subsystem = %record.name,
            from = %record.state,
            to = %new_state,
            "subsystem state change"
        );
        record.state = new_state;
        record.state_changed_at = Instant::now();
        Ok(())
    }

    /// Sets a subsystem's state without transition validation.
    ///
    /// Exists for fault injection in tests and diagnostics; production
    /// paths go through [`update_state`](SubsystemRegistry::update_state).
    pub fn force_state(
        &self,
        id: SubsystemId,
        new_state: SubsystemState,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner.resolve_mut(id)?;
        if record.state != new_state {
            tracing::debug!(
                subsystem = %record.name,
                from = %record.state,
                to = %new_state,
                "subsystem state forced"
            );
            record.state = new_state;
            record.state_changed_at = Instant::now();
        }
        Ok(())
    }

    /// Current state of a subsystem.
    pub fn state_of(&self, id: SubsystemId) -> Result<SubsystemState, RegistryError> {
        Ok(self.inner.lock().unwrap().resolve(id)?.state)
    }

    /// Name a subsystem was registered under.
    pub fn name_of(&self, id: SubsystemId) -> Result<Arc<str>, RegistryError> {
        Ok(Arc::clone(&self.inner.lock().unwrap().resolve(id)?.name))
    }

    /// True when the subsystem is `Running`.
    pub fn is_running(&self, id: SubsystemId) -> bool {
        matches!(self.state_of(id), Ok(SubsystemState::Running))
    }

    /// True when a subsystem with this name is registered and `Running`.
    pub fn is_running_by_name(&self, name: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .any(|r| &*r.name == name && r.state == SubsystemState::Running)
    }

    /// Resolves a name to its id.
    pub fn id_by_name(&self, name: &str) -> Option<SubsystemId> {
        let inner = self.inner.lock().unwrap();
        inner
            .records
            .iter()
            .position(|r| &*r.name == name)
            .map(|index| SubsystemId {
                index,
                epoch: inner.epoch,
            })
    }

    /// Snapshot of a subsystem's dependencies and whether each is running.
    pub fn dependency_status(
        &self,
        id: SubsystemId,
    ) -> Result<Vec<(Arc<str>, bool)>, RegistryError> {
        let inner = self.inner.lock().unwrap();
        let record = inner.resolve(id)?;
        Ok(record
            .dependencies
            .iter()
            .map(|dep| {
                let running = inner
                    .records
                    .iter()
                    .any(|r| r.name == *dep && r.state == SubsystemState::Running);
                (Arc::clone(dep), running)
            })
            .collect())
    }

    /// Worker set of a subsystem.
    pub fn workers_of(&self, id: SubsystemId) -> Result<Arc<WorkerSet>, RegistryError> {
        Ok(Arc::clone(&self.inner.lock().unwrap().resolve(id)?.workers))
    }

    /// Running subsystems with no running dependents: the current leaves of
    /// the reversed dependency graph, in registry insertion order.
    pub fn running_leaves(&self) -> Vec<SubsystemId> {
        let inner = self.inner.lock().unwrap();
        let mut leaves = Vec::new();
        for (i, record) in inner.records.iter().enumerate() {
            if record.state != SubsystemState::Running {
                continue;
            }
            let has_running_dependent = inner.records.iter().enumerate().any(|(j, other)| {
                j != i
                    && other.state == SubsystemState::Running
                    && other.dependencies.iter().any(|d| *d == record.name)
            });
            if !has_running_dependent {
                leaves.push(SubsystemId {
                    index: i,
                    epoch: inner.epoch,
                });
            }
        }
        leaves
    }

    /// All `Running` subsystems, in registry insertion order.
    pub fn running_ids(&self) -> Vec<SubsystemId> {
        let inner = self.inner.lock().unwrap();
        inner
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.state == SubsystemState::Running)
            .map(|(index, _)| SubsystemId {
                index,
                epoch: inner.epoch,
            })
            .collect()
    }

    /// Number of `Running` subsystems.
    pub fn running_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| r.state == SubsystemState::Running)
            .count()
    }

    /// Number of registered subsystems.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-subsystem (name, state) snapshot in insertion order.
    pub fn state_snapshot(&self) -> Vec<(Arc<str>, SubsystemState)> {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .map(|r| (Arc::clone(&r.name), r.state))
            .collect()
    }

    /// Clears the table and invalidates all outstanding ids.
    ///
    /// Restart support: the registry instance survives, its contents do not.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.records.clear();
        inner.epoch += 1;
    }

    pub(crate) fn context_for(&self, id: SubsystemId) -> Result<SubsystemContext, RegistryError> {
        let inner = self.inner.lock().unwrap();
        let record = inner.resolve(id)?;
        Ok(SubsystemContext::new(
            Arc::clone(&record.name),
            record.cancel.clone(),
            Arc::clone(&record.workers),
            Arc::clone(&record.main_task),
        ))
    }

    pub(crate) fn lifecycle_views(&self) -> Vec<LifecycleView> {
        let inner = self.inner.lock().unwrap();
        inner
            .records
            .iter()
            .map(|r| LifecycleView {
                name: Arc::clone(&r.name),
                state: r.state,
                subsystem: Arc::clone(&r.subsystem),
            })
            .collect()
    }

    /// Atomically claims a subsystem for stopping.
    ///
    /// Returns `Ok(None)` when the subsystem is not `Running` (another pass
    /// already stopped it; idempotent no-op). Otherwise transitions it to
    /// `Stopping` and hands back everything the stop sequence needs, so the
    /// lock is released before `shutdown` is called.
    pub(crate) fn begin_stop(
        &self,
        id: SubsystemId,
    ) -> Result<Option<StopHandle>, RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner.resolve_mut(id)?;
        if record.state != SubsystemState::Running {
            return Ok(None);
        }
        tracing::info!(
            subsystem = %record.name,
            from = %record.state,
            to = %SubsystemState::Stopping,
            "subsystem state change"
        );
        record.state = SubsystemState::Stopping;
        record.state_changed_at = Instant::now();
        Ok(Some(StopHandle {
            name: Arc::clone(&record.name),
            subsystem: Arc::clone(&record.subsystem),
            cancel: record.cancel.clone(),
            main_task: Arc::clone(&record.main_task),
            workers: Arc::clone(&record.workers),
        }))
    }

    /// Completes a stop sequence: `Stopping` -> `Inactive`.
    pub(crate) fn finish_stop(&self, id: SubsystemId) -> Result<(), RegistryError> {
        self.update_state(id, SubsystemState::Inactive)
    }

    /// Formats all `Running` subsystems with uptime and worker count.
    ///
    /// Fields are copied out under the lock; metrics refresh and formatting
    /// happen after it is released.
    pub fn running_status_report(&self) -> String {
        let (total, entries): (usize, Vec<(Arc<str>, Duration, Arc<WorkerSet>)>) = {
            let inner = self.inner.lock().unwrap();
            let entries = inner
                .records
                .iter()
                .filter(|r| r.state == SubsystemState::Running)
                .map(|r| {
                    (
                        Arc::clone(&r.name),
                        r.state_changed_at.elapsed(),
                        Arc::clone(&r.workers),
                    )
                })
                .collect();
            (inner.records.len(), entries)
        };

        let mut report = format!("RUNNING SUBSYSTEMS ({}/{}):\n", entries.len(), total);
        for (name, uptime, workers) in entries {
            workers.update_metrics();
            report.push_str(&format!(
                "  {} - Running for {} - Workers: {}\n",
                name,
                format_uptime(uptime),
                workers.worker_count()
            ));
        }
        report
    }
}

fn format_uptime(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InitError;
    use crate::subsystem::{Subsystem, SubsystemContext};
    use async_trait::async_trait;

    struct Noop(&'static str);

    #[async_trait]
    impl Subsystem for Noop {
        fn name(&self) -> &str {
            self.0
        }

        async fn init(&self, _ctx: SubsystemContext) -> Result<(), InitError> {
            Ok(())
        }

        async fn shutdown(&self) {}
    }

    fn registry() -> Arc<SubsystemRegistry> {
        SubsystemRegistry::new(Arc::new(AtomicBool::new(true)))
    }

    fn add(reg: &SubsystemRegistry, name: &'static str) -> SubsystemId {
        reg.register(Arc::new(Noop(name)), &CancellationToken::new())
            .expect("register")
    }

    #[test]
    fn duplicate_name_is_rejected_and_table_unchanged() {
        let reg = registry();
        add(&reg, "Logging");
        assert_eq!(reg.len(), 1);
        let err = reg
            .register(Arc::new(Noop("Logging")), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName { .. }));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn dependency_must_reference_registered_name() {
        let reg = registry();
        let a = add(&reg, "WebServer");
        let err = reg.add_dependency(a, "Network").unwrap_err();
        assert!(matches!(err, RegistryError::UnknownDependency { .. }));

        add(&reg, "Network");
        reg.add_dependency(a, "Network").expect("dependency");
        // Duplicate is a successful no-op.
        reg.add_dependency(a, "Network").expect("duplicate dependency");
        assert_eq!(reg.dependency_status(a).unwrap().len(), 1);
    }

    #[test]
    fn update_state_validates_the_transition_table() {
        let reg = registry();
        let a = add(&reg, "Network");
        // Inactive -> Running skips Starting and is rejected.
        let err = reg.update_state(a, SubsystemState::Running).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidTransition { .. }));

        reg.update_state(a, SubsystemState::Starting).unwrap();
        reg.update_state(a, SubsystemState::Running).unwrap();
        reg.update_state(a, SubsystemState::Stopping).unwrap();
        reg.update_state(a, SubsystemState::Inactive).unwrap();

        // Same-state update is a no-op.
        reg.update_state(a, SubsystemState::Inactive).unwrap();
    }

    #[test]
    fn force_state_bypasses_validation() {
        let reg = registry();
        let a = add(&reg, "Network");
        reg.force_state(a, SubsystemState::Running).unwrap();
        assert!(reg.is_running(a));
        assert!(reg.is_running_by_name("Network"));
    }

    #[test]
    fn leaves_exclude_subsystems_with_running_dependents() {
        let reg = registry();
        let c = add(&reg, "Network");
        let b = add(&reg, "WebServer");
        let a = add(&reg, "WebSocket");
        reg.add_dependency(b, "Network").unwrap();
        reg.add_dependency(a, "Network").unwrap();

        for id in [c, b, a] {
            reg.force_state(id, SubsystemState::Running).unwrap();
        }

        let leaves = reg.running_leaves();
        assert_eq!(leaves, vec![b, a]);

        reg.force_state(b, SubsystemState::Inactive).unwrap();
        reg.force_state(a, SubsystemState::Inactive).unwrap();
        assert_eq!(reg.running_leaves(), vec![c]);
    }

    #[test]
    fn reset_invalidates_stale_ids() {
        let reg = registry();
        let a = add(&reg, "Network");
        reg.reset();
        assert!(reg.is_empty());
        assert!(matches!(
            reg.state_of(a),
            Err(RegistryError::UnknownId { .. })
        ));
        // Same name can be registered again after the reset.
        add(&reg, "Network");
        assert_eq!(reg.len(), 1);
    }
}
