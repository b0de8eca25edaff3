//! # Per-subsystem runtime context.
//!
//! A [`SubsystemContext`] is handed to a subsystem's `init` hook. It carries
//! everything the subsystem needs to cooperate with the orchestrator: its
//! cancellation token, its worker set, and the slot for its main worker
//! handle.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::registry::WorkerSet;

/// Shared slot holding a subsystem's main worker handle.
///
/// Written by [`SubsystemContext::spawn_main`], taken by the stop sequence
/// for the bounded join.
pub(crate) type MainTaskSlot = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Runtime context for one subsystem.
///
/// Cloneable; clones refer to the same token, worker set and main-task slot.
#[derive(Clone)]
pub struct SubsystemContext {
    name: Arc<str>,
    cancel: CancellationToken,
    workers: Arc<WorkerSet>,
    main_task: MainTaskSlot,
}

impl SubsystemContext {
    pub(crate) fn new(
        name: Arc<str>,
        cancel: CancellationToken,
        workers: Arc<WorkerSet>,
        main_task: MainTaskSlot,
    ) -> Self {
        Self {
            name,
            cancel,
            workers,
            main_task,
        }
    }

    /// Name the subsystem was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This subsystem's cancellation token.
    ///
    /// Cancelled by the orchestrator when the subsystem's stop sequence
    /// begins; worker loops should select on it and exit promptly.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// This subsystem's worker set.
    ///
    /// Workers call `register_current` / `deregister_current` from inside
    /// their own bodies at start and cleanup.
    pub fn workers(&self) -> Arc<WorkerSet> {
        Arc::clone(&self.workers)
    }

    /// Spawns the subsystem's dedicated main worker and records its handle.
    ///
    /// The stop sequence joins this handle (bounded) after the subsystem's
    /// `shutdown` hook returns, and force-cancels it if the bound is
    /// exceeded. Calling `spawn_main` twice replaces the recorded handle; the
    /// previous worker keeps running until cancelled, so an `init` hook
    /// should spawn at most one main worker.
    pub fn spawn_main<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        let mut slot = self.main_task.lock().unwrap();
        if slot.is_some() {
            tracing::debug!(subsystem = %self.name, "replacing existing main worker handle");
        }
        *slot = Some(handle);
    }
}
