//! # Per-subsystem worker tracking.
//!
//! [`WorkerSet`] records which OS threads a subsystem's workers currently
//! occupy, together with a memory sample per worker. The orchestrator reads
//! the aggregates for status reports and to decide when a subsystem has
//! actually quiesced; only the owning subsystem's own workers mutate the set.
//!
//! ## Rules
//! - **Single writer**: `register_current` / `deregister_current` are called
//!   from inside the worker's own body, at start and at cleanup.
//! - **No cross-subsystem access**: each set is owned by exactly one
//!   subsystem record; no subsystem reads or mutates another's set.
//! - After a subsystem's `shutdown` returns and its main worker is joined,
//!   `worker_count` is 0.
//!
//! On Linux, workers are identified by kernel tid and memory samples come
//! from `/proc/self/task/<tid>/status`. Elsewhere the identifiers are
//! process-local and the samples are zero.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Memory sample for one worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerMemoryMetrics {
    /// Virtual bytes attributed to the worker (stack-based estimate).
    pub virtual_bytes: u64,
    /// Resident bytes attributed to the worker (stack-based estimate).
    pub resident_bytes: u64,
}

struct WorkerEntry {
    tid: i32,
    metrics: WorkerMemoryMetrics,
}

/// Set of workers owned by one subsystem.
pub struct WorkerSet {
    subsystem: Arc<str>,
    entries: Mutex<Vec<WorkerEntry>>,
    /// Suppresses registration log lines during final shutdown.
    quiet: Arc<AtomicBool>,
}

impl WorkerSet {
    /// Creates an empty set for the named subsystem.
    ///
    /// `quiet` is the shared final-shutdown flag; once it flips, worker
    /// add/remove lines stop being logged.
    pub fn new(subsystem: impl Into<Arc<str>>, quiet: Arc<AtomicBool>) -> Arc<Self> {
        Arc::new(Self {
            subsystem: subsystem.into(),
            entries: Mutex::new(Vec::new()),
            quiet,
        })
    }

    /// Registers the calling worker.
    ///
    /// Call from inside the worker body, once, at start.
    pub fn register_current(&self) {
        let tid = sys::current_tid();
        let count = {
            let mut entries = self.entries.lock().unwrap();
            entries.push(WorkerEntry {
                tid,
                metrics: WorkerMemoryMetrics::default(),
            });
            entries.len()
        };
        if !self.quiet.load(Ordering::Relaxed) {
            tracing::debug!(subsystem = %self.subsystem, tid, count, "worker registered");
        }
    }

    /// Deregisters the calling worker.
    ///
    /// Call from inside the worker body, once, at cleanup. Unknown tids are
    /// ignored (the set may already have been cleared by a forced stop).
    pub fn deregister_current(&self) {
        let tid = sys::current_tid();
        let count = {
            let mut entries = self.entries.lock().unwrap();
            if let Some(pos) = entries.iter().position(|e| e.tid == tid) {
                entries.swap_remove(pos);
            }
            entries.len()
        };
        if !self.quiet.load(Ordering::Relaxed) {
            tracing::debug!(subsystem = %self.subsystem, tid, count, "worker deregistered");
        }
    }

    /// Number of registered workers.
    pub fn worker_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Drops every entry.
    ///
    /// Used after a forced cancellation, where worker bodies never reached
    /// their own deregistration.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Resamples memory for every worker and prunes entries whose thread no
    /// longer exists.
    pub fn update_metrics(&self) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|e| sys::is_alive(e.tid));
        for entry in entries.iter_mut() {
            let stack_bytes = sys::stack_kib(entry.tid) * 1024;
            entry.metrics.virtual_bytes = stack_bytes;
            entry.metrics.resident_bytes = stack_bytes;
        }
    }

    /// Aggregated memory across all workers, as of the last
    /// [`update_metrics`](WorkerSet::update_metrics).
    pub fn memory_totals(&self) -> WorkerMemoryMetrics {
        let entries = self.entries.lock().unwrap();
        let mut totals = WorkerMemoryMetrics::default();
        for entry in entries.iter() {
            totals.virtual_bytes += entry.metrics.virtual_bytes;
            totals.resident_bytes += entry.metrics.resident_bytes;
        }
        totals
    }

    /// Name of the owning subsystem.
    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }
}

#[cfg(target_os = "linux")]
mod sys {
    pub fn current_tid() -> i32 {
        nix::unistd::gettid().as_raw()
    }

    pub fn is_alive(tid: i32) -> bool {
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(tid), None).is_ok()
    }

    /// Stack size of a thread in KiB, from `/proc/self/task/<tid>/status`.
    pub fn stack_kib(tid: i32) -> u64 {
        let path = format!("/proc/self/task/{tid}/status");
        let Ok(text) = std::fs::read_to_string(path) else {
            return 0;
        };
        for line in text.lines() {
            if let Some(rest) = line.strip_prefix("VmStk:") {
                let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
                return digits.parse().unwrap_or(0);
            }
        }
        0
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use std::sync::atomic::{AtomicI32, Ordering};

    static NEXT: AtomicI32 = AtomicI32::new(1);

    thread_local! {
        static TID: i32 = NEXT.fetch_add(1, Ordering::Relaxed);
    }

    pub fn current_tid() -> i32 {
        TID.with(|t| *t)
    }

    pub fn is_alive(_tid: i32) -> bool {
        true
    }

    pub fn stack_kib(_tid: i32) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(true))
    }

    #[test]
    fn register_and_deregister_balance() {
        let set = WorkerSet::new("Test", quiet());
        assert_eq!(set.worker_count(), 0);
        set.register_current();
        assert_eq!(set.worker_count(), 1);
        set.deregister_current();
        assert_eq!(set.worker_count(), 0);
    }

    #[test]
    fn deregister_of_unknown_worker_is_a_noop() {
        let set = WorkerSet::new("Test", quiet());
        set.deregister_current();
        assert_eq!(set.worker_count(), 0);
    }

    #[test]
    fn clear_empties_the_set() {
        let set = WorkerSet::new("Test", quiet());
        set.register_current();
        set.clear();
        assert_eq!(set.worker_count(), 0);
        assert_eq!(set.memory_totals(), WorkerMemoryMetrics::default());
    }
}
