//! # Shared host state and lifecycle timing.
//!
//! [`SystemState`] is the single injected state bundle replacing what a
//! C-style host would keep as process globals: the three core phase flags
//! (`starting`/`running`/`stopping`), the shutdown idempotency guard, restart
//! bookkeeping, and the lifecycle timing record. Every orchestrator owns its
//! own instance, so multiple orchestrators can coexist in tests.
//!
//! ## Rules
//! - Phase flags use `SeqCst`: they are read by worker loops without a lock,
//!   and a store must be globally visible before the settle delay elapses.
//! - All timing fields live behind **one** mutex. Recording and deriving
//!   durations never races, no matter which thread records.
//! - The terminal "shutdown complete" line is guarded by a one-shot flag;
//!   several exit paths can reach it, exactly one logs it.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Monotonic lifecycle timestamps, all behind one lock.
#[derive(Debug, Default)]
struct LifecycleTiming {
    server_start: Option<Instant>,
    startup_complete: Option<Instant>,
    shutdown_initiate: Option<Instant>,
    shutdown_start: Option<Instant>,
    shutdown_end: Option<Instant>,
}

/// Shared host state: phase flags, shutdown guard, restart bookkeeping,
/// lifecycle timing.
pub struct SystemState {
    starting: AtomicBool,
    running: AtomicBool,
    stopping: AtomicBool,
    /// Idempotency guard: set by the first shutdown sequence, reset only
    /// when a restart is about to re-arm signal handling.
    shutdown_in_progress: AtomicBool,
    restart_requested: AtomicBool,
    restart_count: AtomicU32,
    /// Suppresses worker-management log noise once the terminal shutdown
    /// path is reached. Shared with every `WorkerSet`.
    final_shutdown: Arc<AtomicBool>,
    shutdown_logged: AtomicBool,
    timing: Mutex<LifecycleTiming>,
}

impl SystemState {
    /// Creates a fresh state bundle with all flags clear.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            starting: AtomicBool::new(false),
            running: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            shutdown_in_progress: AtomicBool::new(false),
            restart_requested: AtomicBool::new(false),
            restart_count: AtomicU32::new(0),
            final_shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_logged: AtomicBool::new(false),
            timing: Mutex::new(LifecycleTiming::default()),
        })
    }

    // --- phase flags ---

    /// Pre-launch flag set: `starting=true, running=false, stopping=false`.
    pub fn mark_starting(&self) {
        self.starting.store(true, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        self.stopping.store(false, Ordering::SeqCst);
    }

    /// Launch finished: `starting=false, running=true`.
    pub fn mark_running(&self) {
        self.starting.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        self.stopping.store(false, Ordering::SeqCst);
    }

    /// Shutdown in motion: `starting=false, running=false, stopping=true`.
    pub fn mark_stopping(&self) {
        self.starting.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        self.stopping.store(true, Ordering::SeqCst);
    }

    /// True while launch is in progress.
    pub fn is_starting(&self) -> bool {
        self.starting.load(Ordering::SeqCst)
    }

    /// True while the host is fully up.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// True while shutdown is in motion.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    // --- shutdown idempotency guard ---

    /// Claims the shutdown sequence.
    ///
    /// Returns `true` for exactly one caller until
    /// [`clear_shutdown_guard`](SystemState::clear_shutdown_guard) runs;
    /// concurrent or repeated claims get `false` and must treat the call as
    /// a no-op.
    pub fn begin_shutdown(&self) -> bool {
        self.shutdown_in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Re-arms the shutdown guard for the post-restart run.
    pub fn clear_shutdown_guard(&self) {
        self.shutdown_in_progress.store(false, Ordering::SeqCst);
    }

    // --- restart bookkeeping ---

    /// Flags that the in-flight shutdown should restart instead of exit.
    pub fn request_restart(&self) {
        self.restart_requested.store(true, Ordering::SeqCst);
    }

    /// True when a restart has been requested and not yet consumed.
    pub fn restart_requested(&self) -> bool {
        self.restart_requested.load(Ordering::SeqCst)
    }

    /// Clears the restart request after it was honored or abandoned.
    pub fn clear_restart_requested(&self) {
        self.restart_requested.store(false, Ordering::SeqCst);
    }

    /// Increments the bounded restart counter, returning the new value.
    pub fn next_restart_count(&self) -> u32 {
        self.restart_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Current restart counter value.
    pub fn restart_count(&self) -> u32 {
        self.restart_count.load(Ordering::SeqCst)
    }

    // --- terminal shutdown ---

    /// Enters final-shutdown mode, suppressing worker-management log noise.
    pub fn enter_final_shutdown(&self) {
        self.final_shutdown.store(true, Ordering::SeqCst);
    }

    /// Shared final-shutdown flag handed to worker sets.
    pub fn final_shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.final_shutdown)
    }

    /// Logs the terminal completion line exactly once.
    ///
    /// Multiple exit paths converge here; the one-shot flag keeps the line
    /// from appearing twice.
    pub fn log_shutdown_complete_once(&self, restarting: bool) {
        if self
            .shutdown_logged
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        if restarting {
            tracing::info!("cleanup phase complete");
        } else {
            tracing::info!("shutdown complete");
        }
    }

    /// Re-arms the one-shot completion line for the post-restart run.
    pub fn reset_shutdown_logged(&self) {
        self.shutdown_logged.store(false, Ordering::SeqCst);
    }

    // --- lifecycle timing ---

    /// Records the moment the host (re)entered its startup sequence.
    pub fn record_server_start(&self) {
        let mut t = self.timing.lock().unwrap();
        t.server_start = Some(Instant::now());
        t.startup_complete = None;
        t.shutdown_initiate = None;
        t.shutdown_start = None;
        t.shutdown_end = None;
    }

    /// Records the moment launch finished.
    pub fn record_startup_complete(&self) {
        self.timing.lock().unwrap().startup_complete = Some(Instant::now());
    }

    /// Records the moment a shutdown/restart was requested.
    pub fn record_shutdown_initiate(&self) {
        self.timing.lock().unwrap().shutdown_initiate = Some(Instant::now());
    }

    /// Records the moment the shutdown sequence began executing.
    pub fn record_shutdown_start(&self) {
        self.timing.lock().unwrap().shutdown_start = Some(Instant::now());
    }

    /// Records the moment the shutdown sequence finished.
    pub fn record_shutdown_end(&self) {
        self.timing.lock().unwrap().shutdown_end = Some(Instant::now());
    }

    /// Launch duration: server start to startup complete.
    pub fn startup_duration(&self) -> Option<Duration> {
        let t = self.timing.lock().unwrap();
        Some(t.startup_complete? - t.server_start?)
    }

    /// Shutdown duration: shutdown start to shutdown end.
    pub fn shutdown_duration(&self) -> Option<Duration> {
        let t = self.timing.lock().unwrap();
        Some(t.shutdown_end? - t.shutdown_start?)
    }

    /// Time spent fully up: startup complete to shutdown initiate.
    pub fn total_running(&self) -> Option<Duration> {
        let t = self.timing.lock().unwrap();
        Some(t.shutdown_initiate? - t.startup_complete?)
    }

    /// Whole lifetime: server start to shutdown end.
    pub fn total_elapsed(&self) -> Option<Duration> {
        let t = self.timing.lock().unwrap();
        Some(t.shutdown_end? - t.server_start?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_guard_claims_exactly_once() {
        let state = SystemState::new();
        assert!(state.begin_shutdown());
        assert!(!state.begin_shutdown());
        state.clear_shutdown_guard();
        assert!(state.begin_shutdown());
    }

    #[test]
    fn phase_flags_are_mutually_consistent() {
        let state = SystemState::new();
        state.mark_starting();
        assert!(state.is_starting() && !state.is_running() && !state.is_stopping());
        state.mark_running();
        assert!(!state.is_starting() && state.is_running() && !state.is_stopping());
        state.mark_stopping();
        assert!(!state.is_starting() && !state.is_running() && state.is_stopping());
    }

    #[test]
    fn timing_derives_durations_only_when_both_ends_recorded() {
        let state = SystemState::new();
        assert!(state.shutdown_duration().is_none());
        state.record_shutdown_start();
        assert!(state.shutdown_duration().is_none());
        state.record_shutdown_end();
        assert!(state.shutdown_duration().is_some());
    }

    #[test]
    fn restart_counter_is_monotonic() {
        let state = SystemState::new();
        assert_eq!(state.next_restart_count(), 1);
        assert_eq!(state.next_restart_count(), 2);
        assert_eq!(state.restart_count(), 2);
    }
}
