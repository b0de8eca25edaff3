//! # Lifecycle events emitted by the orchestrator.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Subsystem lifecycle**: starting, running, failed, stopping, stopped
//! - **Shutdown/restart flow**: requested, complete, failed, limit exceeded
//! - **Stop-algorithm diagnostics**: stop timeout, dependency cycle detected
//!
//! The [`Event`] struct carries additional metadata such as timestamps,
//! subsystem name, reasons, timeouts and counts.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Shutdown / restart flow ===
    /// Shutdown requested (OS signal observed or `ControlHandle` call).
    ShutdownRequested,

    /// Restart requested (SIGHUP observed or `ControlHandle` call).
    RestartRequested,

    /// The full shutdown sequence finished; the process is free to exit.
    ///
    /// Sets: `count` (subsystems stopped).
    ShutdownComplete,

    /// An in-process restart finished and the host is running again.
    ///
    /// Sets: `count` (restart counter value).
    RestartComplete,

    /// A restart was attempted and failed; the host fell back to a normal
    /// shutdown.
    ///
    /// Sets: `reason`.
    RestartFailed,

    /// The restart counter exceeded its cap; the request degraded to a
    /// normal shutdown.
    ///
    /// Sets: `count` (counter value at refusal).
    RestartLimitExceeded,

    // === Subsystem lifecycle ===
    /// A subsystem's `init` hook is about to run.
    ///
    /// Sets: `subsystem`.
    SubsystemStarting,

    /// A subsystem finished `init` and is now `Running`.
    ///
    /// Sets: `subsystem`.
    SubsystemRunning,

    /// A subsystem failed to start (readiness No-Go, init error or timeout).
    ///
    /// Sets: `subsystem`, `reason`.
    SubsystemFailed,

    /// A subsystem's stop sequence began; its `shutdown` hook is about to
    /// run.
    ///
    /// Sets: `subsystem`.
    SubsystemStopping,

    /// A subsystem's stop sequence completed; it is `Inactive` and its main
    /// worker has been joined.
    ///
    /// Sets: `subsystem`.
    SubsystemStopped,

    // === Stop-algorithm diagnostics ===
    /// A subsystem did not quiesce within its bound and its main worker was
    /// force-cancelled.
    ///
    /// Sets: `subsystem`, `timeout_ms`, `reason`.
    StopTimeout,

    /// The leaf-peeling stop found running subsystems but no leaves; the
    /// remainder was force-stopped in insertion order.
    ///
    /// Sets: `count` (subsystems force-stopped).
    CycleDetected,
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the subsystem, if applicable.
    pub subsystem: Option<Arc<str>>,
    /// Human-readable reason (init errors, timeout details, etc.).
    pub reason: Option<Arc<str>>,
    /// Timeout bound in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Generic count (subsystems stopped, restart counter, ...).
    pub count: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            subsystem: None,
            reason: None,
            timeout_ms: None,
            count: None,
        }
    }

    /// Attaches a subsystem name.
    #[inline]
    pub fn with_subsystem(mut self, name: impl Into<Arc<str>>) -> Self {
        self.subsystem = Some(name.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout bound (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Attaches a count.
    #[inline]
    pub fn with_count(mut self, n: u32) -> Self {
        self.count = Some(n);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::now(EventKind::ShutdownRequested);
        let b = Event::now(EventKind::ShutdownRequested);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_set_fields() {
        let ev = Event::now(EventKind::StopTimeout)
            .with_subsystem("WebSocket")
            .with_timeout(Duration::from_secs(2))
            .with_reason("main worker did not exit");
        assert_eq!(ev.subsystem.as_deref(), Some("WebSocket"));
        assert_eq!(ev.timeout_ms, Some(2000));
        assert!(ev.reason.is_some());
    }
}
