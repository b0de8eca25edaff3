//! # Built-in subscriber that renders lifecycle events through `tracing`.
//!
//! [`LogWriter`] turns bus events into structured log lines. Severity follows
//! the event: force-cancellations and subscriber panics are errors, cycle
//! detection and overflow are warnings, the rest is informational.
//!
//! ## Output shape
//! ```text
//! subsystem starting subsystem="WebServer"
//! subsystem running subsystem="WebServer"
//! stop timeout, forcing cancellation subsystem="WebSocket" timeout_ms=2000
//! shutdown complete stopped=4
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Structured-logging subscriber.
///
/// Attach one of these to the orchestrator to get a readable lifecycle log
/// without writing a custom subscriber. Implement [`Subscribe`] directly for
/// metrics or alerting.
#[derive(Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    /// Creates a new log writer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    fn name(&self) -> &'static str {
        "log-writer"
    }

    async fn on_event(&self, e: &Event) {
        let subsystem = e.subsystem.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::SubsystemStarting => {
                tracing::info!(seq = e.seq, subsystem, "subsystem starting");
            }
            EventKind::SubsystemRunning => {
                tracing::info!(seq = e.seq, subsystem, "subsystem running");
            }
            EventKind::SubsystemFailed => {
                tracing::error!(
                    seq = e.seq,
                    subsystem,
                    reason = e.reason.as_deref().unwrap_or("unknown"),
                    "subsystem failed to start"
                );
            }
            EventKind::SubsystemStopping => {
                tracing::info!(seq = e.seq, subsystem, "subsystem stopping");
            }
            EventKind::SubsystemStopped => {
                tracing::info!(seq = e.seq, subsystem, "subsystem stopped");
            }
            EventKind::StopTimeout => {
                tracing::error!(
                    seq = e.seq,
                    subsystem,
                    timeout_ms = e.timeout_ms.unwrap_or(0),
                    reason = e.reason.as_deref().unwrap_or(""),
                    "stop timeout, forcing cancellation"
                );
            }
            EventKind::CycleDetected => {
                tracing::warn!(
                    seq = e.seq,
                    remaining = e.count.unwrap_or(0),
                    "dependency cycle or tracking bug detected, force-stopping remainder"
                );
            }
            EventKind::ShutdownRequested => {
                tracing::info!(seq = e.seq, "shutdown requested");
            }
            EventKind::RestartRequested => {
                tracing::info!(seq = e.seq, "restart requested");
            }
            EventKind::ShutdownComplete => {
                tracing::info!(seq = e.seq, stopped = e.count.unwrap_or(0), "shutdown complete");
            }
            EventKind::RestartComplete => {
                tracing::info!(
                    seq = e.seq,
                    restart_count = e.count.unwrap_or(0),
                    "in-process restart complete"
                );
            }
            EventKind::RestartFailed => {
                tracing::error!(
                    seq = e.seq,
                    reason = e.reason.as_deref().unwrap_or("unknown"),
                    "restart failed, falling back to shutdown"
                );
            }
            EventKind::RestartLimitExceeded => {
                tracing::error!(
                    seq = e.seq,
                    restart_count = e.count.unwrap_or(0),
                    "restart limit exceeded, performing normal shutdown"
                );
            }
        }
    }
}
