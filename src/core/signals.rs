//! # OS signal handling and the control channel.
//!
//! The signal watcher is deliberately thin: it owns the `tokio::signal`
//! streams and does nothing in reaction to a signal except translate it into
//! a [`Trigger`] on the orchestrator's control channel. All real shutdown
//! work runs on the orchestrator's own task, outside any signal-restricted
//! context.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` / `SIGTERM` → [`Trigger::Shutdown`]
//! - `SIGHUP` → [`Trigger::Restart`]
//!
//! **Other platforms:** Ctrl-C via [`tokio::signal::ctrl_c`] → shutdown.
//!
//! Repeated signals keep flowing onto the channel; the shutdown sequence's
//! own idempotency guard turns the extras into logged no-ops.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Control-channel message driving the orchestrator's run loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Trigger {
    /// Shut the host down and let the process exit.
    Shutdown,
    /// Shut the host down, then relaunch in-process.
    Restart,
}

/// Cloneable handle for requesting shutdown or restart without OS signals.
///
/// Embedders and tests use this where a daemon would receive SIGTERM/SIGHUP.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<Trigger>,
}

impl ControlHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Trigger>) -> Self {
        Self { tx }
    }

    /// Requests a graceful shutdown, as SIGTERM would.
    pub fn request_shutdown(&self) {
        let _ = self.tx.send(Trigger::Shutdown);
    }

    /// Requests an in-process restart, as SIGHUP would.
    pub fn request_restart(&self) {
        let _ = self.tx.send(Trigger::Restart);
    }
}

/// Spawns the signal watcher task.
///
/// Returns an error when a signal stream cannot be registered. The watcher
/// exits when `stop` is cancelled.
#[cfg(unix)]
pub(crate) fn spawn_signal_watcher(
    tx: mpsc::UnboundedSender<Trigger>,
    stop: CancellationToken,
) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::spawn(async move {
        loop {
            let trigger = tokio::select! {
                _ = stop.cancelled() => break,
                _ = sigint.recv() => Trigger::Shutdown,
                _ = sigterm.recv() => Trigger::Shutdown,
                _ = sighup.recv() => Trigger::Restart,
            };
            if tx.send(trigger).is_err() {
                break;
            }
        }
    });
    Ok(())
}

/// Spawns the signal watcher task (Ctrl-C only off Unix).
#[cfg(not(unix))]
pub(crate) fn spawn_signal_watcher(
    tx: mpsc::UnboundedSender<Trigger>,
    stop: CancellationToken,
) -> std::io::Result<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                res = tokio::signal::ctrl_c() => {
                    if res.is_err() || tx.send(Trigger::Shutdown).is_err() {
                        break;
                    }
                }
            }
        }
    });
    Ok(())
}
