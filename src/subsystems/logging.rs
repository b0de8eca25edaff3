//! # Logging relay subsystem.
//!
//! [`LogRelay`] is the host's logging subsystem: producers anywhere in the
//! process hand records to a [`Mailbox`] through a cloneable [`LogSender`];
//! one dedicated worker drains the mailbox and emits each record through
//! `tracing`. Errors jump the queue: records carry a priority derived from
//! their level.
//!
//! ## Lifecycle
//! - `init` spawns the drain worker (re-creating the mailbox when a
//!   previous run closed it, so the same relay instance survives in-process
//!   restarts). Idempotent: a second `init` while the worker is alive is a
//!   no-op.
//! - `shutdown` closes the mailbox; the worker drains what is queued, then
//!   exits. Closing never discards records.
//! - Landing readiness reports the pending record count.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::InitError;
use crate::queue::Mailbox;
use crate::subsystem::{Readiness, Subsystem, SubsystemContext};

/// Severity of a relayed record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl RelayLevel {
    /// Mailbox priority: higher severities drain first.
    fn priority(self) -> u8 {
        match self {
            RelayLevel::Error => 3,
            RelayLevel::Warn => 2,
            RelayLevel::Info => 1,
            RelayLevel::Debug | RelayLevel::Trace => 0,
        }
    }
}

/// One record handed to the relay.
#[derive(Clone, Debug)]
pub struct LogRecord {
    /// Severity, also the drain priority.
    pub level: RelayLevel,
    /// Which component produced the record.
    pub origin: String,
    /// The message body.
    pub message: String,
}

type SharedMailbox = Arc<Mutex<Arc<Mailbox<LogRecord>>>>;

/// Cloneable producer handle.
///
/// Valid across restarts: the handle follows the relay's current mailbox.
#[derive(Clone)]
pub struct LogSender {
    shared: SharedMailbox,
}

impl LogSender {
    /// Submits a record. Returns `false` when the relay is shut down (the
    /// record is dropped).
    pub fn submit(&self, record: LogRecord) -> bool {
        let mailbox = Arc::clone(&*self.shared.lock().unwrap());
        mailbox.push(record.level.priority(), record)
    }

    /// Submits an info-level record.
    pub fn info(&self, origin: impl Into<String>, message: impl Into<String>) -> bool {
        self.submit(LogRecord {
            level: RelayLevel::Info,
            origin: origin.into(),
            message: message.into(),
        })
    }

    /// Submits a warn-level record.
    pub fn warn(&self, origin: impl Into<String>, message: impl Into<String>) -> bool {
        self.submit(LogRecord {
            level: RelayLevel::Warn,
            origin: origin.into(),
            message: message.into(),
        })
    }

    /// Submits an error-level record.
    pub fn error(&self, origin: impl Into<String>, message: impl Into<String>) -> bool {
        self.submit(LogRecord {
            level: RelayLevel::Error,
            origin: origin.into(),
            message: message.into(),
        })
    }
}

/// The logging subsystem.
pub struct LogRelay {
    shared: SharedMailbox,
    worker_active: Arc<AtomicBool>,
}

impl LogRelay {
    /// Registered subsystem name.
    pub const NAME: &'static str = "Logging";

    /// Creates a relay with an open, empty mailbox.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Arc::new(Mailbox::new()))),
            worker_active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Producer handle for this relay.
    pub fn sender(&self) -> LogSender {
        LogSender {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Records currently queued.
    pub fn pending(&self) -> usize {
        self.shared.lock().unwrap().len()
    }

    fn emit(record: &LogRecord) {
        match record.level {
            RelayLevel::Trace => tracing::trace!(origin = %record.origin, "{}", record.message),
            RelayLevel::Debug => tracing::debug!(origin = %record.origin, "{}", record.message),
            RelayLevel::Info => tracing::info!(origin = %record.origin, "{}", record.message),
            RelayLevel::Warn => tracing::warn!(origin = %record.origin, "{}", record.message),
            RelayLevel::Error => tracing::error!(origin = %record.origin, "{}", record.message),
        }
    }
}

impl Default for LogRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subsystem for LogRelay {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn init(&self, ctx: SubsystemContext) -> Result<(), InitError> {
        if self.worker_active.swap(true, Ordering::SeqCst) {
            // Already running: idempotent no-op.
            return Ok(());
        }

        let mailbox = {
            let mut shared = self.shared.lock().unwrap();
            if shared.is_closed() {
                // Previous run closed the mailbox; start fresh.
                *shared = Arc::new(Mailbox::new());
            }
            Arc::clone(&*shared)
        };

        let cancel = ctx.cancel_token();
        let workers = ctx.workers();
        let active = Arc::clone(&self.worker_active);
        ctx.spawn_main(async move {
            workers.register_current();
            loop {
                tokio::select! {
                    record = mailbox.recv() => match record {
                        Some(record) => LogRelay::emit(&record),
                        None => break,
                    },
                    _ = cancel.cancelled() => break,
                }
            }
            // Flush whatever is still queued before exiting.
            while let Some(record) = mailbox.try_recv() {
                LogRelay::emit(&record);
            }
            workers.deregister_current();
            active.store(false, Ordering::SeqCst);
        });
        Ok(())
    }

    async fn shutdown(&self) {
        self.shared.lock().unwrap().close();
    }

    fn check_landing_readiness(&self) -> Readiness {
        let pending = self.pending();
        Readiness::new(Self::NAME).go(format!("{pending} record(s) pending flush"))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::registry::WorkerSet;
    use crate::subsystem::MainTaskSlot;

    fn context(relay_name: &str) -> (SubsystemContext, MainTaskSlot) {
        let slot: MainTaskSlot = Arc::new(Mutex::new(None));
        let workers = WorkerSet::new(relay_name.to_string(), Arc::new(AtomicBool::new(true)));
        let ctx = SubsystemContext::new(
            Arc::from(relay_name),
            CancellationToken::new(),
            workers,
            Arc::clone(&slot),
        );
        (ctx, slot)
    }

    #[tokio::test]
    async fn drains_queued_records_on_shutdown() {
        let relay = LogRelay::new();
        let sender = relay.sender();
        let (ctx, slot) = context(LogRelay::NAME);
        let workers = ctx.workers();

        relay.init(ctx).await.expect("init");
        assert!(sender.info("test", "queued before shutdown"));
        assert!(sender.error("test", "errors jump the queue"));

        relay.shutdown().await;
        let main = slot.lock().unwrap().take().expect("main worker spawned");
        tokio::time::timeout(Duration::from_secs(1), main)
            .await
            .expect("worker exits")
            .expect("no panic");

        assert_eq!(relay.pending(), 0);
        assert_eq!(workers.worker_count(), 0);
        // Closed relay rejects further records.
        assert!(!sender.info("test", "late"));
    }

    #[tokio::test]
    async fn reinit_after_shutdown_reopens_the_mailbox() {
        let relay = LogRelay::new();
        let sender = relay.sender();

        let (ctx, slot) = context(LogRelay::NAME);
        relay.init(ctx).await.expect("init");
        relay.shutdown().await;
        let main = slot.lock().unwrap().take().expect("main worker");
        main.await.expect("worker exits");

        let (ctx, slot) = context(LogRelay::NAME);
        relay.init(ctx).await.expect("re-init");
        assert!(sender.info("test", "accepted again"));

        relay.shutdown().await;
        let main = slot.lock().unwrap().take().expect("main worker");
        main.await.expect("worker exits");
    }

    #[test]
    fn landing_readiness_reports_pending_count() {
        let relay = LogRelay::new();
        relay.sender().info("test", "one");
        let readiness = relay.check_landing_readiness();
        assert!(readiness.is_ready());
        assert!(readiness.messages()[0].contains("1 record(s)"));
    }
}
