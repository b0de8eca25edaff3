//! Logging relay demo: priority drain order through the mailbox.
//!
//! Boots a host with only the logging subsystem, queues records at mixed
//! severities, then shuts down; errors drain first, the rest in FIFO order.

use std::sync::Arc;

use printvisor::{Config, LogRelay, LogWriter, Orchestrator, SubsystemSpec};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let mut config = Config::default();
    config.handle_os_signals = false;

    let orchestrator = Orchestrator::builder(config)
        .with_subscriber(Arc::new(LogWriter::new()))
        .build();

    let relay = Arc::new(LogRelay::new());
    let sender = relay.sender();

    // Queue before launch: the worker drains everything once it is up, and
    // the error-level record jumps ahead of the infos.
    sender.info("demo", "first info");
    sender.info("demo", "second info");
    sender.error("demo", "an error, drained first");
    sender.warn("demo", "a warning, drained second");

    orchestrator.handle().request_shutdown();
    orchestrator
        .run(vec![SubsystemSpec::new(relay).critical()])
        .await?;
    Ok(())
}
