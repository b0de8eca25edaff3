//! Full host demo: logging relay plus demo network/web/print subsystems.
//!
//! Run with an optional config file path:
//! ```text
//! cargo run --example controller -- [config.json]
//! ```
//! Ctrl-C (SIGINT) or SIGTERM shuts the host down; SIGHUP restarts it
//! in-process. A missing config file synthesizes defaults; exit code is 0 on
//! clean shutdown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use printvisor::{
    Config, InitError, LogRelay, LogSender, LogWriter, Orchestrator, Subsystem, SubsystemContext,
    SubsystemSpec,
};

/// Placeholder for a real host component: one worker that heartbeats through
/// the logging relay until cancelled.
struct DemoService {
    name: &'static str,
    sender: LogSender,
    tick: Duration,
}

#[async_trait]
impl Subsystem for DemoService {
    fn name(&self) -> &str {
        self.name
    }

    async fn init(&self, ctx: SubsystemContext) -> Result<(), InitError> {
        let cancel = ctx.cancel_token();
        let workers = ctx.workers();
        let sender = self.sender.clone();
        let name = self.name;
        let tick = self.tick;
        ctx.spawn_main(async move {
            workers.register_current();
            sender.info(name, "worker up");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(tick) => {
                        sender.info(name, "heartbeat");
                    }
                }
            }
            sender.info(name, "worker exiting");
            workers.deregister_current();
        });
        Ok(())
    }

    async fn shutdown(&self) {}
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match Config::load_or_default(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("printvisor: {e}");
            std::process::exit(2);
        }
    };

    let mut builder = Orchestrator::builder(config).with_subscriber(Arc::new(LogWriter::new()));
    if let Some(path) = &config_path {
        builder = builder.with_config_path(path.clone());
    }
    let orchestrator = builder.build();

    let relay = Arc::new(LogRelay::new());
    let sender = relay.sender();
    let service = |name, tick_ms| {
        Arc::new(DemoService {
            name,
            sender: sender.clone(),
            tick: Duration::from_millis(tick_ms),
        })
    };

    let specs = vec![
        SubsystemSpec::new(relay).critical(),
        SubsystemSpec::new(service("Network", 5_000))
            .with_dependency("Logging")
            .critical(),
        SubsystemSpec::new(service("WebServer", 7_000))
            .with_dependency("Logging")
            .with_dependency("Network"),
        SubsystemSpec::new(service("WebSocket", 7_000))
            .with_dependency("Logging")
            .with_dependency("Network"),
        SubsystemSpec::new(service("PrintQueue", 11_000)).with_dependency("Logging"),
    ];

    if let Err(e) = orchestrator.run(specs).await {
        eprintln!("printvisor: {e}");
        std::process::exit(1);
    }
}
