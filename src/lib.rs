//! # printvisor
//!
//! **Printvisor** is the subsystem lifecycle orchestrator of a 3D print
//! controller host.
//!
//! It provides the registry, readiness protocols, dependency-ordered
//! start/stop, signal-driven shutdown and bounded in-process restart for a
//! server composed of independently-launchable subsystems (logging relay,
//! web server, WebSocket server, mDNS discovery, print queue, network
//! management). The subsystems themselves are collaborators: they implement
//! the [`Subsystem`] trait and the orchestrator drives them through it.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//!     │ SubsystemSpec │   │ SubsystemSpec │   │ SubsystemSpec │
//!     │  ("Logging")  │   │  ("Network")  │   │ ("WebServer", │
//!     │               │   │               │   │ dep: Network) │
//!     └───────┬───────┘   └───────┬───────┘   └───────┬───────┘
//!             ▼                   ▼                   ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                     │
//! │  - SubsystemRegistry (state, dependencies, workers, main task)    │
//! │  - SystemState (phase flags, shutdown guard, restart counter)     │
//! │  - Bus (broadcast lifecycle events)                               │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! │  - signal watcher (SIGINT/SIGTERM → shutdown, SIGHUP → restart)   │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────┐      ┌──────────┐      ┌──────────┐
//!   │ init()   │      │ init()   │      │ init()   │   (dependency order,
//!   │ main     │      │ main     │      │ main     │    bounded, Go/No-Go
//!   │ worker   │      │ worker   │      │ worker   │    gated)
//!   └──────────┘      └──────────┘      └──────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! launch:
//!   registry reset ─► register specs + dependencies
//!   ─► LAUNCH READINESS (Go/No-Go trace per subsystem)
//!   ─► per subsystem: Starting ─► init() (bounded) ─► Running | Error
//!   ─► LAUNCH REVIEW ─► STARTUP COMPLETE
//!
//! shutdown (signal or ControlHandle):
//!   claim CAS guard (repeat signals: logged no-op)
//!   ─► LANDING READINESS (best-effort, OR across subsystems)
//!   ─► flip starting/running/stopping flags ─► settle delay
//!   ─► dependency-ordered stop (leaf peeling, cycle guard):
//!        per leaf: Stopping ─► cancel token ─► shutdown() (bounded)
//!                  ─► join main worker (bounded, abort on expiry)
//!                  ─► Inactive
//!   ─► release configuration
//!   ─► exit  |  restart (bounded counter) ─► launch again
//! ```
//!
//! ## Features
//! | Area               | Description                                                     | Key types / traits                        |
//! |--------------------|-----------------------------------------------------------------|-------------------------------------------|
//! | **Subsystems**     | Lifecycle contract each host component implements.              | [`Subsystem`], [`SubsystemSpec`]          |
//! | **Registry**       | State table, dependency graph, worker tracking.                 | [`SubsystemRegistry`], [`WorkerSet`]      |
//! | **Readiness**      | Pure Go/No-Go checks gating launch and landing.                 | [`Readiness`], [`ReadinessResults`]       |
//! | **Orchestration**  | Dependency-ordered start/stop, signals, restart.                | [`Orchestrator`], [`ControlHandle`]       |
//! | **Events**         | Broadcast lifecycle events with subscriber fan-out.             | [`Bus`], [`Event`], [`Subscribe`]         |
//! | **Work hand-off**  | Priority mailbox feeding dedicated consumers.                   | [`Mailbox`], [`LogRelay`]                 |
//! | **Errors**         | Typed errors for registry, init, config and runtime.            | [`RegistryError`], [`RuntimeError`]       |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use printvisor::{
//!     Config, InitError, LogWriter, Orchestrator, Subsystem, SubsystemContext, SubsystemSpec,
//! };
//!
//! struct Network;
//!
//! #[async_trait]
//! impl Subsystem for Network {
//!     fn name(&self) -> &str { "Network" }
//!
//!     async fn init(&self, ctx: SubsystemContext) -> Result<(), InitError> {
//!         let cancel = ctx.cancel_token();
//!         let workers = ctx.workers();
//!         ctx.spawn_main(async move {
//!             workers.register_current();
//!             cancel.cancelled().await;
//!             workers.deregister_current();
//!         });
//!         Ok(())
//!     }
//!
//!     async fn shutdown(&self) {}
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.handle_os_signals = false; // driven through the handle below
//!
//!     let orchestrator = Orchestrator::builder(cfg)
//!         .with_subscriber(Arc::new(LogWriter::new()))
//!         .build();
//!
//!     // Queued until launch completes, then triggers a graceful shutdown.
//!     orchestrator.handle().request_shutdown();
//!
//!     orchestrator
//!         .run(vec![SubsystemSpec::new(Arc::new(Network)).critical()])
//!         .await?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod queue;
mod registry;
mod subscribers;
mod subsystem;

pub mod subsystems;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{ControlHandle, Orchestrator, OrchestratorBuilder, SystemState};
pub use error::{ConfigError, InitError, RegistryError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use queue::Mailbox;
pub use registry::{
    SubsystemId, SubsystemRegistry, SubsystemState, WorkerMemoryMetrics, WorkerSet,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use subsystem::{
    Readiness, ReadinessPhase, ReadinessResults, Subsystem, SubsystemContext, SubsystemRef,
    SubsystemSpec,
};
pub use subsystems::logging::{LogRecord, LogRelay, LogSender, RelayLevel};
