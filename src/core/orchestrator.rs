//! # Orchestrator: the subsystem lifecycle coordinator.
//!
//! The [`Orchestrator`] owns the event bus, the subsystem registry, the
//! shared [`SystemState`](super::state::SystemState) and the control
//! channel. It launches subsystems in dependency order, fans lifecycle
//! events out to subscribers, reacts to OS signals, and drives graceful
//! shutdown and in-process restart.
//!
//! ## High-level architecture
//! ```text
//! Inputs to run():
//!   Vec<SubsystemSpec> ──► Orchestrator::run(specs)
//!
//! Launch:
//!   registry reset ─► register + dependencies ─► LAUNCH READINESS (Go/No-Go)
//!   ─► per-subsystem init (bounded) ─► LAUNCH REVIEW ─► running
//!
//! Event flow:
//!   launch/stop/signals ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                            ┌────────┬────────┐
//!                                                            ▼        ▼        ▼
//!                                                       [queue S1][queue S2][queue SN]
//!                                                            │        │        │
//!                                                       sub1.on_  sub2.on_  subN.on_
//!                                                        event()   event()   event()
//!
//! Shutdown path:
//!   SIGINT/SIGTERM ─► Trigger::Shutdown ─┐
//!   SIGHUP         ─► Trigger::Restart  ─┼─► run loop ─► graceful_shutdown
//!   ControlHandle  ─► either            ─┘               │
//!                                          Exited ─► run() returns
//!                                          Restarted ─► loop continues
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::Bus;
use crate::registry::SubsystemRegistry;
use crate::subscribers::SubscriberSet;
use crate::subsystem::SubsystemSpec;

use super::builder::OrchestratorBuilder;
use super::launch::launch;
use super::shutdown::{graceful_shutdown, ShutdownOutcome};
use super::signals::{spawn_signal_watcher, ControlHandle, Trigger};
use super::state::SystemState;

/// Coordinates subsystem launch, event delivery, signal-driven shutdown and
/// in-process restart.
pub struct Orchestrator {
    pub(super) cfg_slot: Mutex<Option<Arc<Config>>>,
    pub(super) config_path: Option<PathBuf>,
    pub(super) state: Arc<SystemState>,
    pub(super) registry: Arc<SubsystemRegistry>,
    pub(super) bus: Bus,
    pub(super) subs: Arc<SubscriberSet>,
    pub(super) runtime_token: CancellationToken,
    pub(super) specs: Mutex<Vec<SubsystemSpec>>,
    pub(super) control_tx: mpsc::UnboundedSender<Trigger>,
    pub(super) control_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Trigger>>,
}

impl Orchestrator {
    /// Starts building an orchestrator with the given configuration.
    ///
    /// `build()` must run inside a Tokio runtime: subscriber workers are
    /// spawned at construction.
    pub fn builder(config: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// Cloneable handle for requesting shutdown/restart without OS signals.
    pub fn handle(&self) -> ControlHandle {
        ControlHandle::new(self.control_tx.clone())
    }

    /// The lifecycle event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The subsystem registry.
    pub fn registry(&self) -> &Arc<SubsystemRegistry> {
        &self.registry
    }

    /// The shared host state (phase flags, restart counter, timing).
    pub fn state(&self) -> &Arc<SystemState> {
        &self.state
    }

    /// Currently loaded configuration.
    ///
    /// After the shutdown sequence releases the loaded configuration,
    /// readers observe defaults until a restart reloads it.
    pub fn config(&self) -> Arc<Config> {
        self.cfg_slot
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Arc::new(Config::default()))
    }

    /// Drops the loaded configuration (resource-teardown step of the
    /// shutdown sequence).
    pub(super) fn release_config(&self) {
        *self.cfg_slot.lock().unwrap() = None;
        tracing::debug!("configuration released");
    }

    /// Reloads configuration for a restart; a missing file degrades to
    /// defaults, a broken one fails the restart.
    pub(super) fn reload_config(&self) -> Result<(), RuntimeError> {
        let cfg = Config::load_or_default(self.config_path.as_deref())?;
        *self.cfg_slot.lock().unwrap() = Some(Arc::new(cfg));
        Ok(())
    }

    /// Runs the host: launch, then serve triggers until a shutdown
    /// completes.
    ///
    /// Returns when the shutdown sequence finishes with a process-exit
    /// outcome (restarts keep the loop alive), or with the launch error if
    /// startup failed.
    pub async fn run(&self, specs: Vec<SubsystemSpec>) -> Result<(), RuntimeError> {
        *self.specs.lock().unwrap() = specs.clone();
        self.spawn_subscriber_listener();

        let cfg = self.config();
        if cfg.handle_os_signals {
            spawn_signal_watcher(self.control_tx.clone(), self.runtime_token.clone())?;
        }

        if let Err(e) = launch(
            &cfg,
            &self.registry,
            &self.bus,
            &self.state,
            &specs,
            &self.runtime_token,
        )
        .await
        {
            self.runtime_token.cancel();
            return Err(e);
        }

        loop {
            let trigger = {
                let mut rx = self.control_rx.lock().await;
                rx.recv().await
            };
            let Some(trigger) = trigger else { break };

            let want_restart = matches!(trigger, Trigger::Restart);
            match graceful_shutdown(self, want_restart).await {
                ShutdownOutcome::Exited => break,
                ShutdownOutcome::Restarted => continue,
                ShutdownOutcome::AlreadyInProgress => continue,
            }
        }

        self.runtime_token.cancel();
        Ok(())
    }

    /// Forwards bus events to the subscriber set until the runtime token
    /// cancels.
    fn spawn_subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let subs = Arc::clone(&self.subs);
        let stop = self.runtime_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => subs.emit(&ev),
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "subscriber listener lagged");
                            continue;
                        }
                    }
                }
            }
        });
    }
}
