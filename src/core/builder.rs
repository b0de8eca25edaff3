//! Builder for constructing an [`Orchestrator`].

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::events::Bus;
use crate::registry::SubsystemRegistry;
use crate::subscribers::{Subscribe, SubscriberSet};

use super::orchestrator::Orchestrator;
use super::state::SystemState;

/// Builder for an [`Orchestrator`] with optional subscribers and a
/// configuration reload path.
pub struct OrchestratorBuilder {
    config: Config,
    config_path: Option<PathBuf>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            config_path: None,
            subscribers: Vec::new(),
        }
    }

    /// Remembers where the configuration came from, so in-process restarts
    /// can reload it. Without a path, restarts re-synthesize defaults.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Appends one subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds the orchestrator.
    ///
    /// Must run inside a Tokio runtime: one worker task is spawned per
    /// subscriber.
    pub fn build(self) -> Arc<Orchestrator> {
        let state = SystemState::new();
        let registry = SubsystemRegistry::new(state.final_shutdown_flag());
        let bus = Bus::new(self.config.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers));
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        Arc::new(Orchestrator {
            cfg_slot: Mutex::new(Some(Arc::new(self.config))),
            config_path: self.config_path,
            state,
            registry,
            bus,
            subs,
            runtime_token: CancellationToken::new(),
            specs: Mutex::new(Vec::new()),
            control_tx,
            control_rx: tokio::sync::Mutex::new(control_rx),
        })
    }
}
