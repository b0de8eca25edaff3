//! Error types used by the printvisor runtime and subsystems.
//!
//! This module defines the error enums of the orchestration core:
//!
//! - [`RegistryError`] — failures of registry mutations and queries.
//! - [`InitError`] — errors raised by a subsystem's `init` hook.
//! - [`ConfigError`] — configuration file load/parse failures.
//! - [`RuntimeError`] — errors raised by the orchestration runtime itself.
//!
//! All types provide `as_label()` for stable snake_case labels in logs and
//! metrics. Stop timeouts and dependency cycles are deliberately *not* errors:
//! shutdown always makes forward progress, so those conditions surface as
//! events and critical log lines instead of `Err` values.

use std::time::Duration;

use thiserror::Error;

use crate::registry::SubsystemState;

/// # Errors produced by the subsystem registry.
///
/// Each of these is fatal to the single registry call that produced it, never
/// to the whole launch: the launch sequence treats a failed registration as
/// that one subsystem failing its launch.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A subsystem with this name is already registered.
    #[error("subsystem '{name}' already registered")]
    DuplicateName {
        /// The name that collided.
        name: String,
    },

    /// The subsystem id does not resolve to a registered subsystem.
    ///
    /// Ids are invalidated when the registry is reset for a restart; a stale
    /// id from before the reset resolves here rather than to a new record.
    #[error("unknown subsystem id {id}")]
    UnknownId {
        /// The raw index that failed to resolve.
        id: usize,
    },

    /// A dependency references a name that is not registered.
    ///
    /// Dependencies may only point at already-registered subsystems, which
    /// constrains the dependency graph to a DAG over insertion order.
    #[error("unknown dependency '{name}'")]
    UnknownDependency {
        /// The dependency name that failed to resolve.
        name: String,
    },

    /// The requested state transition is not in the lifecycle state table.
    ///
    /// `update_state` validates every transition; use `force_state` to inject
    /// arbitrary states for fault testing.
    #[error("invalid state transition {from} -> {to} for subsystem '{name}'")]
    InvalidTransition {
        /// Subsystem whose transition was rejected.
        name: String,
        /// State the subsystem was in.
        from: SubsystemState,
        /// State the caller asked for.
        to: SubsystemState,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::DuplicateName { .. } => "registry_duplicate_name",
            RegistryError::UnknownId { .. } => "registry_unknown_id",
            RegistryError::UnknownDependency { .. } => "registry_unknown_dependency",
            RegistryError::InvalidTransition { .. } => "registry_invalid_transition",
        }
    }
}

/// # Errors produced by a subsystem's `init` hook.
///
/// Whether an `InitError` aborts the whole launch is per-subsystem policy:
/// critical subsystems (logging, network) abort startup, optional ones are
/// logged and skipped.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum InitError {
    /// Initialization failed (port already bound, resource allocation, ...).
    #[error("initialization failed: {reason}")]
    Failed {
        /// Human-readable failure detail.
        reason: String,
    },

    /// Initialization did not complete within the configured bound.
    #[error("initialization timed out after {timeout:?}")]
    Timeout {
        /// The bound that was exceeded.
        timeout: Duration,
    },
}

impl InitError {
    /// Convenience constructor for [`InitError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        InitError::Failed {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            InitError::Failed { .. } => "init_failed",
            InitError::Timeout { .. } => "init_timeout",
        }
    }
}

/// # Configuration load failures.
///
/// A *missing* file is not an error at the process surface: the loader
/// synthesizes defaults once and continues. Unreadable or malformed files are
/// unrecoverable, because every subsystem depends on configuration being
/// coherent.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read config file '{path}': {source}")]
    Read {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file was read but is not valid JSON for [`Config`](crate::Config).
    #[error("cannot parse config file '{path}': {source}")]
    Parse {
        /// Path that failed.
        path: String,
        /// Underlying parse error.
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse { .. } => "config_parse",
        }
    }
}

/// # Errors produced by the orchestration runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A critical subsystem failed its launch; startup was aborted and any
    /// subsystems already started were stopped again.
    #[error("launch failed: critical subsystem '{subsystem}' did not start")]
    LaunchFailed {
        /// Name of the subsystem that blocked startup.
        subsystem: String,
    },

    /// OS signal handler installation failed.
    #[error("signal handler installation failed: {source}")]
    SignalSetup {
        /// Underlying I/O error from the signal registration.
        #[from]
        source: std::io::Error,
    },

    /// The bounded restart counter was exhausted.
    ///
    /// Callers treat this as "fall back to normal shutdown", never as a
    /// crash.
    #[error("restart limit reached after {count} restart attempts")]
    RestartLimitExceeded {
        /// Value of the restart counter when the cap was hit.
        count: u32,
    },

    /// Configuration could not be loaded during startup or restart.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::LaunchFailed { .. } => "runtime_launch_failed",
            RuntimeError::SignalSetup { .. } => "runtime_signal_setup",
            RuntimeError::RestartLimitExceeded { .. } => "runtime_restart_limit",
            RuntimeError::Config(e) => e.as_label(),
        }
    }
}
