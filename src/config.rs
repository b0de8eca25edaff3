//! # Host configuration.
//!
//! Provides [`Config`], the settings bundle loaded once at process start and
//! reloaded on every in-process restart.
//!
//! Config is used in two ways:
//! 1. **Orchestrator creation**: `Orchestrator::builder(config)`
//! 2. **Process surface**: `Config::load_or_default(path)`: a missing file
//!    synthesizes defaults exactly once; an unreadable or malformed file is a
//!    hard startup error.
//!
//! ## Field semantics
//! - `init_timeout`: bound on each subsystem's `init` hook
//! - `stop_timeout`: bound on each subsystem's `shutdown` hook and again on
//!   the join of its main worker; on expiry the worker is force-cancelled
//! - `settle_delay`: pause after flipping the core state flags so polling
//!   workers observe them before the ordered stop begins
//! - `stop_pass_delay`: pause between leaf-peeling passes of the ordered stop
//! - `max_restarts`: hard cap on the in-process restart counter
//! - `handle_os_signals = false` disables the OS signal watcher (embedders
//!   and tests drive shutdown through a `ControlHandle` instead)

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Global configuration for the orchestrator runtime.
///
/// All fields are public for flexibility; prefer the helper accessors where
/// one exists. Durations serialize in serde's native `{secs, nanos}` shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host name used in status reports and announcements.
    pub server_name: String,

    /// Maximum time a subsystem's `init` hook may take before the launch
    /// records it as failed.
    pub init_timeout: Duration,

    /// Maximum time a subsystem's `shutdown` hook (and, separately, the join
    /// of its main worker) may take before the orchestrator force-cancels it
    /// and proceeds.
    pub stop_timeout: Duration,

    /// Pause after the core state flags flip during shutdown, letting polling
    /// workers observe them before subsystems are stopped.
    pub settle_delay: Duration,

    /// Pause between passes of the dependency-ordered stop, letting
    /// asynchronous joins from the previous pass complete before leaf-ness is
    /// re-evaluated.
    pub stop_pass_delay: Duration,

    /// Capacity of the event bus broadcast ring buffer.
    ///
    /// Slow subscribers that lag behind more than this many events skip the
    /// oldest items. Minimum value is 1 (clamped).
    pub bus_capacity: usize,

    /// Hard cap on the in-process restart counter. Once exceeded, a restart
    /// request degrades to a normal shutdown.
    pub max_restarts: u32,

    /// Whether the orchestrator installs OS signal handlers
    /// (SIGINT/SIGTERM -> shutdown, SIGHUP -> restart).
    pub handle_os_signals: bool,
}

impl Config {
    /// Loads configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Loads configuration from an optional path, synthesizing defaults when
    /// no path is given or the file does not exist.
    ///
    /// A present-but-broken file is still an error: silently falling back to
    /// defaults over a typo would mask the operator's intent.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            None => Ok(Self::default()),
            Some(p) if !p.exists() => {
                tracing::warn!(path = %p.display(), "config file missing, using defaults");
                Ok(Self::default())
            }
            Some(p) => Self::load(p),
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `init_timeout = 10s`, `stop_timeout = 2s`
    /// - `settle_delay = 100ms`, `stop_pass_delay = 100ms`
    /// - `bus_capacity = 1024`
    /// - `max_restarts = 10`
    /// - `handle_os_signals = true`
    fn default() -> Self {
        Self {
            server_name: "printvisor".to_string(),
            init_timeout: Duration::from_secs(10),
            stop_timeout: Duration::from_secs(2),
            settle_delay: Duration::from_millis(100),
            stop_pass_delay: Duration::from_millis(100),
            bus_capacity: 1024,
            max_restarts: 10,
            handle_os_signals: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_synthesizes_defaults() {
        let cfg = Config::load_or_default(Some(Path::new("/nonexistent/printvisor.json")))
            .expect("defaults");
        assert_eq!(cfg.max_restarts, Config::default().max_restarts);
    }

    #[test]
    fn roundtrips_through_json() {
        let cfg = Config::default();
        let text = serde_json::to_string(&cfg).expect("serialize");
        let back: Config = serde_json::from_str(&text).expect("parse");
        assert_eq!(back.bus_capacity, cfg.bus_capacity);
        assert_eq!(back.stop_timeout, cfg.stop_timeout);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let back: Config = serde_json::from_str(r#"{"max_restarts": 3}"#).expect("parse");
        assert_eq!(back.max_restarts, 3);
        assert_eq!(back.bus_capacity, Config::default().bus_capacity);
    }
}
