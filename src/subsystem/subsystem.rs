//! # Subsystem lifecycle trait.
//!
//! [`Subsystem`] is the contract every independently-launchable unit of the
//! host implements: logging relay, web server, WebSocket server, mDNS
//! discovery, print queue, network management. The orchestrator drives these
//! hooks; it never reaches into a subsystem any other way.
//!
//! ## Contract
//! - `init` must not block indefinitely (the orchestrator additionally
//!   applies its own bound) and is idempotent-safe: called on an
//!   already-running subsystem it returns `Ok` without effect. (The launch
//!   sequence never does this, but restarts and embedders may.)
//! - `shutdown` must be safe to call even if `init` never ran or the
//!   subsystem already stopped (no-op), and must not panic.
//! - The readiness checks are pure: no side effects beyond reading
//!   dependency state. Both default to an unconditional Go.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::InitError;

use super::context::SubsystemContext;
use super::readiness::Readiness;

/// Independently startable/stoppable unit with its own workers and
/// lifecycle hooks.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use printvisor::{InitError, Subsystem, SubsystemContext};
///
/// struct Announcer;
///
/// #[async_trait]
/// impl Subsystem for Announcer {
///     fn name(&self) -> &str { "Announcer" }
///
///     async fn init(&self, ctx: SubsystemContext) -> Result<(), InitError> {
///         let cancel = ctx.cancel_token();
///         let workers = ctx.workers();
///         ctx.spawn_main(async move {
///             workers.register_current();
///             cancel.cancelled().await;
///             workers.deregister_current();
///         });
///         Ok(())
///     }
///
///     async fn shutdown(&self) {}
/// }
/// ```
#[async_trait]
pub trait Subsystem: Send + Sync + 'static {
    /// Stable, unique, case-sensitive subsystem name.
    fn name(&self) -> &str;

    /// Brings the subsystem up.
    ///
    /// Spawn the dedicated main worker (if any) through
    /// [`SubsystemContext::spawn_main`] so the orchestrator can join it on
    /// stop.
    async fn init(&self, ctx: SubsystemContext) -> Result<(), InitError>;

    /// Brings the subsystem down.
    ///
    /// Runs after this subsystem's cancellation token fires and before its
    /// main worker is joined. May block waiting for in-flight work (e.g.
    /// draining a mailbox) up to the configured stop bound.
    async fn shutdown(&self);

    /// Subsystem-specific launch preconditions.
    ///
    /// The orchestrator prepends dependency-gate lines and appends the
    /// Decide line; implementations only report their own checks.
    fn check_launch_readiness(&self) -> Readiness {
        Readiness::new(self.name())
    }

    /// Subsystem-specific landing preconditions.
    fn check_landing_readiness(&self) -> Readiness {
        Readiness::new(self.name())
    }
}

/// Shared handle to a subsystem implementation.
pub type SubsystemRef = Arc<dyn Subsystem>;
