//! # Subscriber trait for lifecycle event consumers.
//!
//! A [`Subscribe`] implementation receives every [`Event`] published on the
//! bus, delivered through a dedicated worker with a bounded queue (see
//! [`SubscriberSet`](super::SubscriberSet)). Typical subscribers: log
//! writers, metric exporters, status caches.

use async_trait::async_trait;

use crate::events::Event;

/// Consumer of lifecycle events.
///
/// Implementations must be cheap to call: each subscriber has its own bounded
/// queue, and a subscriber that falls behind silently drops the oldest
/// events for itself (the rest of the system is unaffected).
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use printvisor::{Event, Subscribe};
///
/// struct Printer;
///
/// #[async_trait]
/// impl Subscribe for Printer {
///     fn name(&self) -> &'static str { "printer" }
///
///     async fn on_event(&self, ev: &Event) {
///         println!("seq={} kind={:?}", ev.seq, ev.kind);
///     }
/// }
/// ```
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Stable subscriber name, used in overflow/panic diagnostics.
    fn name(&self) -> &'static str;

    /// Capacity of this subscriber's delivery queue.
    fn queue_capacity(&self) -> usize {
        256
    }

    /// Handles one event. Panics are caught and isolated per subscriber.
    async fn on_event(&self, event: &Event);
}
