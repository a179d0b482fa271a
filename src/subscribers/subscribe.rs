//! Core subscriber trait.
//!
//! `Subscribe` is the extension point for plugging custom event handlers
//! into the daemon. Each subscriber is driven by a dedicated worker loop fed
//! by a bounded queue owned by the [`SubscriberSet`](super::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching); they block neither the
//!   publisher nor other subscribers.
//! - Each subscriber declares its queue capacity via
//!   [`Subscribe::queue_capacity`]. On overflow, events for that subscriber
//!   are dropped.

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should
/// avoid blocking the async runtime.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name for logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue. Overflow drops events for this
    /// subscriber only.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
