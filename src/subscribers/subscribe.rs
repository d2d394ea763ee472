//! # Event subscriber trait.
//!
//! [`Subscribe`] is the single extension point for receiving events from the
//! [`EventBus`](crate::EventBus). How a subscriber's handler is invoked
//! depends on the [`DispatchMode`](crate::DispatchMode) it was registered
//! with:
//!
//! - **Sync**: `on_event` runs inline in the publisher's `publish` call; an
//!   error propagates to the publisher and aborts delivery to the remaining
//!   subscribers of that call.
//! - **Async**: `on_event` runs on a dedicated worker task fed by an
//!   unbounded per-registration queue; errors are logged and never reach the
//!   publisher. Events arrive in FIFO publish order.
//!
//! ## Identity
//! The bus identifies a subscriber by the `Arc<dyn Subscribe>` handle it was
//! registered with. Keep that `Arc` around: removal and the introspection
//! queries match by handle identity, not by value equality. Registering a
//! clone of the same `Arc` is the same logical subscriber; a second `Arc`
//! built from a second instance is a different one.
//!
//! ## Example
//! ```no_run
//! use async_trait::async_trait;
//! use busbar::{Event, Subscribe, SubscriberError};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Subscribe for Audit {
//!     async fn on_event(&self, event: &Event) -> Result<(), SubscriberError> {
//!         println!("audit: type={} seq={}", event.event_type, event.seq);
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &'static str { "audit" }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SubscriberError;
use crate::events::Event;

/// Shared handle to a subscriber.
///
/// The handle doubles as the subscriber's identity within the bus: pass the
/// same `Arc` (or a clone of it) to removal and introspection calls.
pub type SubscriberRef = Arc<dyn Subscribe>;

/// Contract implemented by anything that wants to receive events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event.
    ///
    /// The event's payload is shared with every other matched subscriber;
    /// treat it as read-only.
    ///
    /// May be invoked on the publisher's task (sync registration) or on a
    /// dedicated worker (async registration); implementations must not rely
    /// on either.
    async fn on_event(&self, event: &Event) -> Result<(), SubscriberError>;

    /// Returns the subscriber name used in logs and delivery errors.
    ///
    /// Prefer short, descriptive names (e.g., "metrics", "audit"). The
    /// default uses `type_name::<Self>()`, which can be verbose.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
