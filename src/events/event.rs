//! # Published event: type id, opaque payload, monotonic metadata.
//!
//! [`Event`] is the immutable value handed to every matched subscriber. The
//! bus builds exactly one per publish call and shares it behind an `Arc`, so
//! a direct subscriber and every async worker all observe the same instance.
//!
//! ## Ordering metadata
//! Each event carries a globally unique sequence number (`seq`) drawn from a
//! monotonic counter, plus a monotonic creation instant (`at`). Neither is
//! interpreted by the bus itself; they exist for subscribers that need to
//! reconstruct publish order across their own queues.
//!
//! ## Payload sharing
//! The payload is an `Arc<dyn Any + Send + Sync>` shared by reference across
//! all subscribers. Handlers only ever see `&Event`, so the payload is
//! read-only by construction; put interior-mutable state in a payload only if
//! every subscriber is meant to see the same shared state.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;

/// Opaque event payload, shared read-only across all subscribers.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Immutable record of a published occurrence.
///
/// Created once per [`publish`](crate::EventBus::publish) call and never
/// mutated afterwards.
#[derive(Clone)]
pub struct Event {
    /// Event type identifier the publisher supplied.
    pub event_type: u32,
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Monotonic creation timestamp.
    pub at: Instant,

    payload: Payload,
}

impl Event {
    /// Creates a new event with the current instant and next sequence number.
    pub fn new(event_type: u32, payload: Payload) -> Self {
        Self {
            event_type,
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: Instant::now(),
            payload,
        }
    }

    /// Returns the shared payload.
    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Downcasts the payload to a concrete type.
    ///
    /// Returns `None` if the payload is not a `T`.
    #[inline]
    pub fn payload_as<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &self.event_type)
            .field("seq", &self.seq)
            .field("at", &self.at)
            .finish_non_exhaustive()
    }
}
