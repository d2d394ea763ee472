//! # busbar
//!
//! **Busbar** is an in-process publish/subscribe event bus with synchronous
//! and asynchronous per-subscriber delivery.
//!
//! A registry maps event selectors to subscribers and dispatches each
//! published event either inline on the publisher's call or through a
//! dedicated per-registration queue + worker task, preserving per-subscriber
//! delivery order. The async path never blocks the publisher.
//!
//! ## Architecture
//! ```text
//!                 ┌─────────────────────────────────────────────┐
//!  publish(T, v)─►│ EventBus                                    │
//!                 │  exact:     type  → [entries]               │
//!                 │  catch-all:         [entries]               │
//!                 │  ranges:  [(low..=high, [entries])]         │
//!                 └───────┬─────────────────────────────┬───────┘
//!                         │ resolve (under one lock)    │
//!                         ▼                             ▼
//!                  direct entries                queued entries
//!                         │                             │
//!            on_event() awaited inline        [unbounded queue] ──► worker
//!            (errors propagate to the                    │
//!             publisher, no isolation)        subscriber.on_event()
//!                                             (Err/panic logged,
//!                                              loop continues)
//! ```
//!
//! ## Selectors
//! A subscriber registers under one or more selectors:
//! - **exact**: a specific event type id;
//! - **catch-all**: every event (empty type slice, or the reserved
//!   [`ALL_EVENTS`] sentinel);
//! - **range**: an inclusive [`EventRange`] of type ids.
//!
//! Resolution order per publish is fixed — exact, then catch-all, then each
//! matching range in registration order — with duplicates across steps
//! suppressed by subscriber identity. Two documented exceptions: distinct
//! overlapping ranges each deliver, and a subscriber registered under the
//! same selector both [`DispatchMode::Sync`] and [`DispatchMode::Async`]
//! holds two entries and is delivered twice.
//!
//! ## Ordering guarantees
//! - FIFO per async registration (its own queue and worker).
//! - No ordering across different subscribers, and none across publishers
//!   racing on different tasks.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use busbar::{DispatchMode, Event, EventBus, Subscribe, SubscriberError, SubscriberRef};
//!
//! struct Metrics;
//!
//! #[async_trait]
//! impl Subscribe for Metrics {
//!     async fn on_event(&self, event: &Event) -> Result<(), SubscriberError> {
//!         if let Some(v) = event.payload_as::<u64>() {
//!             println!("type={} value={v}", event.event_type);
//!         }
//!         Ok(())
//!     }
//!     fn name(&self) -> &'static str { "metrics" }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), busbar::BusError> {
//!     let bus = EventBus::new();
//!     let metrics: SubscriberRef = Arc::new(Metrics);
//!
//!     // Async catch-all: decoupled from publishers.
//!     bus.add_subscriber(&metrics, DispatchMode::Async, &[]);
//!
//!     bus.publish(1, 42u64).await?;
//!     bus.publish(2, 7u64).await?;
//!
//!     bus.clear();
//!     Ok(())
//! }
//! ```

mod bus;
mod error;
mod events;
mod subscribers;

// ---- Public re-exports ----

pub use bus::{DispatchMode, EventBus, ALL_EVENTS};
pub use error::{BusError, SubscriberError};
pub use events::{Event, EventRange, Payload};
pub use subscribers::{LogWriter, Subscribe, SubscriberRef};
