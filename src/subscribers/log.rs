//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] emits one `tracing` line per event it receives. Register it
//! for all events to get a trace of everything flowing through the bus:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use busbar::{DispatchMode, EventBus, LogWriter, SubscriberRef};
//! let bus = EventBus::new();
//! let log: SubscriberRef = Arc::new(LogWriter);
//! bus.add_subscriber(&log, DispatchMode::Async, &[]);
//! ```
//!
//! Intended for development and examples; implement a custom
//! [`Subscribe`](crate::Subscribe) for structured metrics or persistence.

use async_trait::async_trait;

use crate::error::SubscriberError;
use crate::events::Event;
use crate::subscribers::Subscribe;

/// Subscriber that logs every event it receives.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, event: &Event) -> Result<(), SubscriberError> {
        tracing::info!(
            event_type = event.event_type,
            seq = event.seq,
            "event received"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
