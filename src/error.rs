//! Error types used by the bus and by subscriber handlers.
//!
//! Two enums:
//!
//! - [`SubscriberError`] — returned by a subscriber's `on_event` when it
//!   cannot handle an event.
//! - [`BusError`] — surfaced from [`publish`](crate::EventBus::publish) when a
//!   *direct* (inline) subscriber fails. Async handler failures never reach
//!   the publisher; they are logged by the dispatch worker.
//!
//! Both provide `as_label`/`as_message` helpers for logs and metrics.

use thiserror::Error;

/// # Errors produced by subscriber handlers.
///
/// A handler returns this from `on_event` to signal that it could not process
/// the event. On the sync path the error propagates out of `publish`; on the
/// async path it is logged by the worker and delivery continues.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SubscriberError {
    /// Handler failed to process the event.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },
}

impl SubscriberError {
    /// Convenience constructor for [`SubscriberError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        SubscriberError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubscriberError::Fail { .. } => "subscriber_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SubscriberError::Fail { error } => format!("error: {error}"),
        }
    }
}

/// # Errors produced by the bus itself.
///
/// Publishing can only fail on the sync path: the first direct subscriber
/// whose handler errors aborts delivery to the subscribers resolved after it
/// in the same publish call. There is no isolation between direct subscribers.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// A direct subscriber's handler failed during inline delivery.
    #[error("subscriber '{subscriber}' failed handling event type {event_type}: {source}")]
    Delivery {
        /// Name of the failing subscriber.
        subscriber: &'static str,
        /// Event type that was being delivered.
        event_type: u32,
        /// The handler's error.
        #[source]
        source: SubscriberError,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::Delivery { .. } => "bus_delivery_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BusError::Delivery {
                subscriber,
                event_type,
                source,
            } => format!("delivery to '{subscriber}' failed for type {event_type}: {source}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        let sub_err = SubscriberError::fail("boom");
        assert_eq!(sub_err.as_label(), "subscriber_failed");

        let bus_err = BusError::Delivery {
            subscriber: "demo",
            event_type: 7,
            source: sub_err,
        };
        assert_eq!(bus_err.as_label(), "bus_delivery_failed");
        assert!(bus_err.as_message().contains("demo"));
        assert!(bus_err.as_message().contains('7'));
    }
}
