//! # Async dispatch wrapper: per-registration mailbox + worker task.
//!
//! [`AsyncDispatch`] decouples event delivery from the publisher. Each async
//! registration owns one unbounded FIFO queue and one dedicated worker task
//! that drains it, invoking the wrapped subscriber one event at a time.
//!
//! ## Architecture
//! ```text
//! publish(event)
//!     │
//!     └──► enqueue ──► [unbounded queue] ──► worker ──► subscriber.on_event()
//!                                              │             │
//!                                              │        Err → logged, loop continues
//!                                              │        panic → caught, logged, loop continues
//!                                              │
//!                                 stop() ──────┘  (token cancelled, queue discarded)
//! ```
//!
//! ## Rules
//! - `enqueue` never blocks and never fails visibly; after `stop()` the event
//!   is silently dropped.
//! - Events are handled strictly in enqueue (publish) order.
//! - A failing or panicking handler never halts delivery of later events.
//! - The queue is unbounded: a slow subscriber grows memory without bound
//!   rather than exerting backpressure on publishers. This mirrors the bus
//!   contract that publishing must never block.
//!
//! ## Shutdown
//! `stop()` cancels the worker's token and returns immediately. The worker
//! wakes from its queue wait, finishes (or abandons) at most the event it is
//! currently handling, and exits without touching the rest of the queue. The
//! explicit token is what distinguishes a deliberate stop from any other wake
//! of the worker.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::events::Event;
use crate::subscribers::SubscriberRef;

/// Async delivery wrapper around one subscriber registration.
///
/// Created when a subscriber registers with
/// [`DispatchMode::Async`](crate::DispatchMode::Async); one wrapper (queue +
/// worker) per registered selector entry. Stopped when the entry is removed
/// or the bus is cleared.
pub(crate) struct AsyncDispatch {
    subscriber: SubscriberRef,
    tx: mpsc::UnboundedSender<Arc<Event>>,
    stop: CancellationToken,
}

impl AsyncDispatch {
    /// Wraps `subscriber` and spawns its worker task.
    pub(crate) fn spawn(subscriber: SubscriberRef) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<Event>>();
        let stop = CancellationToken::new();

        let worker_stop = stop.clone();
        let worker_sub = Arc::clone(&subscriber);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = worker_stop.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(event) => Self::deliver(&worker_sub, &event).await,
                        // All senders dropped: the registration is gone.
                        None => break,
                    },
                }
            }
            // Remaining queued events are discarded with rx.
        });

        Self {
            subscriber,
            tx,
            stop,
        }
    }

    /// Invokes the wrapped handler, isolating errors and panics.
    async fn deliver(subscriber: &SubscriberRef, event: &Arc<Event>) {
        let fut = subscriber.on_event(event.as_ref());
        match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(
                    subscriber = subscriber.name(),
                    event_type = event.event_type,
                    seq = event.seq,
                    error = %err,
                    "async event handler failed"
                );
            }
            Err(panic_err) => {
                let info = {
                    let any = &*panic_err;
                    if let Some(msg) = any.downcast_ref::<&'static str>() {
                        (*msg).to_string()
                    } else if let Some(msg) = any.downcast_ref::<String>() {
                        msg.clone()
                    } else {
                        "unknown panic".to_string()
                    }
                };
                tracing::error!(
                    subscriber = subscriber.name(),
                    event_type = event.event_type,
                    seq = event.seq,
                    panic = %info,
                    "async event handler panicked"
                );
            }
        }
    }

    /// Appends an event to the queue. Never blocks the caller.
    ///
    /// Enqueueing after [`stop`](Self::stop) is a silent no-op.
    pub(crate) fn enqueue(&self, event: Arc<Event>) {
        let _ = self.tx.send(event);
    }

    /// Signals the worker to exit. Idempotent; does not wait for drain.
    pub(crate) fn stop(&self) {
        self.stop.cancel();
    }

    /// The wrapped subscriber; the wrapper's identity delegates to it.
    pub(crate) fn subscriber(&self) -> &SubscriberRef {
        &self.subscriber
    }

    /// Clone of the queue sender, used by publish after the registry lock is
    /// released.
    pub(crate) fn sender(&self) -> mpsc::UnboundedSender<Arc<Event>> {
        self.tx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubscriberError;
    use crate::subscribers::Subscribe;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    struct Recorder {
        seen: Mutex<Vec<u32>>,
        fail_on: Option<u32>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                fail_on: None,
            })
        }

        fn failing_on(event_type: u32) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                fail_on: Some(event_type),
            })
        }

        fn seen(&self) -> Vec<u32> {
            self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) -> Result<(), SubscriberError> {
            self.seen
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event.event_type);
            if self.fail_on == Some(event.event_type) {
                return Err(SubscriberError::fail("induced failure"));
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        timeout(Duration::from_secs(2), async {
            while !cond() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("condition not met within bounded wait"));
    }

    #[tokio::test]
    async fn test_delivers_in_fifo_order() {
        let recorder = Recorder::new();
        let sub: SubscriberRef = recorder.clone();
        let dispatch = AsyncDispatch::spawn(sub);

        for ty in 1..=50u32 {
            dispatch.enqueue(Arc::new(Event::new(ty, Arc::new(()))));
        }

        wait_for(|| recorder.seen().len() == 50).await;
        assert_eq!(recorder.seen(), (1..=50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_handler_error_does_not_stop_the_loop() {
        let recorder = Recorder::failing_on(2);
        let sub: SubscriberRef = recorder.clone();
        let dispatch = AsyncDispatch::spawn(sub);

        dispatch.enqueue(Arc::new(Event::new(1, Arc::new(()))));
        dispatch.enqueue(Arc::new(Event::new(2, Arc::new(()))));
        dispatch.enqueue(Arc::new(Event::new(3, Arc::new(()))));

        wait_for(|| recorder.seen().len() == 3).await;
        assert_eq!(recorder.seen(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_handler_panic_does_not_stop_the_loop() {
        struct Panicker {
            after: Arc<Recorder>,
        }

        #[async_trait]
        impl Subscribe for Panicker {
            async fn on_event(&self, event: &Event) -> Result<(), SubscriberError> {
                if event.event_type == 1 {
                    panic!("induced panic");
                }
                self.after.on_event(event).await
            }

            fn name(&self) -> &'static str {
                "panicker"
            }
        }

        let recorder = Recorder::new();
        let sub: SubscriberRef = Arc::new(Panicker {
            after: recorder.clone(),
        });
        let dispatch = AsyncDispatch::spawn(sub);

        dispatch.enqueue(Arc::new(Event::new(1, Arc::new(()))));
        dispatch.enqueue(Arc::new(Event::new(2, Arc::new(()))));

        wait_for(|| recorder.seen() == vec![2]).await;
    }

    #[tokio::test]
    async fn test_stop_discards_queued_events() {
        let recorder = Recorder::new();
        let sub: SubscriberRef = recorder.clone();
        let dispatch = AsyncDispatch::spawn(sub);

        dispatch.stop();
        dispatch.stop(); // idempotent

        // Enqueued after stop: must never be delivered.
        dispatch.enqueue(Arc::new(Event::new(1, Arc::new(()))));
        sleep(Duration::from_millis(50)).await;
        assert!(recorder.seen().is_empty());
    }
}
