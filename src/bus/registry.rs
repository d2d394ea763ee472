//! # Event bus registry: selector maps and the publish algorithm.
//!
//! [`EventBus`] owns three lookup structures and every registration,
//! removal and delivery algorithm defined over them:
//!
//! ```text
//!                         ┌───────────────────────────────┐
//!  add_subscriber ──────► │ exact:     type → [entries]   │
//!  add_range_subscriber ─►│ catch-all:        [entries]   │──► resolve(type)
//!  remove_subscriber ────►│ ranges: [(range, [entries])]  │        │
//!                         └───────────────────────────────┘        ▼
//!                              (one Mutex around all three)   ordered deliveries
//!                                                                   │
//!                publish ───────────────────────────────────────────┤
//!                    ├── direct entry  → on_event() awaited inline  │
//!                    └── queued entry  → enqueue, returns at once ◄─┘
//! ```
//!
//! ## Resolution order
//! `resolve` returns matched entries in a fixed order: (1) the exact-type
//! list, (2) the catch-all list, (3) each matching range's list in range
//! registration order. Later steps suppress a subscriber that already
//! appeared in an *earlier step*; entries within one step all pass through.
//! Two consequences, both deliberate:
//!
//! - a subscriber registered for both a specific type and for all events is
//!   delivered once per publish, via its exact registration;
//! - a subscriber holding two distinct overlapping range registrations is
//!   delivered once per range, because ranges are not deduplicated against
//!   each other.
//!
//! ## Double delivery caveat
//! A subscriber registered under the same selector both sync and async holds
//! two independent list entries and receives every matching event twice.
//! Mixed-mode registration is permitted; the dedup key within a list is
//! (subscriber, mode). See the crate docs before relying on this.
//!
//! ## Locking
//! One `Mutex` guards all three structures. It is held for mutations and for
//! the resolution step of `publish`, never across a handler await: inline
//! delivery happens after the lock is released. `clear` is therefore not
//! safe to call concurrently with the delivery phase of an in-flight
//! `publish`; see [`EventBus::clear`].

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::error::BusError;
use crate::events::{Event, EventRange, Payload};
use crate::subscribers::{AsyncDispatch, SubscriberRef};

/// Reserved event type denoting the catch-all selector.
///
/// Host applications must not publish events with this type id. It appears in
/// [`EventBus::registered_events_for`] output when a subscriber holds a
/// catch-all registration, and may be passed in the `event_types` slice of
/// [`EventBus::add_subscriber`] / [`EventBus::remove_subscriber`] as an
/// explicit alias for the catch-all selector. Internally catch-all
/// registrations live in their own structure, so the sentinel never collides
/// with exact-type matching.
pub const ALL_EVENTS: u32 = 0xCAFE_BABE;

/// How events are delivered to a subscriber registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchMode {
    /// Handler runs inline on the publisher's call; errors propagate to the
    /// publisher.
    Sync,
    /// Events are queued and handled on a dedicated worker task; errors are
    /// logged, the publisher never blocks.
    Async,
}

/// One registered entry in a selector list.
enum Entry {
    Direct(SubscriberRef),
    Queued(AsyncDispatch),
}

impl Entry {
    fn new(subscriber: &SubscriberRef, mode: DispatchMode) -> Self {
        match mode {
            DispatchMode::Sync => Entry::Direct(Arc::clone(subscriber)),
            DispatchMode::Async => Entry::Queued(AsyncDispatch::spawn(Arc::clone(subscriber))),
        }
    }

    fn subscriber(&self) -> &SubscriberRef {
        match self {
            Entry::Direct(s) => s,
            Entry::Queued(d) => d.subscriber(),
        }
    }

    fn is_async(&self) -> bool {
        matches!(self, Entry::Queued(_))
    }

    /// Identity check: the wrapper delegates to the wrapped subscriber, so a
    /// queued entry matches the same handle as a direct one.
    fn matches(&self, subscriber: &SubscriberRef) -> bool {
        Arc::ptr_eq(self.subscriber(), subscriber)
    }

    fn stop(&self) {
        if let Entry::Queued(dispatch) = self {
            dispatch.stop();
        }
    }

    fn delivery(&self) -> Delivery {
        match self {
            Entry::Direct(s) => Delivery {
                subscriber: Arc::clone(s),
                queue: None,
            },
            Entry::Queued(d) => Delivery {
                subscriber: Arc::clone(d.subscriber()),
                queue: Some(d.sender()),
            },
        }
    }
}

/// A resolved delivery target, detached from the registry lock.
struct Delivery {
    subscriber: SubscriberRef,
    /// `Some` for async entries: publish only enqueues.
    queue: Option<mpsc::UnboundedSender<Arc<Event>>>,
}

fn contains_subscriber(deliveries: &[Delivery], subscriber: &SubscriberRef) -> bool {
    deliveries
        .iter()
        .any(|d| Arc::ptr_eq(&d.subscriber, subscriber))
}

/// Selector maps. Owned exclusively by the bus, touched only under its lock.
#[derive(Default)]
struct Inner {
    exact: HashMap<u32, Vec<Entry>>,
    catch_all: Vec<Entry>,
    /// Vector rather than a map keyed by [`EventRange`]: resolution iterates
    /// ranges in registration order, which a hash map would not preserve.
    ranges: Vec<(EventRange, Vec<Entry>)>,
}

impl Inner {
    /// Appends to `list` unless an entry for the same (subscriber, mode) pair
    /// is already present.
    fn add_entry(list: &mut Vec<Entry>, subscriber: &SubscriberRef, mode: DispatchMode) {
        let wants_async = mode == DispatchMode::Async;
        if list
            .iter()
            .any(|e| e.matches(subscriber) && e.is_async() == wants_async)
        {
            return;
        }
        list.push(Entry::new(subscriber, mode));
    }

    /// Removes every entry for `subscriber` from `list` (both modes),
    /// stopping workers of removed async entries.
    fn remove_entries(list: &mut Vec<Entry>, subscriber: &SubscriberRef) {
        list.retain(|entry| {
            if entry.matches(subscriber) {
                entry.stop();
                false
            } else {
                true
            }
        });
    }

    fn prune_empty(&mut self) {
        self.exact.retain(|_, list| !list.is_empty());
        self.ranges.retain(|(_, list)| !list.is_empty());
    }
}

/// In-process publish/subscribe event bus.
///
/// Maps event selectors (exact type, catch-all, inclusive range) to
/// subscribers and delivers each published event either inline on the
/// publisher's call or through a per-registration queue + worker, preserving
/// FIFO order per async registration.
///
/// Deliberately not a singleton: scope instances as the application sees
/// fit, typically one shared `Arc<EventBus>`.
///
/// ## Example
/// ```no_run
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use busbar::{DispatchMode, Event, EventBus, Subscribe, SubscriberError, SubscriberRef};
///
/// struct Printer;
///
/// #[async_trait]
/// impl Subscribe for Printer {
///     async fn on_event(&self, event: &Event) -> Result<(), SubscriberError> {
///         println!("type={}", event.event_type);
///         Ok(())
///     }
///     fn name(&self) -> &'static str { "printer" }
/// }
///
/// # async fn demo() -> Result<(), busbar::BusError> {
/// let bus = EventBus::new();
/// let printer: SubscriberRef = Arc::new(Printer);
/// bus.add_subscriber(&printer, DispatchMode::Sync, &[1, 2]);
/// bus.publish(1, "hello").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct EventBus {
    inner: Mutex<Inner>,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `subscriber` for the listed event types.
    ///
    /// An empty `event_types` slice registers under the catch-all selector
    /// (as does listing [`ALL_EVENTS`] explicitly). Registration is
    /// idempotent per (selector, subscriber, mode); re-adding the same handle
    /// in the same mode is a no-op, while adding it in the other mode
    /// appends an independent entry (and thus a second delivery per matching
    /// event — see the module docs).
    ///
    /// With [`DispatchMode::Async`], a fresh queue + worker is created per
    /// selector entry; must be called within a tokio runtime in that case.
    pub fn add_subscriber(
        &self,
        subscriber: &SubscriberRef,
        mode: DispatchMode,
        event_types: &[u32],
    ) {
        let mut inner = self.lock();
        if event_types.is_empty() {
            Inner::add_entry(&mut inner.catch_all, subscriber, mode);
            return;
        }
        for &event_type in event_types {
            if event_type == ALL_EVENTS {
                Inner::add_entry(&mut inner.catch_all, subscriber, mode);
            } else {
                let list = inner.exact.entry(event_type).or_default();
                Inner::add_entry(list, subscriber, mode);
            }
        }
    }

    /// Registers `subscriber` for every event type within `range`.
    ///
    /// Ranges with identical bounds share one subscriber list; overlapping
    /// but unequal ranges are independent registrations, each delivering
    /// separately (see the module docs on resolution order).
    pub fn add_range_subscriber(
        &self,
        subscriber: &SubscriberRef,
        mode: DispatchMode,
        range: EventRange,
    ) {
        let mut inner = self.lock();
        let idx = match inner.ranges.iter().position(|(r, _)| *r == range) {
            Some(idx) => idx,
            None => {
                inner.ranges.push((range, Vec::new()));
                inner.ranges.len() - 1
            }
        };
        Inner::add_entry(&mut inner.ranges[idx].1, subscriber, mode);
    }

    /// Removes `subscriber` registrations.
    ///
    /// With an empty `event_types` slice, the subscriber is removed from
    /// every exact selector, the catch-all selector and every range that
    /// lists it. With a non-empty slice, it is removed from the listed exact
    /// types (and the catch-all selector for [`ALL_EVENTS`]) plus every range
    /// whose interval contains one of the listed types.
    ///
    /// Matching is by handle identity and ignores dispatch mode: both the
    /// sync and the async entry of a mixed-mode registration are removed, and
    /// workers of removed async entries are stopped (their queued events are
    /// discarded).
    pub fn remove_subscriber(&self, subscriber: &SubscriberRef, event_types: &[u32]) {
        let mut inner = self.lock();
        if event_types.is_empty() {
            for list in inner.exact.values_mut() {
                Inner::remove_entries(list, subscriber);
            }
            Inner::remove_entries(&mut inner.catch_all, subscriber);
            for (_, list) in inner.ranges.iter_mut() {
                Inner::remove_entries(list, subscriber);
            }
        } else {
            for &event_type in event_types {
                if event_type == ALL_EVENTS {
                    Inner::remove_entries(&mut inner.catch_all, subscriber);
                } else if let Some(list) = inner.exact.get_mut(&event_type) {
                    Inner::remove_entries(list, subscriber);
                }
                for (range, list) in inner.ranges.iter_mut() {
                    if range.contains(event_type) {
                        Inner::remove_entries(list, subscriber);
                    }
                }
            }
        }
        inner.prune_empty();
    }

    /// Resolves the ordered deliveries for `event_type`. Caller holds no
    /// lock afterwards.
    fn resolve(inner: &Inner, event_type: u32) -> Vec<Delivery> {
        let mut out: Vec<Delivery> = Vec::new();

        if let Some(list) = inner.exact.get(&event_type) {
            out.extend(list.iter().map(Entry::delivery));
        }

        let exact_len = out.len();
        for entry in &inner.catch_all {
            if !contains_subscriber(&out[..exact_len], entry.subscriber()) {
                out.push(entry.delivery());
            }
        }

        let broad_len = out.len();
        for (range, list) in &inner.ranges {
            if !range.contains(event_type) {
                continue;
            }
            for entry in list {
                if !contains_subscriber(&out[..broad_len], entry.subscriber()) {
                    out.push(entry.delivery());
                }
            }
        }

        out
    }

    /// Returns the subscribers that would receive an event of `event_type`,
    /// in delivery order.
    ///
    /// A subscriber holding both a sync and an async entry under the same
    /// selector appears twice, matching its two deliveries.
    pub fn subscribers_for_event(&self, event_type: u32) -> Vec<SubscriberRef> {
        let inner = self.lock();
        Self::resolve(&inner, event_type)
            .into_iter()
            .map(|d| d.subscriber)
            .collect()
    }

    /// Publishes an event carrying `value` as its payload.
    ///
    /// Wraps the value in an `Arc` and delegates to
    /// [`publish_arc`](Self::publish_arc).
    pub async fn publish<V: Any + Send + Sync>(
        &self,
        event_type: u32,
        value: V,
    ) -> Result<(), BusError> {
        self.publish_arc(event_type, Arc::new(value)).await
    }

    /// Publishes an event carrying a pre-built shared payload.
    ///
    /// Builds one [`Event`] (timestamp, sequence number), resolves the
    /// matched entries under the registry lock, then delivers with the lock
    /// released:
    ///
    /// - **direct entries** are awaited inline; the first handler error
    ///   aborts delivery to the entries resolved after it and propagates as
    ///   [`BusError::Delivery`] — there is no isolation between direct
    ///   subscribers;
    /// - **queued entries** only have the event enqueued; the call never
    ///   blocks on them and their handler outcomes never surface here.
    pub async fn publish_arc(&self, event_type: u32, payload: Payload) -> Result<(), BusError> {
        let event = Arc::new(Event::new(event_type, payload));
        let deliveries = {
            let inner = self.lock();
            Self::resolve(&inner, event_type)
        };

        for delivery in deliveries {
            match delivery.queue {
                Some(queue) => {
                    // Stopped workers drop their queue; the send failing then
                    // matches the "queued events are discarded" contract.
                    let _ = queue.send(Arc::clone(&event));
                }
                None => {
                    delivery.subscriber.on_event(&event).await.map_err(|source| {
                        BusError::Delivery {
                            subscriber: delivery.subscriber.name(),
                            event_type,
                            source,
                        }
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Stops every async worker and discards all registrations.
    ///
    /// Queued undelivered events are dropped. Safe with respect to the
    /// registry lock, but an in-flight `publish` on another task may already
    /// have resolved its deliveries and will still run its inline handlers;
    /// callers needing a hard barrier must serialize `publish` and `clear`
    /// externally.
    pub fn clear(&self) {
        let mut inner = self.lock();
        for list in inner.exact.values() {
            for entry in list {
                entry.stop();
            }
        }
        for entry in &inner.catch_all {
            entry.stop();
        }
        for (_, list) in &inner.ranges {
            for entry in list {
                entry.stop();
            }
        }
        inner.exact.clear();
        inner.catch_all.clear();
        inner.ranges.clear();
    }

    /// Returns the exact event types `subscriber` is registered for, sorted,
    /// with [`ALL_EVENTS`] appended when it holds a catch-all registration.
    pub fn registered_events_for(&self, subscriber: &SubscriberRef) -> Vec<u32> {
        let inner = self.lock();
        let mut types: Vec<u32> = inner
            .exact
            .iter()
            .filter(|(_, list)| list.iter().any(|e| e.matches(subscriber)))
            .map(|(&ty, _)| ty)
            .collect();
        types.sort_unstable();
        if inner.catch_all.iter().any(|e| e.matches(subscriber)) {
            types.push(ALL_EVENTS);
        }
        types
    }

    /// Returns the ranges `subscriber` is registered for, in registration
    /// order.
    pub fn registered_ranges_for(&self, subscriber: &SubscriberRef) -> Vec<EventRange> {
        let inner = self.lock();
        inner
            .ranges
            .iter()
            .filter(|(_, list)| list.iter().any(|e| e.matches(subscriber)))
            .map(|(range, _)| *range)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SubscriberError;
    use crate::subscribers::Subscribe;
    use async_trait::async_trait;

    /// Inert subscriber used to exercise registry bookkeeping.
    struct Probe;

    #[async_trait]
    impl Subscribe for Probe {
        async fn on_event(&self, _event: &Event) -> Result<(), SubscriberError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "probe"
        }
    }

    fn probe() -> SubscriberRef {
        Arc::new(Probe)
    }

    fn ids(subs: &[SubscriberRef]) -> Vec<*const ()> {
        subs.iter()
            .map(|s| Arc::as_ptr(s) as *const ())
            .collect()
    }

    #[test]
    fn test_sync_registration_is_idempotent() {
        let bus = EventBus::new();
        let sub = probe();

        bus.add_subscriber(&sub, DispatchMode::Sync, &[1]);
        bus.add_subscriber(&sub, DispatchMode::Sync, &[1]);

        assert_eq!(bus.subscribers_for_event(1).len(), 1);
    }

    #[test]
    fn test_empty_types_registers_catch_all() {
        let bus = EventBus::new();
        let sub = probe();

        bus.add_subscriber(&sub, DispatchMode::Sync, &[]);

        assert_eq!(bus.subscribers_for_event(1).len(), 1);
        assert_eq!(bus.subscribers_for_event(999).len(), 1);
        assert_eq!(bus.registered_events_for(&sub), vec![ALL_EVENTS]);
    }

    #[test]
    fn test_all_events_sentinel_aliases_catch_all() {
        let bus = EventBus::new();
        let sub = probe();

        bus.add_subscriber(&sub, DispatchMode::Sync, &[ALL_EVENTS]);
        assert_eq!(bus.subscribers_for_event(42).len(), 1);

        bus.remove_subscriber(&sub, &[ALL_EVENTS]);
        assert!(bus.subscribers_for_event(42).is_empty());
    }

    #[test]
    fn test_resolution_order_exact_then_all_then_ranges() {
        let bus = EventBus::new();
        let exact = probe();
        let all = probe();
        let ranged_a = probe();
        let ranged_b = probe();

        // Register in scrambled order; resolution order must not depend on it.
        bus.add_range_subscriber(&ranged_a, DispatchMode::Sync, EventRange::new(0, 10));
        bus.add_subscriber(&all, DispatchMode::Sync, &[]);
        bus.add_range_subscriber(&ranged_b, DispatchMode::Sync, EventRange::new(5, 6));
        bus.add_subscriber(&exact, DispatchMode::Sync, &[5]);

        let resolved = bus.subscribers_for_event(5);
        assert_eq!(
            ids(&resolved),
            ids(&[exact, all, ranged_a, ranged_b]),
            "expected exact, catch-all, then ranges in registration order"
        );
    }

    #[test]
    fn test_catch_all_deduped_against_exact() {
        let bus = EventBus::new();
        let sub = probe();

        bus.add_subscriber(&sub, DispatchMode::Sync, &[7]);
        bus.add_subscriber(&sub, DispatchMode::Sync, &[]);

        // Both registrations exist independently...
        assert_eq!(bus.registered_events_for(&sub), vec![7, ALL_EVENTS]);
        // ...but an event matching both resolves the subscriber once.
        assert_eq!(bus.subscribers_for_event(7).len(), 1);
        // Non-matching types still reach it through the catch-all entry.
        assert_eq!(bus.subscribers_for_event(8).len(), 1);
    }

    #[test]
    fn test_range_deduped_against_exact_but_not_other_ranges() {
        let bus = EventBus::new();
        let sub = probe();

        bus.add_range_subscriber(&sub, DispatchMode::Sync, EventRange::new(10, 20));
        bus.add_range_subscriber(&sub, DispatchMode::Sync, EventRange::new(15, 25));

        // Distinct range keys deliver once each.
        assert_eq!(bus.subscribers_for_event(18).len(), 2);
        assert_eq!(bus.subscribers_for_event(12).len(), 1);
        assert_eq!(bus.subscribers_for_event(24).len(), 1);

        // An exact registration suppresses the range matches.
        bus.add_subscriber(&sub, DispatchMode::Sync, &[18]);
        assert_eq!(bus.subscribers_for_event(18).len(), 1);
    }

    #[test]
    fn test_identical_range_bounds_share_one_list() {
        let bus = EventBus::new();
        let sub = probe();

        bus.add_range_subscriber(&sub, DispatchMode::Sync, EventRange::new(10, 20));
        bus.add_range_subscriber(&sub, DispatchMode::Sync, EventRange::new(10, 20));

        assert_eq!(bus.subscribers_for_event(15).len(), 1);
        assert_eq!(bus.registered_ranges_for(&sub), vec![EventRange::new(10, 20)]);
    }

    #[tokio::test]
    async fn test_mixed_mode_same_selector_keeps_two_entries() {
        let bus = EventBus::new();
        let sub = probe();

        bus.add_subscriber(&sub, DispatchMode::Sync, &[1]);
        bus.add_subscriber(&sub, DispatchMode::Async, &[1]);

        // Known caveat: two independent entries, two deliveries per event.
        assert_eq!(bus.subscribers_for_event(1).len(), 2);

        // Removal ignores mode and drops both.
        bus.remove_subscriber(&sub, &[1]);
        assert!(bus.subscribers_for_event(1).is_empty());
    }

    #[test]
    fn test_targeted_removal_covers_containing_ranges() {
        let bus = EventBus::new();
        let sub = probe();

        bus.add_subscriber(&sub, DispatchMode::Sync, &[15]);
        bus.add_range_subscriber(&sub, DispatchMode::Sync, EventRange::new(10, 20));
        bus.add_range_subscriber(&sub, DispatchMode::Sync, EventRange::new(30, 40));

        bus.remove_subscriber(&sub, &[15]);

        // Exact entry and the containing range are gone; [30, 40] survives.
        assert!(bus.subscribers_for_event(15).is_empty());
        assert_eq!(bus.registered_ranges_for(&sub), vec![EventRange::new(30, 40)]);
        assert_eq!(bus.subscribers_for_event(35).len(), 1);
    }

    #[test]
    fn test_remove_all_silences_every_selector() {
        let bus = EventBus::new();
        let sub = probe();
        let other = probe();

        bus.add_subscriber(&sub, DispatchMode::Sync, &[1, 2]);
        bus.add_subscriber(&sub, DispatchMode::Sync, &[]);
        bus.add_range_subscriber(&sub, DispatchMode::Sync, EventRange::new(10, 20));
        bus.add_subscriber(&other, DispatchMode::Sync, &[1]);

        bus.remove_subscriber(&sub, &[]);

        assert!(bus.registered_events_for(&sub).is_empty());
        assert!(bus.registered_ranges_for(&sub).is_empty());
        // Unrelated registrations are untouched.
        assert_eq!(bus.subscribers_for_event(1).len(), 1);
    }

    #[test]
    fn test_distinct_instances_are_distinct_subscribers() {
        let bus = EventBus::new();
        let a = probe();
        let b = probe();

        bus.add_subscriber(&a, DispatchMode::Sync, &[1]);
        bus.add_subscriber(&b, DispatchMode::Sync, &[1]);

        assert_eq!(bus.subscribers_for_event(1).len(), 2);

        bus.remove_subscriber(&a, &[]);
        let remaining = bus.subscribers_for_event(1);
        assert_eq!(remaining.len(), 1);
        assert!(Arc::ptr_eq(&remaining[0], &b));
    }

    #[test]
    fn test_registered_events_are_sorted() {
        let bus = EventBus::new();
        let sub = probe();

        bus.add_subscriber(&sub, DispatchMode::Sync, &[9, 3, 7]);
        assert_eq!(bus.registered_events_for(&sub), vec![3, 7, 9]);
    }

    #[tokio::test]
    async fn test_clear_discards_all_registrations() {
        let bus = EventBus::new();
        let sub = probe();

        bus.add_subscriber(&sub, DispatchMode::Async, &[1]);
        bus.add_subscriber(&sub, DispatchMode::Sync, &[]);
        bus.add_range_subscriber(&sub, DispatchMode::Sync, EventRange::new(0, 100));

        bus.clear();

        assert!(bus.subscribers_for_event(1).is_empty());
        assert!(bus.registered_events_for(&sub).is_empty());
        assert!(bus.registered_ranges_for(&sub).is_empty());
    }
}
