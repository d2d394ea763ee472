//! # Inclusive event-id interval used as a registry key.
//!
//! [`EventRange`] identifies a contiguous block of event types. The bus keeps
//! one subscriber list per distinct range; two ranges are the same key exactly
//! when their bounds are equal. Overlapping-but-unequal ranges are independent
//! keys and are never merged or split.

/// Inclusive `[low, high]` interval of event types.
///
/// Equality and hashing are structural: `EventRange::new(10, 20)` is the same
/// registry key as any other range with bounds `10` and `20`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventRange {
    /// Lower bound, inclusive.
    pub low: u32,
    /// Upper bound, inclusive.
    pub high: u32,
}

impl EventRange {
    /// Creates a range covering `low..=high`.
    ///
    /// Bounds are stored as given; an inverted range (`low > high`) contains
    /// no event type.
    pub fn new(low: u32, high: u32) -> Self {
        Self { low, high }
    }

    /// Returns `true` if `event_type` falls within the bounds.
    #[inline]
    pub fn contains(&self, event_type: u32) -> bool {
        event_type >= self.low && event_type <= self.high
    }
}

impl std::fmt::Display for EventRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.low, self.high)
    }
}
