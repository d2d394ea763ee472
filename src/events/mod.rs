//! Event data model: the published value object and the range selector key.
//!
//! ## Contents
//! - [`Event`], [`Payload`] — immutable event record and its opaque payload
//! - [`EventRange`] — inclusive `[low, high]` interval used as a registry key
//!
//! The registry itself lives in [`crate::bus`]; subscribers in
//! [`crate::subscribers`].

mod event;
mod range;

pub use event::{Event, Payload};
pub use range::EventRange;
