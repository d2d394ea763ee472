//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait — the contract every event
//! consumer implements — and the machinery behind asynchronous delivery.
//!
//! ## Architecture
//! ```text
//! Event flow per registered entry:
//!
//!   sync entry:   publish ──► subscriber.on_event()        (inline, errors propagate)
//!
//!   async entry:  publish ──► [unbounded queue] ──► worker ──► subscriber.on_event()
//!                                                      └─► Err/panic → logged, loop continues
//! ```
//!
//! ## Contents
//! - [`Subscribe`], [`SubscriberRef`] — the subscriber contract and its
//!   shared handle (also the subscriber's identity within the bus)
//! - [`AsyncDispatch`] (crate-private) — per-registration queue + worker
//! - [`LogWriter`] — demo subscriber that logs every event

mod dispatch;
mod log;
mod subscribe;

pub(crate) use dispatch::AsyncDispatch;
pub use log::LogWriter;
pub use subscribe::{Subscribe, SubscriberRef};
