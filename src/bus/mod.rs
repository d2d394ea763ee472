//! Event bus registry and publish algorithm.
//!
//! ## Contents
//! - [`EventBus`] — selector maps, registration/removal, resolution, publish
//! - [`DispatchMode`] — sync (inline) vs async (queued) delivery
//! - [`ALL_EVENTS`] — reserved catch-all sentinel
//!
//! See `registry.rs` module docs for the resolution order and locking rules.

mod registry;

pub use registry::{DispatchMode, EventBus, ALL_EVENTS};
