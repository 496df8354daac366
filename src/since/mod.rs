//! Time elapsed since a condition last changed.
//!
//! A [`SinceTracker`] is bound to a boolean source (a single target's
//! reachability, or an aggregate) and reports whole seconds since the
//! source last flipped. Readings are pushed to an optional numeric sensor
//! and an optional text sink formatted by [`format_duration`].

mod format;
mod tracker;

pub use format::format_duration;
pub use tracker::{SinceTracker, DEFAULT_UPDATE_INTERVAL};
