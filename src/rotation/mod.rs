//! Circular rotation over a fixed list of item handles.
//!
//! This module contains:
//! - [`ring`]: the frozen, shared ring and its append-only builder
//! - [`iterator`]: independent cursors that advance, retreat, or jump
//!
//! Items are opaque to the ring. It stores them in registration order and
//! never inspects, copies, or drops them while iterators are alive. Use a
//! cheap handle type (an `Arc`, an index, an interned name) for `T`.
//!
//! # Example
//!
//! ```
//! use reachability_rs_esp32::rotation::RotationBuilder;
//!
//! let mut builder = RotationBuilder::new();
//! builder.add("clock").add("weather").add("network");
//! let ring = builder.build()?;
//!
//! let mut page = ring.iterator();
//! assert_eq!(*page.current(), "clock");
//! assert_eq!(*page.retreat(), "network");
//! assert_eq!(*page.jump(1)?, "weather");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Sharing
//!
//! The ring is immutable after [`RotationBuilder::build`], so any number of
//! iterators may read it concurrently. A single iterator mutates its cursor
//! in place; wrap it in a mutex if more than one task drives it.

mod iterator;
mod ring;

pub use iterator::RingIterator;
pub use ring::{RotationBuilder, RotationRing};
