//! Monotonic time sources.
//!
//! State machines in this crate take `now` as an argument so they can be
//! driven deterministically. The runtime reads `now` from a [`Clock`].

use std::time::Instant;

/// Source of monotonic timestamps.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// The standard library's monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Tokio's clock.
///
/// Follows paused and advanced time in `#[tokio::test(start_paused = true)]`
/// tests, and matches [`SystemClock`] otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}
