//! Host reachability monitoring and item rotation for ESP32 firmware.
//!
//! This library contains platform-independent components that can be tested
//! on the host machine without ESP32 hardware:
//!
//! - [`rotation`]: a frozen ring of item handles with independent cursors
//! - [`ping`]: per-host reachability state and none/some/all roll-ups,
//!   driven by a tokio runtime
//! - [`since`]: elapsed time since a condition last changed
//! - [`sink`]: the push interface to sensors owned by the firmware
//! - [`config`]: JSON monitor configuration
//! - [`console`]: operator commands over a serial line

// Allow the crate to reference itself by name (needed for proc-macro generated code)
extern crate self as reachability_rs_esp32;

pub mod clock;
pub mod config;
pub mod console;
pub mod error;
pub mod ping;
pub mod rotation;
pub mod since;
pub mod sink;
#[cfg(feature = "tap-tests")]
pub mod testing;

// Re-export commonly used items
pub use clock::{Clock, SystemClock, TokioClock};
pub use config::MonitorConfig;
pub use error::{ConfigError, IndexError, LoadError, MonitorError};
pub use ping::{
    Availability, AvailabilityAggregator, MonitorHandle, PingMonitor, ProbeOutcome, Prober,
    Reachability, Target, TargetConfig, TcpProber,
};
pub use rotation::{RingIterator, RotationBuilder, RotationRing};
pub use since::{format_duration, SinceTracker};

// Re-export testing items (only with tap-tests feature)
#[cfg(feature = "tap-tests")]
pub use testing::TestRunner;
