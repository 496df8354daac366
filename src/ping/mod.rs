//! Host reachability monitoring.
//!
//! This module contains:
//! - [`TargetConfig`] and [`resolve_ipv4`]: validated per-host settings
//! - [`Target`]: the Unknown/Reachable/Unreachable state machine
//! - [`AvailabilityAggregator`]: none/some/all/count roll-up over targets
//! - [`Prober`] and [`TcpProber`]: the one blocking operation, bounded by
//!   a timeout
//! - [`PingMonitor`]: tokio runtime driving probes on their intervals
//!
//! # Example
//!
//! ```
//! use std::net::Ipv4Addr;
//! use std::time::Instant;
//! use reachability_rs_esp32::ping::{
//!     AvailabilityAggregator, ProbeOutcome, Target, TargetConfig,
//! };
//!
//! let mut lan = AvailabilityAggregator::new("lan");
//! let router = lan.register(Target::new(TargetConfig::new(
//!     "router",
//!     Ipv4Addr::new(192, 168, 1, 1),
//! )))?;
//! lan.register(Target::new(TargetConfig::new(
//!     "nas",
//!     Ipv4Addr::new(192, 168, 1, 10),
//! )))?;
//! lan.seal();
//!
//! lan.record(router, ProbeOutcome::Reachable, Instant::now());
//! let availability = lan.availability();
//! assert!(availability.some);
//! assert!(!availability.all);
//! # Ok::<(), reachability_rs_esp32::ConfigError>(())
//! ```

mod aggregator;
mod config;
mod monitor;
mod probe;
mod resolve;
mod target;

pub use aggregator::{Availability, AvailabilityAggregator, TargetId};
pub use config::{TargetConfig, DEFAULT_INTERVAL, DEFAULT_PROBE_PORT, DEFAULT_TIMEOUT};
pub use monitor::{MonitorHandle, PingMonitor, QUEUE_CAPACITY, SINCE_POLL_INTERVAL};
pub use probe::{Prober, TcpProber};
pub use resolve::resolve_ipv4;
pub use target::{ProbeOutcome, Reachability, Target, Transition};
