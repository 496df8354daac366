//! Target configuration and defaults.

use crate::error::ConfigError;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default period between probes of one target.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(16);

/// Default deadline for a single probe.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);

/// Default TCP port knocked by [`TcpProber`](super::TcpProber).
pub const DEFAULT_PROBE_PORT: u16 = 80;

/// Validated settings for one monitored host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    /// Name used in logs and sink names.
    pub name: String,
    /// Resolved address.
    pub address: Ipv4Addr,
    /// Poll period.
    pub interval: Duration,
    /// Per-probe deadline, independent of `interval`.
    pub timeout: Duration,
}

impl TargetConfig {
    /// Target with default interval and timeout.
    pub fn new(name: impl Into<String>, address: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            address,
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the poll period.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Override the probe deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check that both durations are positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroDuration("interval"));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("timeout"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TargetConfig::new("router", Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(config.interval, Duration::from_secs(16));
        assert_eq!(config.timeout, Duration::from_secs(4));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_durations_rejected() {
        let config = TargetConfig::new("router", Ipv4Addr::LOCALHOST);
        assert_eq!(
            config.clone().with_interval(Duration::ZERO).validate(),
            Err(ConfigError::ZeroDuration("interval"))
        );
        assert_eq!(
            config.with_timeout(Duration::ZERO).validate(),
            Err(ConfigError::ZeroDuration("timeout"))
        );
    }
}
