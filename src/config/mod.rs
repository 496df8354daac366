//! Declarative monitor configuration.
//!
//! A JSON file lists ping components (each a set of targets with optional
//! roll-up outputs) and rotations (ordered items plus named iterators).
//! Loading validates everything up front; building resolves addresses and
//! wires sinks. Every failure here is a [`ConfigError`] raised before the
//! runtime starts.
//!
//! # Example
//!
//! ```json
//! {
//!   "probe_port": 80,
//!   "ping": [
//!     {
//!       "name": "lan",
//!       "all": true,
//!       "count": true,
//!       "since": { "update_interval": "10s", "text": true },
//!       "targets": [
//!         { "name": "router", "address": "192.168.1.1", "able": true },
//!         { "address": "nas.lan", "interval": "30s", "timeout": "2s" }
//!       ]
//!     }
//!   ],
//!   "rotation": [
//!     { "name": "display", "items": ["clock", "weather"], "iterators": ["pages"] }
//!   ]
//! }
//! ```

pub mod duration;

use crate::console::{Item, IteratorSet};
use crate::error::{ConfigError, LoadError};
use crate::ping::{
    resolve_ipv4, AvailabilityAggregator, Target, TargetConfig, DEFAULT_INTERVAL,
    DEFAULT_PROBE_PORT, DEFAULT_TIMEOUT,
};
use crate::rotation::RotationRing;
use crate::since::{SinceTracker, DEFAULT_UPDATE_INTERVAL};
use crate::sink::SinkFactory;
use log::info;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

pub use duration::parse_duration;

fn default_probe_port() -> u16 {
    DEFAULT_PROBE_PORT
}

fn default_interval() -> Duration {
    DEFAULT_INTERVAL
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_update_interval() -> Duration {
    DEFAULT_UPDATE_INTERVAL
}

/// Root of a monitor configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// TCP port knocked by the host prober.
    #[serde(default = "default_probe_port")]
    pub probe_port: u16,
    #[serde(default)]
    pub ping: Vec<PingSection>,
    #[serde(default)]
    pub rotation: Vec<RotationSection>,
}

/// One ping component: a set of targets and its roll-up outputs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PingSection {
    /// Defaults to `ping<index>`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub none: bool,
    #[serde(default)]
    pub some: bool,
    #[serde(default)]
    pub all: bool,
    #[serde(default)]
    pub count: bool,
    #[serde(default)]
    pub since: Option<SinceSection>,
    pub targets: Vec<TargetSection>,
}

/// One monitored host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSection {
    /// Defaults to the address.
    #[serde(default)]
    pub name: Option<String>,
    /// IPv4 literal or host name.
    pub address: String,
    #[serde(default = "default_interval", deserialize_with = "duration::deserialize")]
    pub interval: Duration,
    #[serde(default = "default_timeout", deserialize_with = "duration::deserialize")]
    pub timeout: Duration,
    /// Publish this target's reachability.
    #[serde(default)]
    pub able: bool,
    #[serde(default)]
    pub since: Option<SinceSection>,
}

/// Elapsed-time output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinceSection {
    #[serde(
        default = "default_update_interval",
        deserialize_with = "duration::deserialize"
    )]
    pub update_interval: Duration,
    /// Also publish `D HH:MM:SS` text.
    #[serde(default)]
    pub text: bool,
}

/// Ordered items and the iterators walking them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RotationSection {
    pub name: String,
    pub items: Vec<String>,
    /// A rotation without iterators is legal and inert.
    #[serde(default)]
    pub iterators: Vec<String>,
}

impl MonitorConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check names and durations. Addresses are checked by the build step.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut pings = HashSet::new();
        for (index, ping) in self.ping.iter().enumerate() {
            let name = ping.name(index);
            if !pings.insert(name.clone()) {
                return Err(ConfigError::DuplicateName(name));
            }
            ping.validate()?;
        }

        let mut rotations = HashSet::new();
        let mut iterators = HashSet::new();
        for rotation in &self.rotation {
            if !rotations.insert(rotation.name.as_str()) {
                return Err(ConfigError::DuplicateName(rotation.name.clone()));
            }
            if rotation.items.is_empty() {
                return Err(ConfigError::EmptyRotation);
            }
            for iterator in &rotation.iterators {
                if !iterators.insert(iterator.as_str()) {
                    return Err(ConfigError::DuplicateName(iterator.clone()));
                }
            }
        }
        Ok(())
    }

    /// Build one aggregator per ping component, in file order.
    pub fn build_pings(
        &self,
        sinks: &mut dyn SinkFactory,
    ) -> Result<Vec<AvailabilityAggregator>, ConfigError> {
        self.ping
            .iter()
            .enumerate()
            .map(|(index, ping)| ping.build(index, sinks))
            .collect()
    }

    /// Build every rotation and collect their iterators by name.
    pub fn build_rotations(&self) -> Result<IteratorSet, ConfigError> {
        let mut set = IteratorSet::new();
        for rotation in &self.rotation {
            let ring = rotation.build()?;
            for iterator in &rotation.iterators {
                set.insert(iterator.as_str(), rotation.name.as_str(), ring.iterator())?;
            }
        }
        Ok(set)
    }
}

impl PingSection {
    /// Configured name, or `ping<index>`.
    pub fn name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("ping{}", index))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for target in &self.targets {
            if !names.insert(target.name()) {
                return Err(ConfigError::DuplicateName(target.name().to_string()));
            }
            if target.interval.is_zero() {
                return Err(ConfigError::ZeroDuration("interval"));
            }
            if target.timeout.is_zero() {
                return Err(ConfigError::ZeroDuration("timeout"));
            }
            if let Some(since) = &target.since {
                since.validate()?;
            }
        }
        if let Some(since) = &self.since {
            since.validate()?;
        }
        Ok(())
    }

    /// Resolve targets and wire outputs to sinks from `sinks`.
    ///
    /// Sink names are `<ping>/<output>` and `<ping>/<target>/<output>`.
    pub fn build(
        &self,
        index: usize,
        sinks: &mut dyn SinkFactory,
    ) -> Result<AvailabilityAggregator, ConfigError> {
        self.validate()?;
        let name = self.name(index);
        let mut aggregator = AvailabilityAggregator::new(name.as_str());

        for section in &self.targets {
            let address = resolve_ipv4(&section.address)?;
            let config = TargetConfig::new(section.name(), address)
                .with_interval(section.interval)
                .with_timeout(section.timeout);
            config.validate()?;

            let prefix = format!("{}/{}", name, section.name());
            let mut target = Target::new(config);
            if section.able {
                target.attach_able(sinks.binary(&format!("{}/able", prefix)));
            }
            if let Some(since) = &section.since {
                target.attach_since(since.build(&format!("{}/since", prefix), sinks));
            }
            aggregator.register(target)?;
        }

        if self.none {
            aggregator.attach_none(sinks.binary(&format!("{}/none", name)));
        }
        if self.some {
            aggregator.attach_some(sinks.binary(&format!("{}/some", name)));
        }
        if self.all {
            aggregator.attach_all(sinks.binary(&format!("{}/all", name)));
        }
        if self.count {
            aggregator.attach_count(sinks.numeric(&format!("{}/count", name)));
        }
        if let Some(since) = &self.since {
            aggregator.attach_since(since.build(&format!("{}/since", name), sinks));
        }

        info!(
            "Built ping '{}' with {} targets",
            name,
            aggregator.targets().len()
        );
        Ok(aggregator)
    }
}

impl TargetSection {
    /// Configured name, or the address.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

impl SinceSection {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("update_interval"));
        }
        Ok(())
    }

    /// Tracker publishing seconds to `<name>` and text to `<name>/text`.
    pub fn build(&self, name: &str, sinks: &mut dyn SinkFactory) -> SinceTracker {
        let mut since = SinceTracker::new(name, self.update_interval);
        since.attach_sensor(sinks.numeric(name));
        if self.text {
            since.attach_text(sinks.text(&format!("{}/text", name)));
        }
        since
    }
}

impl RotationSection {
    /// Freeze the items into a ring.
    pub fn build(&self) -> Result<RotationRing<Item>, ConfigError> {
        RotationRing::new(self.items.iter().map(|item| Item::from(item.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{BinarySink, LogSink, NumericSink, TextSink};

    const EXAMPLE: &str = r#"{
        "ping": [
            {
                "name": "lan",
                "none": true,
                "all": true,
                "count": true,
                "since": { "update_interval": "5s", "text": true },
                "targets": [
                    { "name": "router", "address": "192.168.1.1", "able": true },
                    { "address": "192.168.1.10", "interval": 30000, "timeout": "2s",
                      "since": {} }
                ]
            },
            { "targets": [] }
        ],
        "rotation": [
            { "name": "display", "items": ["clock", "weather", "network"],
              "iterators": ["pages", "ticker"] },
            { "name": "idle", "items": ["logo"] }
        ]
    }"#;

    /// Hands out log sinks and remembers what was asked for.
    #[derive(Default)]
    struct Names(Vec<String>);

    impl SinkFactory for Names {
        fn binary(&mut self, name: &str) -> Box<dyn BinarySink> {
            self.0.push(name.to_string());
            Box::new(LogSink::new(name))
        }

        fn numeric(&mut self, name: &str) -> Box<dyn NumericSink> {
            self.0.push(name.to_string());
            Box::new(LogSink::new(name))
        }

        fn text(&mut self, name: &str) -> Box<dyn TextSink> {
            self.0.push(name.to_string());
            Box::new(LogSink::new(name))
        }
    }

    #[test]
    fn test_parse_example() {
        let config = MonitorConfig::from_json(EXAMPLE).unwrap();
        assert_eq!(config.probe_port, 80);
        assert_eq!(config.ping.len(), 2);

        let lan = &config.ping[0];
        assert_eq!(lan.name(0), "lan");
        assert_eq!(config.ping[1].name(1), "ping1");
        assert_eq!(lan.targets[0].interval, DEFAULT_INTERVAL);
        assert_eq!(lan.targets[0].timeout, DEFAULT_TIMEOUT);
        assert_eq!(lan.targets[1].name(), "192.168.1.10");
        assert_eq!(lan.targets[1].interval, Duration::from_secs(30));
        assert_eq!(lan.targets[1].timeout, Duration::from_secs(2));
        assert_eq!(
            lan.targets[1].since.as_ref().unwrap().update_interval,
            DEFAULT_UPDATE_INTERVAL
        );
    }

    #[test]
    fn test_build_wires_requested_outputs() {
        let config = MonitorConfig::from_json(EXAMPLE).unwrap();
        let mut names = Names::default();
        let pings = config.build_pings(&mut names).unwrap();

        assert_eq!(pings.len(), 2);
        assert_eq!(pings[0].targets().len(), 2);
        assert!(pings[1].targets().is_empty());
        assert!(pings[1].availability().all);

        assert_eq!(
            names.0,
            vec![
                "lan/router/able",
                "lan/192.168.1.10/since",
                "lan/none",
                "lan/all",
                "lan/count",
                "lan/since",
                "lan/since/text",
            ]
        );
    }

    #[test]
    fn test_build_rotations() {
        let config = MonitorConfig::from_json(EXAMPLE).unwrap();
        let set = config.build_rotations().unwrap();
        assert_eq!(set.len(), 2);

        let pages = set.get("pages").unwrap();
        let ticker = set.get("ticker").unwrap();
        assert!(pages.ring().ptr_eq(ticker.ring()));
        assert_eq!(&**pages.current(), "clock");
    }

    #[test]
    fn test_empty_rotation_rejected() {
        let json = r#"{ "rotation": [ { "name": "r", "items": [] } ] }"#;
        assert!(matches!(
            MonitorConfig::from_json(json),
            Err(LoadError::Invalid(ConfigError::EmptyRotation))
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let json = r#"{ "ping": [ { "targets": [
            { "address": "10.0.0.1" }, { "address": "10.0.0.1" } ] } ] }"#;
        assert!(matches!(
            MonitorConfig::from_json(json),
            Err(LoadError::Invalid(ConfigError::DuplicateName(_)))
        ));

        let json = r#"{ "rotation": [
            { "name": "a", "items": ["x"], "iterators": ["it"] },
            { "name": "b", "items": ["y"], "iterators": ["it"] } ] }"#;
        assert!(matches!(
            MonitorConfig::from_json(json),
            Err(LoadError::Invalid(ConfigError::DuplicateName(name))) if name == "it"
        ));
    }

    #[test]
    fn test_zero_durations_rejected() {
        let json = r#"{ "ping": [ { "targets": [
            { "address": "10.0.0.1", "timeout": 0 } ] } ] }"#;
        assert!(matches!(
            MonitorConfig::from_json(json),
            Err(LoadError::Invalid(ConfigError::ZeroDuration("timeout")))
        ));

        let json = r#"{ "ping": [ { "since": { "update_interval": "0s" }, "targets": [] } ] }"#;
        assert!(matches!(
            MonitorConfig::from_json(json),
            Err(LoadError::Invalid(ConfigError::ZeroDuration("update_interval")))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            MonitorConfig::from_json(r#"{ "ping": [ { "targets": [ { } ] } ] }"#),
            Err(LoadError::Json(_))
        ));
        assert!(matches!(
            MonitorConfig::from_json(r#"{ "pings": [] }"#),
            Err(LoadError::Json(_))
        ));
        assert!(matches!(
            MonitorConfig::from_json(r#"{ "ping": [ { "targets": [
                { "address": "10.0.0.1", "interval": "fast" } ] } ] }"#),
            Err(LoadError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            MonitorConfig::load("/nonexistent/monitor.json"),
            Err(LoadError::Io(_))
        ));
    }

    #[test]
    fn test_unresolvable_address_fails_build() {
        let json = r#"{ "ping": [ { "targets": [ { "address": "no-such-host.invalid" } ] } ] }"#;
        let config = MonitorConfig::from_json(json).unwrap();
        assert!(matches!(
            config.build_pings(&mut Names::default()),
            Err(ConfigError::UnresolvedAddress { .. })
        ));
    }
}
