//! Per-host reachability state machine.

use super::TargetConfig;
use crate::sink::{BinaryOutput, BinarySink};
use crate::since::SinceTracker;
use log::{debug, info, warn};
use std::fmt;
use std::time::Instant;

/// Last known reachability of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reachability {
    /// Not probed yet.
    #[default]
    Unknown,
    /// Last probe succeeded.
    Reachable,
    /// Last probe failed or timed out.
    Unreachable,
}

impl Reachability {
    /// Returns true only for [`Reachable`](Self::Reachable).
    pub fn is_reachable(self) -> bool {
        self == Self::Reachable
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Reachable => "reachable",
            Self::Unreachable => "unreachable",
        };
        f.write_str(s)
    }
}

/// Result of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The host answered within the timeout.
    Reachable,
    /// The probe failed outright (no route, reset, send error).
    Failed,
    /// The timeout elapsed first. Expected, never an error.
    TimedOut,
}

impl ProbeOutcome {
    /// Returns true if the host answered.
    pub fn is_reachable(self) -> bool {
        self == Self::Reachable
    }
}

impl From<ProbeOutcome> for Reachability {
    fn from(outcome: ProbeOutcome) -> Self {
        if outcome.is_reachable() {
            Self::Reachable
        } else {
            Self::Unreachable
        }
    }
}

/// A reachability change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Reachability,
    pub to: Reachability,
    pub at: Instant,
}

/// One monitored host.
///
/// Moves from `Unknown` to `Reachable` or `Unreachable` on its first probe,
/// then flips between those two. The transition timestamp, the `able`
/// output and the since tracker only move when the state changes, never on
/// a repeated outcome.
pub struct Target {
    config: TargetConfig,
    state: Reachability,
    last_transition: Option<Instant>,
    enabled: bool,
    able: Option<BinaryOutput>,
    since: Option<SinceTracker>,
}

impl Target {
    /// Create an enabled target in the `Unknown` state.
    pub fn new(config: TargetConfig) -> Self {
        Self {
            config,
            state: Reachability::Unknown,
            last_transition: None,
            enabled: true,
            able: None,
            since: None,
        }
    }

    /// Publish reachability changes to `sink`. The current state is pushed
    /// immediately (unknown reads as not reachable).
    pub fn attach_able(&mut self, sink: Box<dyn BinarySink>) {
        let mut able = BinaryOutput::boxed(sink);
        able.publish(self.state.is_reachable());
        self.able = Some(able);
    }

    /// Track time since this target's last transition.
    pub fn attach_since(&mut self, since: SinceTracker) {
        let mut since = match self.last_transition {
            Some(when) => since.with_when(when),
            None => since,
        };
        since.bind(self.state.is_reachable());
        self.since = Some(since);
    }

    /// Apply a probe outcome observed at `now`.
    ///
    /// Returns the transition if the state changed.
    pub fn record(&mut self, outcome: ProbeOutcome, now: Instant) -> Option<Transition> {
        match outcome {
            ProbeOutcome::Reachable => debug!("[{}] {} answered", self.name(), self.address()),
            ProbeOutcome::Failed => warn!("[{}] {} probe failed", self.name(), self.address()),
            ProbeOutcome::TimedOut => warn!(
                "[{}] {} timed out after {:?}",
                self.name(),
                self.address(),
                self.config.timeout
            ),
        }

        let next = Reachability::from(outcome);
        if next == self.state {
            return None;
        }

        let transition = Transition {
            from: self.state,
            to: next,
            at: now,
        };
        info!(
            "[{}] {} {} -> {}",
            self.name(),
            self.address(),
            transition.from,
            transition.to
        );

        self.state = next;
        self.last_transition = Some(now);
        if let Some(able) = self.able.as_mut() {
            able.publish(next.is_reachable());
        }
        if let Some(since) = self.since.as_mut() {
            // Unknown -> Unreachable is a transition even though the
            // boolean view stays false.
            since.bind(next.is_reachable());
            since.on_transition(now);
        }
        Some(transition)
    }

    /// Enable or disable probing. Returns true if the flag changed.
    ///
    /// State is kept while disabled and reused when re-enabled.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        if self.enabled == enabled {
            return false;
        }
        info!(
            "[{}] {}",
            self.name(),
            if enabled { "enabled" } else { "disabled" }
        );
        self.enabled = enabled;
        true
    }

    /// Tick the since tracker if its update interval passed.
    pub fn poll_since(&mut self, now: Instant) {
        if let Some(since) = self.since.as_mut() {
            since.poll(now);
        }
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn address(&self) -> std::net::Ipv4Addr {
        self.config.address
    }

    pub fn state(&self) -> Reachability {
        self.state
    }

    /// Returns true if enabled and last seen reachable.
    pub fn counts_as_reachable(&self) -> bool {
        self.enabled && self.state.is_reachable()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Instant of the last state change.
    pub fn last_transition(&self) -> Option<Instant> {
        self.last_transition
    }

    pub fn since(&self) -> Option<&SinceTracker> {
        self.since.as_ref()
    }

    /// Log this target's configuration.
    pub fn dump_config(&self) {
        info!(
            "  Target '{}': address={} interval={:?} timeout={:?} able={} since={}",
            self.name(),
            self.address(),
            self.config.interval,
            self.config.timeout,
            self.able.is_some(),
            self.since.is_some()
        );
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("last_transition", &self.last_transition)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::Recorder;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn target() -> Target {
        Target::new(TargetConfig::new("nas", Ipv4Addr::new(192, 168, 1, 10)))
    }

    #[test]
    fn test_starts_unknown_and_enabled() {
        let t = target();
        assert_eq!(t.state(), Reachability::Unknown);
        assert!(t.is_enabled());
        assert!(!t.counts_as_reachable());
        assert_eq!(t.last_transition(), None);
    }

    #[test]
    fn test_first_probe_leaves_unknown() {
        let now = Instant::now();
        let mut t = target();
        let transition = t.record(ProbeOutcome::TimedOut, now).unwrap();
        assert_eq!(transition.from, Reachability::Unknown);
        assert_eq!(transition.to, Reachability::Unreachable);
        assert_eq!(t.last_transition(), Some(now));
    }

    #[test]
    fn test_repeated_unreachable_fires_once() {
        let t0 = Instant::now();
        let mut t = target();
        let mut transitions = 0;
        for n in 0..3 {
            let outcome = if n == 1 {
                ProbeOutcome::Failed
            } else {
                ProbeOutcome::TimedOut
            };
            if t.record(outcome, t0 + Duration::from_secs(n)).is_some() {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 1);
        assert_eq!(t.last_transition(), Some(t0));
    }

    #[test]
    fn test_flip_updates_timestamp() {
        let t0 = Instant::now();
        let mut t = target();
        t.record(ProbeOutcome::Reachable, t0);
        t.record(ProbeOutcome::Reachable, t0 + Duration::from_secs(16));
        assert_eq!(t.last_transition(), Some(t0));

        let flip = t
            .record(ProbeOutcome::Failed, t0 + Duration::from_secs(32))
            .unwrap();
        assert_eq!(flip.from, Reachability::Reachable);
        assert_eq!(t.last_transition(), Some(t0 + Duration::from_secs(32)));
    }

    #[test]
    fn test_able_output_publishes_changes_only() {
        let t0 = Instant::now();
        let able: Recorder<bool> = Recorder::new();
        let mut t = target();
        t.attach_able(Box::new(able.clone()));

        t.record(ProbeOutcome::TimedOut, t0);
        t.record(ProbeOutcome::Reachable, t0 + Duration::from_secs(1));
        t.record(ProbeOutcome::Reachable, t0 + Duration::from_secs(2));
        t.record(ProbeOutcome::Failed, t0 + Duration::from_secs(3));

        // Initial false already covers the Unknown -> Unreachable edge.
        assert_eq!(able.values(), vec![false, true, false]);
    }

    #[test]
    fn test_since_resets_on_transition() {
        let t0 = Instant::now();
        let mut t = target();
        t.attach_since(SinceTracker::new("nas since", Duration::from_secs(10)));

        t.record(ProbeOutcome::Reachable, t0);
        assert_eq!(t.since().unwrap().elapsed(), Some(0));

        t.poll_since(t0 + Duration::from_secs(12));
        assert_eq!(t.since().unwrap().elapsed(), Some(12));

        t.record(ProbeOutcome::Reachable, t0 + Duration::from_secs(16));
        assert_eq!(t.since().unwrap().when(), Some(t0));

        t.record(ProbeOutcome::Failed, t0 + Duration::from_secs(32));
        assert_eq!(t.since().unwrap().elapsed(), Some(0));
    }

    #[test]
    fn test_disabled_target_does_not_count() {
        let mut t = target();
        t.record(ProbeOutcome::Reachable, Instant::now());
        assert!(t.counts_as_reachable());

        assert!(t.set_enabled(false));
        assert!(!t.set_enabled(false));
        assert!(!t.counts_as_reachable());
        assert_eq!(t.state(), Reachability::Reachable);

        t.set_enabled(true);
        assert!(t.counts_as_reachable());
    }
}

#[cfg(feature = "tap-tests")]
mod tap_tests {
    use super::*;
    use reachability_rs_esp32_macros::tap_test;
    use std::net::Ipv4Addr;

    #[tap_test]
    fn repeated_failures_fire_one_transition() {
        let now = Instant::now();
        let mut target = Target::new(TargetConfig::new("gw", Ipv4Addr::new(10, 0, 0, 1)));
        let fired = (0..3)
            .filter_map(|_| target.record(ProbeOutcome::TimedOut, now))
            .count();
        assert_eq!(fired, 1);
    }
}
