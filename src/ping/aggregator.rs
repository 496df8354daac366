//! None/some/all roll-up over a set of targets.

use super::{ProbeOutcome, Target, Transition};
use crate::error::ConfigError;
use crate::since::SinceTracker;
use crate::sink::{BinaryOutput, BinarySink, NumericOutput, NumericSink};
use log::{debug, error, info};
use std::time::Instant;

/// Handle to a target registered with an [`AvailabilityAggregator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(usize);

impl TargetId {
    /// Registration index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Snapshot of the roll-up signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    /// Enabled targets currently reachable.
    pub count: usize,
    /// Enabled targets.
    pub total: usize,
    /// `count == 0`
    pub none: bool,
    /// `count > 0`
    pub some: bool,
    /// `count == total`; true for an empty set.
    pub all: bool,
}

impl Availability {
    /// Derive the booleans from a count.
    pub fn from_counts(count: usize, total: usize) -> Self {
        Self {
            count,
            total,
            none: count == 0,
            some: count > 0,
            all: count == total,
        }
    }
}

impl Default for Availability {
    fn default() -> Self {
        Self::from_counts(0, 0)
    }
}

/// Tracks a set of targets and publishes their roll-up.
///
/// Targets are registered during setup; [`seal`](Self::seal) closes
/// registration before the runtime starts. Unknown and disabled targets
/// never count as reachable, and disabled targets are left out of the total.
/// Every output is pushed only when its value changes.
pub struct AvailabilityAggregator {
    name: String,
    targets: Vec<Target>,
    sealed: bool,
    current: Availability,
    latest_transition: Option<Instant>,
    none: Option<BinaryOutput>,
    some: Option<BinaryOutput>,
    all: Option<BinaryOutput>,
    count: Option<NumericOutput>,
    since: Option<SinceTracker>,
}

impl AvailabilityAggregator {
    /// Create an aggregator with no targets and no outputs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: Vec::new(),
            sealed: false,
            current: Availability::default(),
            latest_transition: None,
            none: None,
            some: None,
            all: None,
            count: None,
            since: None,
        }
    }

    /// Add a target. Only allowed before [`seal`](Self::seal).
    pub fn register(&mut self, target: Target) -> Result<TargetId, ConfigError> {
        if self.sealed {
            return Err(ConfigError::RegistrationClosed(target.name().to_string()));
        }
        if self.find(target.name()).is_some() {
            return Err(ConfigError::DuplicateName(target.name().to_string()));
        }
        let id = TargetId(self.targets.len());
        self.targets.push(target);
        self.refresh();
        Ok(id)
    }

    /// Close registration.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Publish "no enabled target reachable" to `sink`.
    pub fn attach_none(&mut self, sink: Box<dyn BinarySink>) {
        let mut output = BinaryOutput::boxed(sink);
        output.publish(self.current.none);
        self.none = Some(output);
    }

    /// Publish "at least one enabled target reachable" to `sink`.
    pub fn attach_some(&mut self, sink: Box<dyn BinarySink>) {
        let mut output = BinaryOutput::boxed(sink);
        output.publish(self.current.some);
        self.some = Some(output);
    }

    /// Publish "every enabled target reachable" to `sink`.
    pub fn attach_all(&mut self, sink: Box<dyn BinarySink>) {
        let mut output = BinaryOutput::boxed(sink);
        output.publish(self.current.all);
        self.all = Some(output);
    }

    /// Publish the reachable count to `sink`.
    pub fn attach_count(&mut self, sink: Box<dyn NumericSink>) {
        let mut output = NumericOutput::boxed(sink);
        output.publish(self.current.count as f32);
        self.count = Some(output);
    }

    /// Track time since the most recent transition of any enabled target.
    pub fn attach_since(&mut self, since: SinceTracker) {
        let since = match self.latest_transition {
            Some(when) => since.with_when(when),
            None => since,
        };
        self.since = Some(since);
    }

    /// Apply a probe outcome to one target and recompute if it changed.
    ///
    /// Outcomes for disabled targets are dropped; a probe may still be in
    /// flight when its target is switched off.
    pub fn record(
        &mut self,
        id: TargetId,
        outcome: ProbeOutcome,
        now: Instant,
    ) -> Option<Transition> {
        let Some(target) = self.targets.get_mut(id.0) else {
            error!("[{}] no target with id {}", self.name, id.0);
            return None;
        };
        if !target.is_enabled() {
            debug!("[{}] dropping result for disabled {}", self.name, target.name());
            return None;
        }
        let transition = target.record(outcome, now)?;
        self.on_target_changed(id, now);
        Some(transition)
    }

    /// Enable or disable one target and re-aggregate.
    ///
    /// A re-enabled target counts with its last recorded state until its
    /// next probe result arrives. Returns true if the flag changed.
    pub fn set_enabled(&mut self, id: TargetId, enabled: bool, now: Instant) -> bool {
        let changed = match self.targets.get_mut(id.0) {
            Some(target) => target.set_enabled(enabled),
            None => false,
        };
        if changed {
            self.on_target_changed(id, now);
        }
        changed
    }

    /// A member target changed state; recompute and publish.
    pub fn on_target_changed(&mut self, id: TargetId, now: Instant) -> Availability {
        if let Some(target) = self.targets.get(id.0) {
            debug!("[{}] {} changed", self.name, target.name());
        }
        self.recompute(now)
    }

    /// Recompute every derived signal from the targets' current state.
    pub fn recompute(&mut self, now: Instant) -> Availability {
        self.refresh();

        let latest = self
            .targets
            .iter()
            .filter(|t| t.is_enabled())
            .filter_map(Target::last_transition)
            .max();
        if latest != self.latest_transition {
            self.latest_transition = latest;
            if let Some(since) = self.since.as_mut() {
                since.set_when(latest, now);
            }
        }
        self.current
    }

    fn refresh(&mut self) {
        let enabled = self.targets.iter().filter(|t| t.is_enabled());
        let (count, total) = enabled.fold((0, 0), |(count, total), t| {
            (count + usize::from(t.counts_as_reachable()), total + 1)
        });
        let next = Availability::from_counts(count, total);
        if next != self.current {
            info!(
                "[{}] {}/{} reachable (none={} some={} all={})",
                self.name, next.count, next.total, next.none, next.some, next.all
            );
        }
        self.current = next;
        self.publish();
    }

    fn publish(&mut self) {
        let current = self.current;
        if let Some(output) = self.none.as_mut() {
            output.publish(current.none);
        }
        if let Some(output) = self.some.as_mut() {
            output.publish(current.some);
        }
        if let Some(output) = self.all.as_mut() {
            output.publish(current.all);
        }
        if let Some(output) = self.count.as_mut() {
            output.publish(current.count as f32);
        }
    }

    /// Tick every since tracker whose update interval passed.
    pub fn poll_since(&mut self, now: Instant) {
        for target in &mut self.targets {
            target.poll_since(now);
        }
        if let Some(since) = self.since.as_mut() {
            since.poll(now);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current roll-up.
    pub fn availability(&self) -> Availability {
        self.current
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn target(&self, id: TargetId) -> Option<&Target> {
        self.targets.get(id.0)
    }

    /// Look a target up by name.
    pub fn find(&self, name: &str) -> Option<TargetId> {
        self.targets
            .iter()
            .position(|t| t.name() == name)
            .map(TargetId)
    }

    /// Ids of every registered target, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = TargetId> {
        (0..self.targets.len()).map(TargetId)
    }

    /// Instant of the most recent transition among enabled targets.
    pub fn latest_transition(&self) -> Option<Instant> {
        self.latest_transition
    }

    pub fn since(&self) -> Option<&SinceTracker> {
        self.since.as_ref()
    }

    /// Log the component's configuration.
    pub fn dump_config(&self) {
        info!("Ping '{}':", self.name);
        info!(
            "  Outputs: none={} some={} all={} count={} since={}",
            self.none.is_some(),
            self.some.is_some(),
            self.all.is_some(),
            self.count.is_some(),
            self.since.is_some()
        );
        for target in &self.targets {
            target.dump_config();
        }
    }
}

impl std::fmt::Debug for AvailabilityAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityAggregator")
            .field("name", &self.name)
            .field("targets", &self.targets)
            .field("sealed", &self.sealed)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}


#[cfg(feature = "tap-tests")]
mod tap_tests {
    use super::*;
    use crate::ping::TargetConfig;
    use reachability_rs_esp32_macros::tap_test;
    use std::net::Ipv4Addr;

    #[tap_test]
    fn empty_aggregator_is_vacuously_all() {
        let a = AvailabilityAggregator::new("empty").availability();
        assert!(a.none && !a.some && a.all);
    }

    #[tap_test]
    fn one_of_two_reachable_is_some() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let now = Instant::now();
        let mut agg = AvailabilityAggregator::new("lan");
        let a = agg.register(Target::new(TargetConfig::new("a", Ipv4Addr::new(10, 0, 0, 1))))?;
        let b = agg.register(Target::new(TargetConfig::new("b", Ipv4Addr::new(10, 0, 0, 2))))?;
        agg.record(a, ProbeOutcome::Reachable, now);
        agg.record(b, ProbeOutcome::TimedOut, now);
        let availability = agg.availability();
        assert_eq!(availability.count, 1);
        assert!(!availability.none && availability.some && !availability.all);
        Ok(())
    }
}
