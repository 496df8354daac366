//! Elapsed time since the last transition of a condition.

use crate::sink::{NumericOutput, NumericSink, TextSink};
use log::debug;
use std::time::{Duration, Instant};

use super::format_duration;

/// Default period between elapsed-time updates.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Remembers when a condition last changed and reports how long ago that was.
///
/// The reported value is whole seconds, truncated, never negative. It is
/// zero at a transition and grows on every [`on_tick`](Self::on_tick) until
/// the next one. Before any transition it is unknown (`None`, published as
/// `NaN` and `NA`).
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use reachability_rs_esp32::since::SinceTracker;
///
/// let t0 = Instant::now();
/// let mut since = SinceTracker::new("uplink since", Duration::from_secs(10));
/// since.bind(false);
///
/// assert!(since.observe(true, t0));
/// assert_eq!(since.elapsed(), Some(0));
/// assert_eq!(since.on_tick(t0 + Duration::from_millis(2_500)), Some(2));
/// ```
pub struct SinceTracker {
    name: String,
    update_interval: Duration,
    when: Option<Instant>,
    elapsed: Option<u64>,
    /// Last observed value of the bound condition.
    source: Option<bool>,
    next_poll: Option<Instant>,
    sensor: Option<NumericOutput>,
    text: Option<TextOutput>,
}

struct TextOutput {
    sink: Box<dyn TextSink>,
    last: Option<String>,
}

impl SinceTracker {
    /// Create a tracker that updates every `update_interval` when polled.
    pub fn new(name: impl Into<String>, update_interval: Duration) -> Self {
        Self {
            name: name.into(),
            update_interval,
            when: None,
            elapsed: None,
            source: None,
            next_poll: None,
            sensor: None,
            text: None,
        }
    }

    /// Start from a known transition instant instead of unknown.
    pub fn with_when(mut self, when: Instant) -> Self {
        self.when = Some(when);
        self
    }

    /// Publish elapsed seconds to a numeric sensor.
    pub fn attach_sensor(&mut self, sink: Box<dyn NumericSink>) {
        self.sensor = Some(NumericOutput::boxed(sink));
    }

    /// Publish the formatted elapsed time to a text sink.
    pub fn attach_text(&mut self, sink: Box<dyn TextSink>) {
        self.text = Some(TextOutput { sink, last: None });
    }

    /// Attach to a boolean condition whose current value is `value`.
    ///
    /// Binding is not a transition; only later changes observed through
    /// [`observe`](Self::observe) are.
    pub fn bind(&mut self, value: bool) {
        self.source = Some(value);
    }

    /// Feed the bound condition's latest value.
    ///
    /// Returns true if the value flipped, in which case the tracker was reset
    /// to zero at `now`. An unbound tracker binds to the first value it sees.
    pub fn observe(&mut self, value: bool, now: Instant) -> bool {
        match self.source.replace(value) {
            Some(previous) if previous != value => {
                self.on_transition(now);
                true
            }
            _ => false,
        }
    }

    /// The bound condition flipped at `now`.
    pub fn on_transition(&mut self, now: Instant) {
        self.set_when(Some(now), now);
    }

    /// Replace the transition instant (or forget it) and republish.
    pub fn set_when(&mut self, when: Option<Instant>, now: Instant) {
        if self.when != when {
            debug!("{} since {:?}", self.name, when);
        }
        self.when = when;
        self.elapsed = None;
        self.on_tick(now);
    }

    /// Recompute and publish the elapsed time.
    pub fn on_tick(&mut self, now: Instant) -> Option<u64> {
        let elapsed = self
            .when
            .map(|when| now.saturating_duration_since(when).as_secs());
        // A late `now` must not move the reading backwards.
        self.elapsed = match (self.elapsed, elapsed) {
            (Some(previous), Some(current)) => Some(previous.max(current)),
            (_, current) => current,
        };
        self.publish();
        self.elapsed
    }

    /// Tick if the update interval has passed since the last poll tick.
    ///
    /// Returns true if a tick happened.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.next_poll.is_some_and(|due| now < due) {
            return false;
        }
        self.next_poll = Some(now + self.update_interval);
        self.on_tick(now);
        true
    }

    fn publish(&mut self) {
        if let Some(sensor) = self.sensor.as_mut() {
            sensor.publish(self.elapsed.map_or(f32::NAN, |secs| secs as f32));
        }
        if let Some(text) = self.text.as_mut() {
            let formatted = format_duration(self.elapsed);
            if text.last.as_deref() != Some(formatted.as_str()) {
                text.sink.publish(&formatted);
                text.last = Some(formatted);
            }
        }
    }

    /// Name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whole seconds since the last transition, as of the last tick.
    pub fn elapsed(&self) -> Option<u64> {
        self.elapsed
    }

    /// Instant of the last transition.
    pub fn when(&self) -> Option<Instant> {
        self.when
    }

    /// Period between poll ticks.
    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Returns true if a numeric sensor is attached.
    pub fn has_sensor(&self) -> bool {
        self.sensor.is_some()
    }

    /// Returns true if a text sink is attached.
    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }
}

impl std::fmt::Debug for SinceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinceTracker")
            .field("name", &self.name)
            .field("update_interval", &self.update_interval)
            .field("when", &self.when)
            .field("elapsed", &self.elapsed)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::Recorder;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_unknown_until_first_transition() {
        let t0 = Instant::now();
        let sensor: Recorder<f32> = Recorder::new();
        let text: Recorder<String> = Recorder::new();
        let mut since = SinceTracker::new("since", DEFAULT_UPDATE_INTERVAL);
        since.attach_sensor(Box::new(sensor.clone()));
        since.attach_text(Box::new(text.clone()));

        assert_eq!(since.on_tick(t0 + secs(30)), None);
        assert!(sensor.last().unwrap().is_nan());
        assert_eq!(text.last().as_deref(), Some("NA"));
    }

    #[test]
    fn test_zero_at_transition_then_increasing() {
        let t0 = Instant::now();
        let mut since = SinceTracker::new("since", DEFAULT_UPDATE_INTERVAL);
        since.bind(false);

        assert!(since.observe(true, t0));
        assert_eq!(since.elapsed(), Some(0));

        let mut previous = 0;
        for n in 1..=5 {
            let elapsed = since.on_tick(t0 + secs(n)).unwrap();
            assert!(elapsed > previous);
            previous = elapsed;
        }
        assert_eq!(previous, 5);
    }

    #[test]
    fn test_transition_resets_to_zero() {
        let t0 = Instant::now();
        let mut since = SinceTracker::new("since", DEFAULT_UPDATE_INTERVAL);
        since.bind(true);
        since.observe(false, t0);
        since.on_tick(t0 + secs(40));
        assert_eq!(since.elapsed(), Some(40));

        assert!(since.observe(true, t0 + secs(41)));
        assert_eq!(since.elapsed(), Some(0));
        assert_eq!(since.when(), Some(t0 + secs(41)));
    }

    #[test]
    fn test_repeated_value_is_not_a_transition() {
        let t0 = Instant::now();
        let mut since = SinceTracker::new("since", DEFAULT_UPDATE_INTERVAL);
        since.bind(true);
        assert!(!since.observe(true, t0));
        assert!(!since.observe(true, t0 + secs(1)));
        assert_eq!(since.when(), None);
    }

    #[test]
    fn test_unbound_tracker_binds_on_first_observation() {
        let t0 = Instant::now();
        let mut since = SinceTracker::new("since", DEFAULT_UPDATE_INTERVAL);
        assert!(!since.observe(false, t0));
        assert!(since.observe(true, t0 + secs(1)));
    }

    #[test]
    fn test_truncates_to_whole_seconds() {
        let t0 = Instant::now();
        let mut since = SinceTracker::new("since", DEFAULT_UPDATE_INTERVAL).with_when(t0);
        assert_eq!(since.on_tick(t0 + Duration::from_millis(1_999)), Some(1));
    }

    #[test]
    fn test_never_negative_or_backwards() {
        let t0 = Instant::now() + secs(100);
        let mut since = SinceTracker::new("since", DEFAULT_UPDATE_INTERVAL).with_when(t0);
        // Clock reading before the transition instant.
        assert_eq!(since.on_tick(t0 - secs(5)), Some(0));

        since.on_tick(t0 + secs(20));
        assert_eq!(since.on_tick(t0 + secs(10)), Some(20));
    }

    #[test]
    fn test_missed_tick_self_corrects() {
        let t0 = Instant::now();
        let mut since = SinceTracker::new("since", DEFAULT_UPDATE_INTERVAL).with_when(t0);
        since.on_tick(t0 + secs(10));
        // The tick at 20s never happened.
        assert_eq!(since.on_tick(t0 + secs(30)), Some(30));
    }

    #[test]
    fn test_poll_respects_update_interval() {
        let t0 = Instant::now();
        let sensor: Recorder<f32> = Recorder::new();
        let mut since = SinceTracker::new("since", secs(10)).with_when(t0);
        since.attach_sensor(Box::new(sensor.clone()));

        assert!(since.poll(t0));
        assert!(!since.poll(t0 + secs(5)));
        assert!(since.poll(t0 + secs(10)));
        assert!(!since.poll(t0 + secs(19)));
        assert!(since.poll(t0 + secs(25)));

        assert_eq!(sensor.values(), vec![0.0, 10.0, 25.0]);
    }

    #[test]
    fn test_set_when_forgets() {
        let t0 = Instant::now();
        let mut since = SinceTracker::new("since", DEFAULT_UPDATE_INTERVAL).with_when(t0);
        since.on_tick(t0 + secs(3));
        since.set_when(None, t0 + secs(4));
        assert_eq!(since.elapsed(), None);
    }

    #[test]
    fn test_text_published_only_on_change() {
        let t0 = Instant::now();
        let text: Recorder<String> = Recorder::new();
        let mut since = SinceTracker::new("since", DEFAULT_UPDATE_INTERVAL).with_when(t0);
        since.attach_text(Box::new(text.clone()));

        since.on_tick(t0 + Duration::from_millis(100));
        since.on_tick(t0 + Duration::from_millis(900));
        since.on_tick(t0 + secs(61));

        assert_eq!(text.values(), vec!["0 00:00:00", "0 00:01:01"]);
    }
}

#[cfg(feature = "tap-tests")]
mod tap_tests {
    use super::*;
    use reachability_rs_esp32_macros::tap_test;

    #[tap_test]
    fn since_resets_to_zero_on_transition() {
        let t0 = Instant::now();
        let mut since = SinceTracker::new("since", DEFAULT_UPDATE_INTERVAL);
        since.bind(false);
        since.observe(true, t0);
        assert_eq!(since.on_tick(t0 + Duration::from_secs(3)), Some(3));
        since.observe(false, t0 + Duration::from_secs(4));
        assert_eq!(since.elapsed(), Some(0));
    }
}
