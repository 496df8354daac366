//! Runtime: periodic probes feeding a single dispatcher.
//!
//! Every target gets its own tokio task that probes on the target's
//! interval. Each probe is bounded by the target's timeout, so a host that
//! never answers cannot delay the others. Outcomes go through a bounded
//! queue to one dispatcher task, which is the only owner of the
//! [`AvailabilityAggregator`]; all state mutation is serialised there.
//!
//! ```text
//! probe task (a) --\
//! probe task (b) ----> mpsc(32) --> dispatcher --> sinks, watch<Availability>
//! probe task (c) --/                   ^
//!                        MonitorHandle-/ (enable/disable)
//! ```

use super::{Availability, AvailabilityAggregator, ProbeOutcome, Prober, TargetId};
use crate::clock::{Clock, TokioClock};
use crate::error::MonitorError;
use log::{debug, error, info};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Capacity of the probe result and command queues.
pub const QUEUE_CAPACITY: usize = 32;

/// How often the dispatcher polls since trackers. Each tracker still only
/// updates on its own interval.
pub const SINCE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One probe result.
#[derive(Debug, Clone, Copy)]
struct Report {
    id: TargetId,
    outcome: ProbeOutcome,
}

#[derive(Debug)]
enum Command {
    SetEnabled {
        id: TargetId,
        enabled: bool,
        reply: oneshot::Sender<bool>,
    },
}

/// Probes every target of one aggregator until cancelled.
pub struct PingMonitor<P> {
    aggregator: AvailabilityAggregator,
    prober: Arc<P>,
    clock: Arc<dyn Clock>,
    since_poll: Duration,
}

impl<P: Prober> PingMonitor<P> {
    /// Monitor `aggregator`'s targets with `prober`.
    pub fn new(aggregator: AvailabilityAggregator, prober: P) -> Self {
        Self {
            aggregator,
            prober: Arc::new(prober),
            clock: Arc::new(TokioClock),
            since_poll: SINCE_POLL_INTERVAL,
        }
    }

    /// Read `now` from another clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Change how often since trackers are polled.
    pub fn with_since_poll(mut self, period: Duration) -> Self {
        self.since_poll = period;
        self
    }

    /// Seal registration and start the probe and dispatcher tasks.
    ///
    /// Must be called from within a tokio runtime. Cancelling `cancel` (or
    /// calling [`MonitorHandle::shutdown`]) stops everything; in-flight
    /// probes are dropped.
    pub fn spawn(self, cancel: &CancellationToken) -> MonitorHandle {
        let Self {
            mut aggregator,
            prober,
            clock,
            since_poll,
        } = self;

        aggregator.seal();
        aggregator.dump_config();

        let cancel = cancel.child_token();
        let name = aggregator.name().to_string();
        let targets = aggregator
            .ids()
            .filter_map(|id| aggregator.target(id).map(|t| (t.name().to_string(), id)))
            .collect();
        let (command_tx, command_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (availability_tx, availability_rx) = watch::channel(aggregator.availability());

        let dispatcher = Dispatcher {
            aggregator,
            clock,
            since_poll,
            availability: availability_tx,
        };
        let task = tokio::spawn(dispatcher.run(prober, command_rx, cancel.clone()));

        MonitorHandle {
            name,
            targets,
            commands: command_tx,
            availability: availability_rx,
            cancel,
            task,
        }
    }
}

struct Dispatcher {
    aggregator: AvailabilityAggregator,
    clock: Arc<dyn Clock>,
    since_poll: Duration,
    availability: watch::Sender<Availability>,
}

impl Dispatcher {
    async fn run<P: Prober>(
        mut self,
        prober: Arc<P>,
        mut commands: mpsc::Receiver<Command>,
        cancel: CancellationToken,
    ) -> AvailabilityAggregator {
        let name = self.aggregator.name().to_string();
        let probe_cancel = cancel.child_token();
        let (report_tx, mut reports) = mpsc::channel(QUEUE_CAPACITY);

        let mut probes = JoinSet::new();
        let mut switches = Vec::new();
        let ids: Vec<TargetId> = self.aggregator.ids().collect();
        for id in ids {
            let Some(target) = self.aggregator.target(id) else {
                continue;
            };
            let (switch, enabled) = watch::channel(target.is_enabled());
            switches.push(switch);
            probes.spawn(probe_loop(
                ProbeTask {
                    id,
                    address: target.address(),
                    interval: target.config().interval,
                    timeout: target.config().timeout,
                },
                Arc::clone(&prober),
                enabled,
                report_tx.clone(),
                probe_cancel.clone(),
            ));
        }
        // Only probe tasks hold senders now.
        drop(report_tx);

        info!("[{}] monitoring {} targets", name, switches.len());
        let now = self.clock.now();
        self.aggregator.recompute(now);
        self.aggregator.poll_since(now);
        self.publish();

        let mut since_ticker = tokio::time::interval(self.since_poll);
        since_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("[{}] dispatcher shutting down", name);
                    break;
                }
                Some(report) = reports.recv() => {
                    let now = self.clock.now();
                    if self.aggregator.record(report.id, report.outcome, now).is_some() {
                        self.publish();
                    }
                }
                Some(command) = commands.recv() => {
                    match command {
                        Command::SetEnabled { id, enabled, reply } => {
                            let now = self.clock.now();
                            let changed = self.aggregator.set_enabled(id, enabled, now);
                            if let Some(switch) = switches.get(id.index()) {
                                switch.send_replace(enabled);
                            }
                            self.publish();
                            let _ = reply.send(changed);
                        }
                    }
                }
                _ = since_ticker.tick() => {
                    self.aggregator.poll_since(self.clock.now());
                }
            }
        }

        probe_cancel.cancel();
        // Probe tasks parked on a full queue must see the send fail.
        drop(reports);
        while let Some(result) = probes.join_next().await {
            if let Err(e) = result {
                if e.is_panic() {
                    error!("[{}] probe task panicked: {}", name, e);
                }
            }
        }
        info!("[{}] stopped", name);
        self.aggregator
    }

    fn publish(&self) {
        let next = self.aggregator.availability();
        self.availability.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

#[derive(Debug, Clone, Copy)]
struct ProbeTask {
    id: TargetId,
    address: Ipv4Addr,
    interval: Duration,
    timeout: Duration,
}

async fn probe_loop<P: Prober>(
    task: ProbeTask,
    prober: Arc<P>,
    enabled: watch::Receiver<bool>,
    reports: mpsc::Sender<Report>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(task.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if !is_enabled(&enabled) {
            continue;
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = bounded_probe(prober.as_ref(), task.address, task.timeout) => outcome,
        };
        let sent = tokio::select! {
            _ = cancel.cancelled() => break,
            sent = reports.send(Report { id: task.id, outcome }) => sent,
        };
        if sent.is_err() {
            break;
        }
    }
}

fn is_enabled(enabled: &watch::Receiver<bool>) -> bool {
    *enabled.borrow()
}

/// Run one probe, classifying the deadline as [`ProbeOutcome::TimedOut`].
async fn bounded_probe<P: Prober>(
    prober: &P,
    address: Ipv4Addr,
    timeout: Duration,
) -> ProbeOutcome {
    tokio::time::timeout(timeout, prober.probe(address, timeout))
        .await
        .unwrap_or(ProbeOutcome::TimedOut)
}

/// Control surface of a running [`PingMonitor`].
#[derive(Debug)]
pub struct MonitorHandle {
    name: String,
    targets: Vec<(String, TargetId)>,
    commands: mpsc::Sender<Command>,
    availability: watch::Receiver<Availability>,
    cancel: CancellationToken,
    task: JoinHandle<AvailabilityAggregator>,
}

impl MonitorHandle {
    /// Name of the monitored aggregator.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the monitored targets, in registration order.
    pub fn target_names(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(|(name, _)| name.as_str())
    }

    /// Latest published roll-up.
    pub fn availability(&self) -> Availability {
        *self.availability.borrow()
    }

    /// Receiver notified whenever the roll-up changes.
    pub fn subscribe(&self) -> watch::Receiver<Availability> {
        self.availability.clone()
    }

    /// Enable or disable a target by name.
    ///
    /// Resolves once the dispatcher applied the change; returns whether the
    /// flag actually changed.
    pub async fn set_enabled(&self, target: &str, enabled: bool) -> Result<bool, MonitorError> {
        let id = self
            .targets
            .iter()
            .find(|(name, _)| name == target)
            .map(|(_, id)| *id)
            .ok_or_else(|| MonitorError::UnknownTarget(target.to_string()))?;

        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::SetEnabled { id, enabled, reply })
            .await
            .map_err(|_| MonitorError::Stopped)?;
        response.await.map_err(|_| MonitorError::Stopped)
    }

    /// Stop probing and return the aggregator's final state.
    pub async fn shutdown(self) -> Result<AvailabilityAggregator, MonitorError> {
        self.cancel.cancel();
        self.task.await.map_err(MonitorError::Join)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ping::{Reachability, Target, TargetConfig};
    use std::future::Future;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn aggregator(addresses: &[(&str, Ipv4Addr)]) -> AvailabilityAggregator {
        let mut agg = AvailabilityAggregator::new("lan");
        for (name, address) in addresses {
            agg.register(Target::new(TargetConfig::new(*name, *address)))
                .unwrap();
        }
        agg
    }

    const A: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const B: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

    /// Never answers.
    struct Silent;

    impl Prober for Silent {
        fn probe(
            &self,
            _address: Ipv4Addr,
            _timeout: Duration,
        ) -> impl Future<Output = ProbeOutcome> + Send {
            std::future::pending()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_probe_round_updates_availability() {
        let cancel = CancellationToken::new();
        let prober = |address: Ipv4Addr| {
            if address == A {
                ProbeOutcome::Reachable
            } else {
                ProbeOutcome::Failed
            }
        };
        let handle = PingMonitor::new(aggregator(&[("a", A), ("b", B)]), prober).spawn(&cancel);

        handle
            .subscribe()
            .wait_for(|a| a.count == 1)
            .await
            .unwrap();
        let a = handle.availability();
        assert_eq!((a.none, a.some, a.all), (false, true, false));

        let agg = handle.shutdown().await.unwrap();
        let b = agg.find("b").unwrap();
        assert_eq!(agg.target(b).unwrap().state(), Reachability::Unreachable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_host_times_out() {
        let cancel = CancellationToken::new();
        let handle = PingMonitor::new(aggregator(&[("a", A)]), Silent).spawn(&cancel);

        // Default timeout is 4s.
        tokio::time::sleep(Duration::from_secs(5)).await;

        let agg = handle.shutdown().await.unwrap();
        let target = &agg.targets()[0];
        assert_eq!(target.state(), Reachability::Unreachable);
        assert!(agg.availability().none);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_in_flight_probe() {
        let cancel = CancellationToken::new();
        let mut agg = AvailabilityAggregator::new("lan");
        let config = TargetConfig::new("a", A).with_timeout(Duration::from_secs(3600));
        agg.register(Target::new(config)).unwrap();
        let handle = PingMonitor::new(agg, Silent).spawn(&cancel);
        tokio::task::yield_now().await;

        cancel.cancel();
        let agg = handle.shutdown().await.unwrap();
        assert_eq!(agg.targets()[0].state(), Reachability::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flip_is_seen_on_next_interval() {
        let cancel = CancellationToken::new();
        let up = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&up);
        let prober = move |_: Ipv4Addr| {
            if flag.load(Ordering::SeqCst) {
                ProbeOutcome::Reachable
            } else {
                ProbeOutcome::TimedOut
            }
        };
        let handle = PingMonitor::new(aggregator(&[("a", A)]), prober).spawn(&cancel);
        let mut rx = handle.subscribe();

        rx.wait_for(|a| a.all).await.unwrap();
        up.store(false, Ordering::SeqCst);
        rx.wait_for(|a| a.none).await.unwrap();

        let agg = handle.shutdown().await.unwrap();
        let target = &agg.targets()[0];
        assert_eq!(target.state(), Reachability::Unreachable);
        assert!(target.last_transition().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_and_enable_target() {
        let cancel = CancellationToken::new();
        let prober = |address: Ipv4Addr| {
            if address == A {
                ProbeOutcome::Reachable
            } else {
                ProbeOutcome::Failed
            }
        };
        let handle = PingMonitor::new(aggregator(&[("a", A), ("b", B)]), prober).spawn(&cancel);
        handle
            .subscribe()
            .wait_for(|a| a.count == 1)
            .await
            .unwrap();
        assert!(!handle.availability().all);

        assert!(handle.set_enabled("b", false).await.unwrap());
        let a = handle.availability();
        assert_eq!((a.count, a.total, a.all), (1, 1, true));

        assert!(!handle.set_enabled("b", false).await.unwrap());
        assert!(handle.set_enabled("b", true).await.unwrap());
        assert_eq!(handle.availability().total, 2);

        assert!(matches!(
            handle.set_enabled("nope", true).await,
            Err(MonitorError::UnknownTarget(_))
        ));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_with_more_targets_than_queue_slots() {
        let cancel = CancellationToken::new();
        let mut agg = AvailabilityAggregator::new("wide");
        for i in 0..(QUEUE_CAPACITY * 4) {
            let address = Ipv4Addr::new(10, 1, (i / 256) as u8, (i % 256) as u8);
            agg.register(Target::new(TargetConfig::new(format!("t{}", i), address)))
                .unwrap();
        }
        let handle =
            PingMonitor::new(agg, |_: Ipv4Addr| ProbeOutcome::Reachable).spawn(&cancel);
        cancel.cancel();

        let agg = tokio::time::timeout(Duration::from_secs(600), handle.shutdown())
            .await
            .expect("shutdown must not wait on a full report queue")
            .unwrap();
        assert_eq!(agg.targets().len(), QUEUE_CAPACITY * 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_after_queue_filled() {
        let cancel = CancellationToken::new();
        let mut agg = AvailabilityAggregator::new("wide");
        for i in 0..(QUEUE_CAPACITY * 4) {
            let address = Ipv4Addr::new(10, 2, (i / 256) as u8, (i % 256) as u8);
            agg.register(Target::new(TargetConfig::new(format!("t{}", i), address)))
                .unwrap();
        }
        let handle =
            PingMonitor::new(agg, |_: Ipv4Addr| ProbeOutcome::Reachable).spawn(&cancel);
        // Let every probe task run its first round.
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }

        let agg = tokio::time::timeout(Duration::from_secs(600), handle.shutdown())
            .await
            .expect("shutdown must not wait on a full report queue")
            .unwrap();
        assert!(agg.is_sealed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancel_stops_monitor() {
        let cancel = CancellationToken::new();
        let handle = PingMonitor::new(aggregator(&[]), |_: Ipv4Addr| ProbeOutcome::Reachable)
            .spawn(&cancel);
        assert_eq!(handle.availability(), Availability::from_counts(0, 0));

        cancel.cancel();
        let agg = handle.shutdown().await.unwrap();
        assert!(agg.is_sealed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_after_stop_fail() {
        let cancel = CancellationToken::new();
        let handle = PingMonitor::new(aggregator(&[("a", A)]), Silent).spawn(&cancel);
        cancel.cancel();
        // Let the dispatcher exit and drop its command receiver.
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(matches!(
            handle.set_enabled("a", false).await,
            Err(MonitorError::Stopped)
        ));
    }
}
