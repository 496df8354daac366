//! Reachability probes.

use super::ProbeOutcome;
use log::debug;
use std::future::Future;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;
use tokio::net::TcpStream;

use super::DEFAULT_PROBE_PORT;

/// Sends one reachability check.
///
/// The returned future must be cancel-safe: on shutdown it is dropped
/// mid-flight. The monitor bounds every probe by `timeout` on its own, so
/// an implementation that ignores the argument still cannot stall others.
pub trait Prober: Send + Sync + 'static {
    /// Probe `address`, giving up after `timeout`.
    fn probe(
        &self,
        address: Ipv4Addr,
        timeout: Duration,
    ) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Synchronous closures answer immediately.
impl<F> Prober for F
where
    F: Fn(Ipv4Addr) -> ProbeOutcome + Send + Sync + 'static,
{
    fn probe(
        &self,
        address: Ipv4Addr,
        _timeout: Duration,
    ) -> impl Future<Output = ProbeOutcome> + Send {
        std::future::ready(self(address))
    }
}

/// Probes by opening a TCP connection.
///
/// Raw ICMP needs privileges the monitor should not require. Any answer
/// from the host counts: an accepted connection or an explicit refusal
/// both prove it is up. Other errors, and the deadline, do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpProber {
    port: u16,
}

impl TcpProber {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_PORT)
    }
}

impl Prober for TcpProber {
    fn probe(
        &self,
        address: Ipv4Addr,
        timeout: Duration,
    ) -> impl Future<Output = ProbeOutcome> + Send {
        let peer = SocketAddrV4::new(address, self.port);
        async move {
            match tokio::time::timeout(timeout, TcpStream::connect(peer)).await {
                Ok(Ok(_stream)) => ProbeOutcome::Reachable,
                Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                    debug!("{} refused, host is up", peer);
                    ProbeOutcome::Reachable
                }
                Ok(Err(e)) => {
                    debug!("{} connect failed: {}", peer, e);
                    ProbeOutcome::Failed
                }
                Err(_) => ProbeOutcome::TimedOut,
            }
        }
    }
}
