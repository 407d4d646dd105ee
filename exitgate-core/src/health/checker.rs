use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::HealthCheckConfig;
use crate::shutdown::ShutdownSignal;
use crate::telemetry::Metrics;

use super::state::{Health, HealthEvent, HealthState, Transition};

/// Periodic reachability prober for the full configured exit-address list
/// (spec §4.4). Probe rounds run in parallel across addresses; each
/// address's own probe attempts are serialized (try each port in order,
/// stop at the first success).
pub struct HealthChecker {
    addresses: Vec<IpAddr>,
    cfg: HealthCheckConfig,
    states: DashMap<IpAddr, HealthState>,
    healthy_tx: watch::Sender<Arc<Vec<IpAddr>>>,
    metrics: Option<Arc<Metrics>>,
}

impl HealthChecker {
    pub fn new(
        addresses: Vec<IpAddr>,
        cfg: HealthCheckConfig,
        metrics: Option<Arc<Metrics>>,
    ) -> (Arc<Self>, watch::Receiver<Arc<Vec<IpAddr>>>) {
        let states = DashMap::new();
        for addr in &addresses {
            states.insert(*addr, HealthState::default());
        }
        let (healthy_tx, healthy_rx) = watch::channel(Arc::new(addresses.clone()));
        (Arc::new(Self { addresses, cfg, states, healthy_tx, metrics }), healthy_rx)
    }

    pub fn health_of(&self, addr: IpAddr) -> Option<Health> {
        self.states.get(&addr).map(|s| s.status)
    }

    /// Run probe rounds until `shutdown` fires. Cooperative: the loop
    /// checks the signal between rounds and while waiting for the next
    /// interval, so it stops promptly rather than finishing an in-flight
    /// round first.
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownSignal) {
        let interval = Duration::from_secs(self.cfg.interval_secs);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("health checker stopping");
                    return;
                }
                _ = self.probe_round() => {}
            }
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("health checker stopping");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    async fn probe_round(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.health_checks_total.add(1, &[]);
        }
        let results =
            futures::future::join_all(self.addresses.iter().map(|addr| self.probe_one(*addr))).await;
        for (addr, succeeded) in self.addresses.iter().zip(results) {
            self.apply_result(*addr, succeeded);
        }
    }

    async fn probe_one(&self, addr: IpAddr) -> bool {
        let probe_timeout = Duration::from_secs(self.cfg.probe_timeout_secs);
        for &port in &self.cfg.probe_ports {
            if tcp_probe(addr, port, probe_timeout).await {
                return true;
            }
        }
        udp_last_resort(addr, probe_timeout).await
    }

    fn apply_result(&self, addr: IpAddr, succeeded: bool) {
        if !succeeded {
            if let Some(metrics) = &self.metrics {
                metrics.health_check_failures_total.add(1, &[]);
            }
        }
        let transition = {
            let mut entry = self.states.entry(addr).or_default();
            entry.observe(succeeded, self.cfg.failure_threshold, Instant::now())
        };
        self.handle_transition(HealthEvent { address: addr, transition }, succeeded);
    }

    fn handle_transition(&self, event: HealthEvent, succeeded: bool) {
        match event.transition {
            Transition::BecameUnhealthy => {
                warn!(addr = %event.address, "exit address marked unhealthy");
                if let Some(metrics) = &self.metrics {
                    metrics.exit_marked_unhealthy_total.add(1, &[]);
                }
                self.publish_healthy_pool();
            }
            Transition::BecameHealthy => {
                info!(addr = %event.address, "exit address recovered");
                if let Some(metrics) = &self.metrics {
                    metrics.exit_marked_healthy_total.add(1, &[]);
                }
                self.publish_healthy_pool();
            }
            Transition::None => {
                debug!(addr = %event.address, succeeded, "health probe result, no state change");
            }
        }
    }

    fn publish_healthy_pool(&self) {
        let healthy: Vec<IpAddr> = self
            .addresses
            .iter()
            .filter(|addr| self.health_of(**addr) != Some(Health::Unhealthy))
            .copied()
            .collect();
        self.healthy_tx.send_replace(Arc::new(healthy));
    }
}

async fn tcp_probe(addr: IpAddr, port: u16, probe_timeout: Duration) -> bool {
    matches!(
        timeout(probe_timeout, TcpStream::connect((addr, port))).await,
        Ok(Ok(_))
    )
}

/// UDP/53 last resort: a DNS query gets no guaranteed response from an
/// arbitrary host, so success here is judged by the send completing
/// without an immediate ICMP-port-unreachable error, not by receiving a
/// reply.
async fn udp_last_resort(addr: IpAddr, probe_timeout: Duration) -> bool {
    let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let Ok(socket) = UdpSocket::bind(bind_addr).await else {
        return false;
    };
    let probe = async {
        socket.connect((addr, 53)).await.ok()?;
        socket.send(&[0u8; 12]).await.ok()
    };
    matches!(timeout(probe_timeout, probe).await, Ok(Some(_)))
}
