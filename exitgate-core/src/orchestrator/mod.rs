pub mod bufpool;
pub mod connection;
pub mod relay;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::codec::CipherSuite;
use crate::config::CoreConfig;
use crate::error::{ProxyError, Result};
use crate::health::HealthChecker;
use crate::security::AdmissionControl;
use crate::selector::{build_exit_addresses, Selector};
use crate::shutdown::{with_grace_deadline, ShutdownSignal};
use crate::snat::SnatController;
use crate::stats::StatsRegistry;
use crate::telemetry::Metrics;
use crate::tls::setup_tls_with_hot_reload;

use bufpool::BufPool;
use connection::{handle_connection, ConnectionServices};

/// Builds the long-lived services and runs the accept loop until
/// `shutdown` fires (spec §4.6). Returns once the accept loop has exited
/// and in-flight connections have drained or been force-closed at the
/// grace deadline (spec §8 law 10).
pub async fn run(cfg: CoreConfig, shutdown: ShutdownSignal, metrics: Option<Arc<Metrics>>) -> Result<()> {
    let exits = build_exit_addresses(&cfg.exits);
    if exits.is_empty() {
        return Err(ProxyError::NoExitAddresses);
    }
    let exit_ips: Vec<_> = exits.iter().map(|e| e.address).collect();

    let (health_checker, healthy_rx) = HealthChecker::new(exit_ips, cfg.health.clone(), metrics.clone());
    let health_task = {
        let signal = shutdown.clone();
        tokio::spawn(health_checker.run(signal))
    };

    let selector = Arc::new(
        Selector::new(exits, &cfg.selector, &cfg.rules, healthy_rx, metrics.clone())
            .map_err(|e| ProxyError::Config(format!("invalid rule configuration: {e}")))?,
    );

    let mut snat = SnatController::new(cfg.snat.clone());
    if let Err(e) = snat.setup(selector.exits()).await {
        return Err(ProxyError::KernelSetup(e.to_string()));
    }

    let auth_secret = fs::read(&cfg.auth_secret_path)
        .map_err(|e| ProxyError::Config(format!("failed to read auth secret: {e}")))?;

    let admission = AdmissionControl::new(&cfg.security);
    let stats = Arc::new(StatsRegistry::new());
    let tls_reloader = Arc::new(setup_tls_with_hot_reload(&cfg.tls).await?);

    let services = Arc::new(ConnectionServices {
        selector,
        admission,
        stats: stats.clone(),
        metrics,
        bufpool: Arc::new(BufPool::new()),
        timeout: cfg.timeout.clone(),
        auth_secret: Arc::new(auth_secret),
        cipher_suite: CipherSuite::select(),
        tls_reloader,
    });

    let trend_task = {
        let signal = shutdown.clone();
        tokio::spawn(run_trend_sampler(stats, signal))
    };

    let listener = TcpListener::bind(cfg.listen).await?;
    info!(addr = %cfg.listen, "accepting connections");

    let mut in_flight = JoinSet::new();
    accept_loop(listener, services, &mut in_flight, shutdown).await;
    trend_task.abort();

    info!(pending = in_flight.len(), "accept loop stopped, draining in-flight connections");
    let grace = Duration::from_secs(cfg.timeout.shutdown_grace_secs);
    let drained = with_grace_deadline(grace, drain(&mut in_flight)).await.is_some();
    if !drained {
        warn!("grace deadline elapsed, force-closing remaining connections");
        in_flight.shutdown().await;
    }

    health_task.abort();
    snat.teardown().await;
    Ok(())
}

async fn drain(in_flight: &mut JoinSet<()>) {
    while in_flight.join_next().await.is_some() {}
}

/// Rolls every exit's `TrafficTrend` bucket over on a 5-minute cadence
/// (spec §4.7 "a background sampler records one `TrafficTrend` point
/// every 5 minutes"), independent of whether traffic arrived to trigger
/// the rollover itself.
async fn run_trend_sampler(stats: Arc<StatsRegistry>, mut shutdown: ShutdownSignal) {
    let interval = Duration::from_secs(300);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(interval) => {
                stats.tick_trends(std::time::Instant::now());
            }
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    services: Arc<ConnectionServices>,
    in_flight: &mut JoinSet<()>,
    mut shutdown: ShutdownSignal,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("accept loop received shutdown signal");
                return;
            }
            accepted = listener.accept() => {
                let (stream, peer_addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        continue;
                    }
                };

                let decision = services.admission.admit(peer_addr.ip());
                if !decision.is_admitted() {
                    if let Some(metrics) = &services.metrics {
                        metrics.connections_rejected_total.add(1, &[]);
                    }
                    tracing::debug!(%peer_addr, ?decision, "connection rejected by admission control");
                    continue;
                }

                in_flight.spawn(handle_connection(services.clone(), stream, peer_addr));
            }
        }
    }
}
