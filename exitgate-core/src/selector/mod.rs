pub mod dest_hash;
pub mod exit_address;
pub mod geo;
pub mod load_balanced;
pub mod port_based;
pub mod round_robin;
pub mod rule_engine;

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use crate::config::{PrimaryStrategy, SelectorConfig};
use crate::error::ConnError;
use crate::telemetry::Metrics;

pub use exit_address::{build_exit_addresses, ExitAddress};
pub use geo::{GeoCache, GeoProvider, LatencyTracker, NoopGeoProvider};
pub use round_robin::RoundRobin;
pub use rule_engine::{RuleEngine, RuleOutcome};

/// The destination a connection is being dialed towards, as seen by the
/// selector (spec §4.3). `host` is present only when the request named
/// a domain; `ip` is present once resolved (or directly, for IP-literal
/// requests).
pub struct SelectTarget<'a> {
    pub host: Option<&'a str>,
    pub ip: Option<IpAddr>,
    pub port: u16,
}

/// Sealed dispatch over the primary exit-selection strategies (spec §9
/// design note: avoid runtime interface objects in the hot path, decide
/// layering at construction).
enum PrimaryImpl {
    RoundRobin(RoundRobin),
    DestinationHash,
    LoadBalanced(crate::config::LoadBalanceMode),
    PortBased(Vec<crate::config::PortRange>),
}

impl PrimaryImpl {
    fn from_config(cfg: &PrimaryStrategy) -> Self {
        match cfg {
            PrimaryStrategy::RoundRobin => PrimaryImpl::RoundRobin(RoundRobin::new()),
            PrimaryStrategy::DestinationHash => PrimaryImpl::DestinationHash,
            PrimaryStrategy::LoadBalanced { mode } => PrimaryImpl::LoadBalanced(*mode),
            PrimaryStrategy::PortBased { ranges } => PrimaryImpl::PortBased(ranges.clone()),
        }
    }

    fn pick<'a>(&self, pool: &[&'a ExitAddress], target: &SelectTarget<'_>) -> Option<&'a ExitAddress> {
        if pool.is_empty() {
            return None;
        }
        match self {
            PrimaryImpl::RoundRobin(rr) => Some(pool[rr.next(pool.len())]),
            PrimaryImpl::DestinationHash => {
                let host = target.host.unwrap_or_default();
                let idx = dest_hash::index_for(host, target.port, pool.len());
                Some(pool[idx])
            }
            PrimaryImpl::LoadBalanced(mode) => load_balanced::pick(pool, *mode),
            PrimaryImpl::PortBased(ranges) => {
                let want = port_based::address_for(ranges, target.port)?;
                pool.iter().copied().find(|e| e.address == want)
            }
        }
    }
}

/// Composes the primary strategy with the optional Rule-Matched and Geo
/// decorators, and the always-on Health-Aware pool gate (spec §4.3).
/// Layering, innermost to outermost: Primary -> Health-Aware (pool
/// filter) -> Geo (optional) -> Rule-Matched (optional, outermost). A
/// rule's forced address is still checked against the health-filtered
/// pool so a `Block`/`UseAddress` can never bypass health (spec §8 "every
/// outbound socket is either marked for some healthy address or not
/// dialed at all").
pub struct Selector {
    exits: Vec<ExitAddress>,
    healthy_rx: watch::Receiver<std::sync::Arc<Vec<IpAddr>>>,
    primary: PrimaryImpl,
    rule_engine: Option<RuleEngine>,
    geo: Option<(GeoCache<Box<dyn GeoProvider>>, LatencyTracker)>,
    last_pool: Mutex<std::sync::Arc<Vec<IpAddr>>>,
    metrics: Option<Arc<Metrics>>,
}

impl Selector {
    pub fn new(
        exits: Vec<ExitAddress>,
        cfg: &SelectorConfig,
        rules: &[crate::config::RuleConfig],
        healthy_rx: watch::Receiver<std::sync::Arc<Vec<IpAddr>>>,
        metrics: Option<Arc<Metrics>>,
    ) -> Result<Self, ConnError> {
        let rule_engine = if cfg.rules_enabled {
            Some(RuleEngine::compile(rules)?)
        } else {
            None
        };
        let geo = if cfg.geo.enabled {
            let ttl = Duration::from_secs(cfg.geo.cache_ttl_secs);
            Some((
                GeoCache::new(Box::new(NoopGeoProvider) as Box<dyn GeoProvider>, ttl),
                LatencyTracker::new(),
            ))
        } else {
            None
        };
        let last_pool = Mutex::new(healthy_rx.borrow().clone());
        Ok(Self {
            exits,
            healthy_rx,
            primary: PrimaryImpl::from_config(&cfg.primary),
            rule_engine,
            geo,
            last_pool,
            metrics,
        })
    }

    /// The full configured exit-address list, independent of current
    /// health. Used by the SNAT controller at setup, which must install
    /// routing for every configured address regardless of reachability.
    pub fn exits(&self) -> &[ExitAddress] {
        &self.exits
    }

    pub fn record_latency(&self, addr: IpAddr, latency_ms: u64) {
        if let Some((_, tracker)) = &self.geo {
            tracker.record(addr, latency_ms);
        }
    }

    fn healthy_pool(&self) -> Vec<&ExitAddress> {
        let current = self.healthy_rx.borrow().clone();
        let mut last = self.last_pool.lock().unwrap_or_else(|e| e.into_inner());
        if *last != current {
            *last = current.clone();
        }
        let allowed: HashSet<IpAddr> = current.iter().copied().collect();
        self.exits.iter().filter(|e| allowed.contains(&e.address)).collect()
    }

    fn find_in_pool<'a>(pool: &[&'a ExitAddress], addr: IpAddr) -> Option<&'a ExitAddress> {
        pool.iter().copied().find(|e| e.address == addr)
    }

    /// Select an exit address for `target`. Returns `ConnError::Blocked`
    /// if a rule blocks the destination outright, `ConnError::NoneAvailable`
    /// if the health-filtered pool is empty or a rule's forced address is
    /// currently unhealthy.
    pub fn select(&self, target: &SelectTarget<'_>) -> Result<&ExitAddress, ConnError> {
        let pool = self.healthy_pool();

        if let Some(engine) = &self.rule_engine {
            let outcome = engine.evaluate(target.host, target.ip);
            if outcome.is_some() {
                if let Some(metrics) = &self.metrics {
                    metrics.rules_matched_total.add(1, &[]);
                }
            }
            match outcome {
                Some(RuleOutcome::Block) => return Err(ConnError::Blocked),
                Some(RuleOutcome::UseAddress(addr)) => {
                    return Self::find_in_pool(&pool, addr).ok_or(ConnError::NoneAvailable);
                }
                None => {}
            }
        }

        if pool.is_empty() {
            return Err(ConnError::NoneAvailable);
        }

        if let Some((cache, latencies)) = &self.geo {
            let dest_coords = target.host.and_then(|h| cache.locate(h));
            if let Some(picked) = geo::pick(&pool, dest_coords, latencies) {
                return Ok(picked);
            }
        }

        self.primary.pick(&pool, target).ok_or(ConnError::NoneAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExitAddressConfig, MatchKind, RuleAction, RuleConfig, SelectorConfig};
    use std::net::Ipv4Addr;

    fn exit(n: u8) -> ExitAddress {
        ExitAddress::from_config(
            (n - 1) as usize,
            &ExitAddressConfig {
                address: Ipv4Addr::new(10, 0, 0, n).into(),
                label: None,
                latitude: None,
                longitude: None,
            },
        )
    }

    #[test]
    fn select_never_returns_an_address_the_healthy_pool_has_dropped() {
        let e1: IpAddr = Ipv4Addr::new(10, 0, 0, 1).into();
        let e2: IpAddr = Ipv4Addr::new(10, 0, 0, 2).into();
        let exits = vec![exit(1), exit(2)];
        let (healthy_tx, healthy_rx) = watch::channel(Arc::new(vec![e1, e2]));
        let cfg = SelectorConfig::default();
        let selector = Selector::new(exits, &cfg, &[], healthy_rx, None).unwrap();

        healthy_tx.send_replace(Arc::new(vec![e2]));

        let target = SelectTarget { host: None, ip: None, port: 443 };
        for _ in 0..10 {
            let picked = selector.select(&target).unwrap();
            assert_eq!(picked.address, e2);
        }
    }

    #[test]
    fn rule_forced_address_is_rejected_once_its_unhealthy() {
        let e1: IpAddr = Ipv4Addr::new(10, 0, 0, 1).into();
        let e2: IpAddr = Ipv4Addr::new(10, 0, 0, 2).into();
        let exits = vec![exit(1), exit(2)];
        let (healthy_tx, healthy_rx) = watch::channel(Arc::new(vec![e1, e2]));
        let mut cfg = SelectorConfig::default();
        cfg.rules_enabled = true;
        let rules = vec![RuleConfig {
            id: "force-e1".into(),
            enabled: true,
            priority: 10,
            match_kind: MatchKind::Ip { address: e1 },
            action: RuleAction::UseAddress { address: e1 },
        }];
        let selector = Selector::new(exits, &cfg, &rules, healthy_rx, None).unwrap();

        healthy_tx.send_replace(Arc::new(vec![e2]));

        let target = SelectTarget { host: None, ip: Some(e1), port: 443 };
        assert!(matches!(selector.select(&target), Err(ConnError::NoneAvailable)));
    }
}
