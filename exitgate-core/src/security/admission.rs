use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ahash::AHashMap;

use crate::config::SecurityConfig;
use crate::security::rate_limit::RateLimitManager;

/// Decision returned by [`AdmissionControl::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Admitted,
    GlobalCapExceeded,
    PerIpCapExceeded,
    RateLimited,
}

impl AdmissionDecision {
    pub fn is_admitted(self) -> bool {
        matches!(self, AdmissionDecision::Admitted)
    }
}

/// Tracks global and per-IP connection counts plus rate limiting, enforcing
/// the caps in spec §5 on every accepted socket before the handshake runs.
pub struct AdmissionControl {
    max_connections: usize,
    max_per_ip: usize,
    active_total: AtomicUsize,
    active_per_ip: Mutex<AHashMap<IpAddr, usize>>,
    rate_limiter: RateLimitManager,
}

impl AdmissionControl {
    pub fn new(cfg: &SecurityConfig) -> Arc<Self> {
        Arc::new(Self {
            max_connections: cfg.max_connections,
            max_per_ip: cfg.max_connections_per_ip,
            active_total: AtomicUsize::new(0),
            active_per_ip: Mutex::new(AHashMap::new()),
            rate_limiter: RateLimitManager::new(&cfg.rate_limit),
        })
    }

    /// Attempt to admit a new connection from `addr`. On `Admitted`, the
    /// caller must call [`Self::release`] exactly once when the connection
    /// closes.
    pub fn admit(&self, addr: IpAddr) -> AdmissionDecision {
        if self.rate_limiter.is_enabled() && self.rate_limiter.check(addr).is_limited() {
            return AdmissionDecision::RateLimited;
        }

        if self.active_total.load(Ordering::Relaxed) >= self.max_connections {
            return AdmissionDecision::GlobalCapExceeded;
        }

        {
            let mut per_ip = self.active_per_ip.lock().unwrap_or_else(|e| e.into_inner());
            let count = per_ip.entry(addr).or_insert(0);
            if *count >= self.max_per_ip {
                return AdmissionDecision::PerIpCapExceeded;
            }
            *count += 1;
        }

        self.active_total.fetch_add(1, Ordering::Relaxed);
        AdmissionDecision::Admitted
    }

    pub fn release(&self, addr: IpAddr) {
        self.active_total.fetch_sub(1, Ordering::Relaxed);
        let mut per_ip = self.active_per_ip.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = per_ip.get_mut(&addr) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                per_ip.remove(&addr);
            }
        }
    }

    pub fn active_connections(&self) -> usize {
        self.active_total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn cfg(max_connections: usize, max_connections_per_ip: usize) -> SecurityConfig {
        SecurityConfig {
            max_connections,
            max_connections_per_ip,
            rate_limit: crate::config::RateLimitConfig::default(),
        }
    }

    #[test]
    fn rejects_the_nth_plus_one_global_connection() {
        let control = AdmissionControl::new(&cfg(2, 10));
        let a: IpAddr = Ipv4Addr::new(10, 0, 0, 1).into();
        let b: IpAddr = Ipv4Addr::new(10, 0, 0, 2).into();
        let c: IpAddr = Ipv4Addr::new(10, 0, 0, 3).into();
        assert_eq!(control.admit(a), AdmissionDecision::Admitted);
        assert_eq!(control.admit(b), AdmissionDecision::Admitted);
        assert_eq!(control.admit(c), AdmissionDecision::GlobalCapExceeded);
    }

    #[test]
    fn rejects_the_nth_plus_one_connection_from_one_source_ip() {
        let control = AdmissionControl::new(&cfg(100, 2));
        let addr: IpAddr = Ipv4Addr::new(10, 0, 0, 1).into();
        assert_eq!(control.admit(addr), AdmissionDecision::Admitted);
        assert_eq!(control.admit(addr), AdmissionDecision::Admitted);
        assert_eq!(control.admit(addr), AdmissionDecision::PerIpCapExceeded);
    }

    #[test]
    fn release_restores_both_global_and_per_ip_capacity() {
        let control = AdmissionControl::new(&cfg(1, 1));
        let addr: IpAddr = Ipv4Addr::new(10, 0, 0, 1).into();
        assert_eq!(control.admit(addr), AdmissionDecision::Admitted);
        assert_eq!(control.admit(addr), AdmissionDecision::PerIpCapExceeded);
        control.release(addr);
        assert_eq!(control.active_connections(), 0);
        assert_eq!(control.admit(addr), AdmissionDecision::Admitted);
    }
}
