use ahash::AHashMap;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::{RateLimitResult, RateLimiter};
use crate::config::RateLimitConfig;

/// Connection-admission rate limiting: a global limiter shared by every
/// accepted connection, plus a per-IP limiter allocated lazily on first
/// sight of a source address (spec §5 "Resource caps").
pub struct RateLimitManager {
    global: Option<Arc<RateLimiter>>,
    per_ip: Option<(u32, u32)>,
    per_ip_limiters: RwLock<AHashMap<IpAddr, Arc<RateLimiter>>>,
}

impl RateLimitManager {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        let window = Duration::from_secs(1);
        let global = if cfg.enabled {
            Some(Arc::new(RateLimiter::new(
                cfg.global_connections_per_second,
                cfg.burst,
                window,
            )))
        } else {
            None
        };
        let per_ip = if cfg.enabled {
            Some((cfg.per_ip_connections_per_second, cfg.per_ip_connections_per_second * 2))
        } else {
            None
        };
        Self {
            global,
            per_ip,
            per_ip_limiters: RwLock::new(AHashMap::new()),
        }
    }

    /// Check whether a newly-accepted connection from `addr` should be
    /// admitted. Checks the global budget first, then the per-IP budget.
    pub fn check(&self, addr: IpAddr) -> RateLimitResult {
        if let Some(global) = &self.global {
            let result = global.check(&"global");
            if result.is_limited() {
                return result;
            }
        }

        let Some((rps, burst)) = self.per_ip else {
            return RateLimitResult::Allowed { remaining: isize::MAX, limit: isize::MAX };
        };

        let limiter = {
            let existing = self.per_ip_limiters.read().ok().and_then(|g| g.get(&addr).cloned());
            match existing {
                Some(l) => l,
                None => {
                    let l = Arc::new(RateLimiter::new(rps, burst, Duration::from_secs(1)));
                    if let Ok(mut guard) = self.per_ip_limiters.write() {
                        guard.entry(addr).or_insert_with(|| l.clone());
                    }
                    l
                }
            }
        };

        limiter.check(&addr)
    }

    pub fn is_enabled(&self) -> bool {
        self.global.is_some()
    }
}
