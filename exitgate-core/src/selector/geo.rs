use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::selector::exit_address::ExitAddress;

/// Geolocation lookup for a destination host. Exit-address geolocation
/// comes from static config (`ExitAddress::latitude`/`longitude`); only
/// the destination side needs an external provider. Left as a seam: no
/// concrete geo database ships here, matching the admin/HTTP surface
/// being a collaborator interface rather than an in-tree implementation.
pub trait GeoProvider: Send + Sync {
    fn locate(&self, host: &str) -> Option<(f64, f64)>;
}

/// A provider with no backing database. Always misses, which sends the
/// Geo wrapper down its documented fallback path to the inner selector.
pub struct NoopGeoProvider;

impl GeoProvider for NoopGeoProvider {
    fn locate(&self, _host: &str) -> Option<(f64, f64)> {
        None
    }
}

impl GeoProvider for Box<dyn GeoProvider> {
    fn locate(&self, host: &str) -> Option<(f64, f64)> {
        (**self).locate(host)
    }
}

/// Caches destination geolocation lookups for `ttl` (spec §4.3 "Geo",
/// default 24h).
pub struct GeoCache<P> {
    provider: P,
    ttl: Duration,
    entries: Mutex<HashMap<String, (Option<(f64, f64)>, Instant)>>,
}

impl<P: GeoProvider> GeoCache<P> {
    pub fn new(provider: P, ttl: Duration) -> Self {
        Self { provider, ttl, entries: Mutex::new(HashMap::new()) }
    }

    pub fn locate(&self, host: &str) -> Option<(f64, f64)> {
        let now = Instant::now();
        {
            let cache = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if let Some((coords, fetched_at)) = cache.get(host) {
                if now.duration_since(*fetched_at) < self.ttl {
                    return *coords;
                }
            }
        }
        let coords = self.provider.locate(host);
        let mut cache = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(host.to_string(), (coords, now));
        coords
    }
}

/// Tracks a rolling most-recent latency sample per exit address, fed by
/// the orchestrator's dial path. Used only as the latency term in the
/// Geo score; absence of a sample excludes the address from Geo scoring
/// (it falls back to the inner selector if no address qualifies).
#[derive(Default)]
pub struct LatencyTracker {
    samples: DashMap<IpAddr, AtomicU64>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, addr: IpAddr, latency_ms: u64) {
        self.samples.entry(addr).or_insert_with(|| AtomicU64::new(latency_ms)).store(latency_ms, Ordering::Relaxed);
    }

    pub fn latency_ms(&self, addr: IpAddr) -> Option<f64> {
        self.samples.get(&addr).map(|v| v.load(Ordering::Relaxed) as f64)
    }
}

const EARTH_RADIUS_KM: f64 = 6371.0;

fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

fn score(distance_km: f64, latency_ms: f64) -> f64 {
    0.3 * (1.0 / (1.0 + distance_km)) + 0.7 * (1.0 / (1.0 + latency_ms))
}

/// Highest-scoring candidate, or `None` if no candidate has both a known
/// geolocation and a recent latency sample — the caller should then fall
/// back to its inner selector (spec §4.3 "Geo").
pub fn pick<'a>(
    pool: &[&'a ExitAddress],
    dest_coords: Option<(f64, f64)>,
    latencies: &LatencyTracker,
) -> Option<&'a ExitAddress> {
    let dest = dest_coords?;
    let mut best: Option<(&ExitAddress, f64)> = None;
    for exit in pool {
        let (Some(lat), Some(lon)) = (exit.latitude, exit.longitude) else { continue };
        let Some(latency_ms) = latencies.latency_ms(exit.address) else { continue };
        let distance_km = haversine_km(dest, (lat, lon));
        let s = score(distance_km, latency_ms);
        best = match best {
            Some((_, best_score)) if best_score >= s => best,
            _ => Some((exit, s)),
        };
    }
    best.map(|(exit, _)| exit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_zero_distance_for_identical_points() {
        let d = haversine_km((40.0, -74.0), (40.0, -74.0));
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn closer_and_lower_latency_scores_higher() {
        let near = score(10.0, 5.0);
        let far = score(5000.0, 200.0);
        assert!(near > far);
    }

    #[test]
    fn missing_destination_coords_yields_no_pick() {
        let latencies = LatencyTracker::new();
        let result = pick(&[], None, &latencies);
        assert!(result.is_none());
    }
}
