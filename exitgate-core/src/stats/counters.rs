#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::anomaly::AnomalyDetector;
use super::trend::{TrafficTrend, TrendSample};

/// Bound on the rolling access-timestamp window kept per key (spec §3
/// `DomainStat`/`ExitStat`: "rolling access-timestamps window (bounded,
/// default 1,000 entries)").
const ACCESS_WINDOW_CAP: usize = 1_000;

/// A bounded ring of recent access timestamps, shared by `ExitStat` and
/// `DomainStat`. Used both to answer "how many hits in the last N
/// seconds" for the anomaly detector and to report `last_access_time`.
#[derive(Debug, Default)]
struct AccessWindow {
    timestamps: Mutex<VecDeque<Instant>>,
}

impl AccessWindow {
    fn record(&self, now: Instant) {
        let mut ring = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());
        if ring.len() == ACCESS_WINDOW_CAP {
            ring.pop_front();
        }
        ring.push_back(now);
    }

    fn last(&self) -> Option<Instant> {
        self.timestamps.lock().unwrap_or_else(|e| e.into_inner()).back().copied()
    }

    /// Count of timestamps falling within `(now - window, now]`.
    fn count_within(&self, now: Instant, window: Duration) -> u64 {
        let ring = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());
        ring.iter().rev().take_while(|t| now.saturating_duration_since(**t) < window).count() as u64
    }
}

/// Cumulative sum/count pair used to report a running average latency
/// without retaining every sample (spec §3 `average_latency`).
#[derive(Debug, Default)]
struct LatencyAccumulator {
    sum_ms: AtomicU64,
    samples: AtomicU64,
}

impl LatencyAccumulator {
    fn record(&self, latency_ms: u64) {
        self.sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    fn average(&self) -> f64 {
        let samples = self.samples.load(Ordering::Relaxed);
        if samples == 0 {
            return 0.0;
        }
        self.sum_ms.load(Ordering::Relaxed) as f64 / samples as f64
    }
}

/// A read-only snapshot of one key's counters, safe to hand to the
/// admin/HTTP collaborator layer (spec §4.8 `snapshot_stats`).
#[derive(Debug, Clone, Copy)]
pub struct StatSnapshot {
    pub active: i64,
    pub total: u64,
    pub bytes_up: u64,
    pub bytes_down: u64,
    pub average_latency_ms: f64,
    pub last_access: Option<Instant>,
}

/// Per-exit-address traffic counters (spec §3 `ExitStat`, §4.7 "per exit
/// address").
#[derive(Debug, Default)]
pub struct ExitStat {
    active: AtomicI64,
    total: AtomicU64,
    bytes_up: AtomicU64,
    bytes_down: AtomicU64,
    dial_failures: AtomicU64,
    latency: LatencyAccumulator,
    window: AccessWindow,
}

impl ExitStat {
    fn record_connect(&self, now: Instant) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
        self.window.record(now);
    }

    fn record_close(&self, sent: u64, received: u64) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        self.bytes_up.fetch_add(sent, Ordering::Relaxed);
        self.bytes_down.fetch_add(received, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatSnapshot {
        StatSnapshot {
            active: self.active.load(Ordering::Relaxed).max(0),
            total: self.total.load(Ordering::Relaxed),
            bytes_up: self.bytes_up.load(Ordering::Relaxed),
            bytes_down: self.bytes_down.load(Ordering::Relaxed),
            average_latency_ms: self.latency.average(),
            last_access: self.window.last(),
        }
    }
}

/// Per-destination-host traffic counters (spec §3 `DomainStat`, §4.7 "per
/// destination host").
#[derive(Debug, Default)]
pub struct DomainStat {
    active: AtomicI64,
    total: AtomicU64,
    bytes_up: AtomicU64,
    bytes_down: AtomicU64,
    latency: LatencyAccumulator,
    window: AccessWindow,
}

impl DomainStat {
    fn snapshot(&self) -> StatSnapshot {
        StatSnapshot {
            active: self.active.load(Ordering::Relaxed).max(0),
            total: self.total.load(Ordering::Relaxed),
            bytes_up: self.bytes_up.load(Ordering::Relaxed),
            bytes_down: self.bytes_down.load(Ordering::Relaxed),
            average_latency_ms: self.latency.average(),
            last_access: self.window.last(),
        }
    }
}

/// Sharded, lock-free counters keyed by exit address and destination host.
/// Uses `dashmap` the way the teacher's `DnsCache` shards its resolution
/// cache, rather than a single mutex-guarded map (spec §5 "sharded
/// concurrent maps keyed by string; shard count tuned to core count").
#[derive(Debug)]
pub struct StatsRegistry {
    by_exit: DashMap<IpAddr, ExitStat>,
    by_domain: DashMap<String, DomainStat>,
    trends: DashMap<IpAddr, TrafficTrend>,
    anomalies: AnomalyDetector,
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self {
            by_exit: DashMap::new(),
            by_domain: DashMap::new(),
            trends: DashMap::new(),
            anomalies: AnomalyDetector::new(2.0),
        }
    }

    pub fn record_connect(&self, exit: IpAddr, destination: &str) {
        let now = Instant::now();
        self.by_exit.entry(exit).or_default().record_connect(now);

        let (last_minute, previous_minute) = {
            let domain = self.by_domain.entry(destination.to_string()).or_default();
            domain.total.fetch_add(1, Ordering::Relaxed);
            domain.active.fetch_add(1, Ordering::Relaxed);
            domain.window.record(now);

            let last_minute = domain.window.count_within(now, Duration::from_secs(60));
            let previous_minute = domain
                .window
                .count_within(now - Duration::from_secs(60), Duration::from_secs(60))
                .saturating_sub(last_minute);
            (last_minute, previous_minute)
        };
        self.anomalies.observe(destination, now, last_minute, previous_minute);
    }

    pub fn record_close(&self, exit: IpAddr, destination: &str, sent: u64, received: u64) {
        if let Some(stat) = self.by_exit.get(&exit) {
            stat.record_close(sent, received);
        }
        if let Some(stat) = self.by_domain.get(destination) {
            stat.active.fetch_sub(1, Ordering::Relaxed);
            stat.bytes_up.fetch_add(sent, Ordering::Relaxed);
            stat.bytes_down.fetch_add(received, Ordering::Relaxed);
        }
        let now = Instant::now();
        self.trends.entry(exit).or_insert_with(|| TrafficTrend::new(now)).record(now, sent, received, 1);
    }

    /// Force a bucket-rollover check on every exit's trend sampler without
    /// recording traffic, so quiet 5-minute windows still appear as zero
    /// samples (spec §4.7 "a background sampler records one `TrafficTrend`
    /// point every 5 minutes"). Call this from a periodic background task.
    pub fn tick_trends(&self, now: std::time::Instant) {
        for entry in self.trends.iter() {
            entry.tick(now);
        }
    }

    pub fn recent_trend(&self, exit: IpAddr, n: usize) -> Vec<TrendSample> {
        self.trends.get(&exit).map(|t| t.recent(n)).unwrap_or_default()
    }

    pub fn record_dial_failure(&self, exit: IpAddr) {
        self.by_exit.entry(exit).or_default().dial_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dial_failures(&self, exit: IpAddr) -> u64 {
        self.by_exit.get(&exit).map(|s| s.dial_failures.load(Ordering::Relaxed)).unwrap_or(0)
    }

    pub fn record_latency(&self, exit: IpAddr, latency_ms: u64) {
        self.by_exit.entry(exit).or_default().latency.record(latency_ms);
    }

    pub fn exit_snapshot(&self, exit: IpAddr) -> Option<StatSnapshot> {
        self.by_exit.get(&exit).map(|s| s.snapshot())
    }

    pub fn domain_snapshot(&self, destination: &str) -> Option<StatSnapshot> {
        self.by_domain.get(destination).map(|s| s.snapshot())
    }

    pub fn total_bytes(&self, exit: IpAddr) -> u64 {
        self.by_exit
            .get(&exit)
            .map(|s| s.bytes_up.load(Ordering::Relaxed) + s.bytes_down.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn active_connections(&self, exit: IpAddr) -> u64 {
        self.by_exit
            .get(&exit)
            .map(|s| s.active.load(Ordering::Relaxed).max(0) as u64)
            .unwrap_or(0)
    }

    /// Recent detected anomalies for `destination`, newest last (spec §4.8
    /// `snapshot_stats` collaborator surface).
    pub fn recent_anomalies(&self, destination: &str, n: usize) -> Vec<super::anomaly::AnomalyRecord> {
        self.anomalies.recent(destination, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn exit_stat_tracks_active_count_and_bytes() {
        let reg = StatsRegistry::new();
        let exit = IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1));
        reg.record_connect(exit, "example.com:443");
        assert_eq!(reg.active_connections(exit), 1);
        reg.record_close(exit, "example.com:443", 100, 200);
        assert_eq!(reg.active_connections(exit), 0);
        assert_eq!(reg.total_bytes(exit), 300);
    }

    #[test]
    fn active_never_goes_negative_on_spurious_close() {
        let reg = StatsRegistry::new();
        let exit = IpAddr::V4(Ipv4Addr::new(2, 2, 2, 2));
        reg.record_close(exit, "x", 0, 0);
        assert_eq!(reg.active_connections(exit), 0);
    }
}
