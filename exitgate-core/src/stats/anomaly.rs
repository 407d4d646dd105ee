use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

/// Append-only bounded ring size for detected anomalies per target (spec
/// §3 `AnomalyRecord`: "append-only bounded ring (default 100)").
const RING_CAP: usize = 100;

/// What kind of anomaly was detected. The core currently only implements
/// the minute-over-minute request-rate spike from spec §4.7; the variant
/// exists so `AnomalyRecord` matches the §3 data model even though only
/// one kind is produced today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyKind {
    TrafficSpike,
}

/// A detected traffic spike for one destination host (spec §3
/// `AnomalyRecord`, §4.7 "anomaly detector": requests in the last minute
/// exceeded `anomaly_threshold` times requests in the previous minute).
#[derive(Debug, Clone)]
pub struct AnomalyRecord {
    pub target: String,
    pub kind: AnomalyKind,
    pub severity: f64,
    pub detected_at: Instant,
    pub observed: u64,
    pub expected: f64,
    pub description: String,
}

struct Inner {
    ring: VecDeque<AnomalyRecord>,
}

/// Per-domain request-rate spike detector (spec §4.7). Fed on every
/// access with the request counts for the last minute and the minute
/// before it; a request count more than `threshold_multiple` times the
/// previous minute's trips the detector.
pub struct AnomalyDetector {
    threshold_multiple: f64,
    state: Mutex<std::collections::HashMap<String, Inner>>,
}

impl AnomalyDetector {
    pub fn new(threshold_multiple: f64) -> Self {
        Self { threshold_multiple, state: Mutex::new(std::collections::HashMap::new()) }
    }

    /// Record one access for `target` and report an anomaly if
    /// `last_minute` exceeds `threshold_multiple * previous_minute`. A
    /// `previous_minute` of zero never trips the detector — there is no
    /// baseline yet to compare against.
    pub fn observe(
        &self,
        target: &str,
        now: Instant,
        last_minute: u64,
        previous_minute: u64,
    ) -> Option<AnomalyRecord> {
        if previous_minute == 0 {
            return None;
        }
        let expected = previous_minute as f64 * self.threshold_multiple;
        if (last_minute as f64) <= expected {
            return None;
        }

        let record = AnomalyRecord {
            target: target.to_string(),
            kind: AnomalyKind::TrafficSpike,
            severity: last_minute as f64 / previous_minute as f64,
            detected_at: now,
            observed: last_minute,
            expected,
            description: format!(
                "{last_minute} requests in the last minute vs {previous_minute} the minute before (threshold {}x)",
                self.threshold_multiple
            ),
        };

        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let entry = guard.entry(target.to_string()).or_insert_with(|| Inner { ring: VecDeque::with_capacity(RING_CAP) });
        if entry.ring.len() == RING_CAP {
            entry.ring.pop_front();
        }
        entry.ring.push_back(record.clone());
        Some(record)
    }

    pub fn recent(&self, target: &str, n: usize) -> Vec<AnomalyRecord> {
        let guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .get(target)
            .map(|inner| inner.ring.iter().rev().take(n).rev().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spike_above_threshold_is_recorded() {
        let detector = AnomalyDetector::new(2.0);
        let now = Instant::now();
        assert!(detector.observe("example.com", now, 25, 10).is_some());
        assert_eq!(detector.recent("example.com", 10).len(), 1);
    }

    #[test]
    fn below_threshold_is_not_recorded() {
        let detector = AnomalyDetector::new(2.0);
        let now = Instant::now();
        assert!(detector.observe("example.com", now, 15, 10).is_none());
        assert!(detector.recent("example.com", 10).is_empty());
    }

    #[test]
    fn zero_baseline_never_trips() {
        let detector = AnomalyDetector::new(2.0);
        let now = Instant::now();
        assert!(detector.observe("example.com", now, 100, 0).is_none());
    }
}
