use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const BUCKET_WIDTH: Duration = Duration::from_secs(300);
const MAX_BUCKETS: usize = 288; // 24h of 5-minute buckets

/// One completed 5-minute traffic sample (spec §4.7 "TrafficTrend").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendSample {
    pub bucket_start: Instant,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub connections: u64,
}

struct Accumulator {
    bucket_start: Instant,
    bytes_sent: u64,
    bytes_received: u64,
    connections: u64,
}

/// A ring of completed 5-minute samples plus the bucket currently being
/// accumulated. Bucket rollover happens lazily on the next `record` or
/// `flush_if_due` call rather than on a dedicated timer task.
pub struct TrafficTrend {
    inner: Mutex<TrendState>,
}

struct TrendState {
    current: Accumulator,
    history: VecDeque<TrendSample>,
}

impl TrafficTrend {
    pub fn new(now: Instant) -> Self {
        Self {
            inner: Mutex::new(TrendState {
                current: Accumulator { bucket_start: now, bytes_sent: 0, bytes_received: 0, connections: 0 },
                history: VecDeque::with_capacity(MAX_BUCKETS),
            }),
        }
    }

    pub fn record(&self, now: Instant, bytes_sent: u64, bytes_received: u64, connections: u64) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        self.roll_if_due(&mut state, now);
        state.current.bytes_sent += bytes_sent;
        state.current.bytes_received += bytes_received;
        state.current.connections += connections;
    }

    /// Force a rollover check without recording a sample. Called
    /// periodically so quiet buckets still appear in history as zeros.
    pub fn tick(&self, now: Instant) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        self.roll_if_due(&mut state, now);
    }

    fn roll_if_due(&self, state: &mut TrendState, now: Instant) {
        while now.duration_since(state.current.bucket_start) >= BUCKET_WIDTH {
            let closed = TrendSample {
                bucket_start: state.current.bucket_start,
                bytes_sent: state.current.bytes_sent,
                bytes_received: state.current.bytes_received,
                connections: state.current.connections,
            };
            if state.history.len() == MAX_BUCKETS {
                state.history.pop_front();
            }
            state.history.push_back(closed);
            state.current = Accumulator {
                bucket_start: state.current.bucket_start + BUCKET_WIDTH,
                bytes_sent: 0,
                bytes_received: 0,
                connections: 0,
            };
        }
    }

    pub fn recent(&self, n: usize) -> Vec<TrendSample> {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.history.iter().rev().take(n).rev().copied().collect()
    }
}
