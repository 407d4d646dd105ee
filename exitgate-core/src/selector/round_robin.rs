use std::sync::atomic::{AtomicUsize, Ordering};

/// Atomic-counter round-robin cursor (spec §4.3 "Round-Robin"), grounded
/// on the teacher's load-balancing round robin counter.
#[derive(Debug, Default)]
pub struct RoundRobin {
    index: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self { index: AtomicUsize::new(0) }
    }

    /// Next index into a pool of `len`. Resets are expected (and
    /// acceptable, per spec §9) whenever the pool is rebuilt with a new
    /// `RoundRobin` instance on a health-change event.
    pub fn next(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.index.fetch_add(1, Ordering::Relaxed) % len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fair_over_n_multiple_of_pool_size() {
        let rr = RoundRobin::new();
        let pool_size = 3;
        let mut counts = [0usize; 3];
        for _ in 0..30 {
            counts[rr.next(pool_size)] += 1;
        }
        assert_eq!(counts, [10, 10, 10]);
    }
}
