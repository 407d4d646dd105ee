#![forbid(unsafe_code)]

use rand::RngCore;

use crate::error::{ConnError, ConnResult};

/// Per-direction nonce sequence: a 4-byte random prefix fixed for the
/// lifetime of the connection direction, plus an 8-byte monotonic counter
/// (spec §9 "Open question — nonce construction", resolved in favor of the
/// hardening prefix).
pub struct NonceSequence {
    prefix: [u8; 4],
    counter: u64,
    exhausted: bool,
}

impl NonceSequence {
    pub fn new() -> Self {
        let mut prefix = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut prefix);
        Self { prefix, counter: 0, exhausted: false }
    }

    /// Produce the next nonce, or `NonceExhausted` if the counter would
    /// overflow. The counter is never reused once emitted.
    pub fn next(&mut self) -> ConnResult<[u8; 12]> {
        if self.exhausted {
            return Err(ConnError::NonceExhausted);
        }
        let current = self.counter;
        match self.counter.checked_add(1) {
            Some(next) => self.counter = next,
            None => self.exhausted = true,
        }
        let mut nonce = [0u8; 12];
        nonce[..4].copy_from_slice(&self.prefix);
        nonce[4..].copy_from_slice(&current.to_be_bytes());
        Ok(nonce)
    }
}

impl Default for NonceSequence {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonces_are_distinct_across_a_sequence() {
        let mut seq = NonceSequence::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10_000 {
            let nonce = seq.next().unwrap();
            assert!(seen.insert(nonce), "nonce reused within one direction");
        }
    }

    #[test]
    fn prefix_is_stable_across_calls() {
        let mut seq = NonceSequence::new();
        let a = seq.next().unwrap();
        let b = seq.next().unwrap();
        assert_eq!(&a[..4], &b[..4]);
        assert_ne!(&a[4..], &b[4..]);
    }

    #[test]
    fn counter_overflow_raises_nonce_exhausted_before_reuse() {
        let mut seq = NonceSequence { prefix: [0; 4], counter: u64::MAX, exhausted: false };
        let last = seq.next().unwrap();
        assert_eq!(&last[4..], &u64::MAX.to_be_bytes());
        let err = seq.next().unwrap_err();
        assert!(matches!(err, ConnError::NonceExhausted));
    }
}
