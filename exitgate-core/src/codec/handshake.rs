#![forbid(unsafe_code)]

use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::cipher::KeySchedule;
use crate::error::{ConnError, ConnResult};

pub const HANDSHAKE_LEN: usize = 32;
const REPLAY_WINDOW_SECS: i64 = 300;
const PROTOCOL_VERSION: u8 = 1;

/// The fixed 32-byte plaintext handshake (spec §4.1 item 1): version(1) |
/// method(1) | reserved(2) | nonce(16, random) | unix timestamp(8, BE i64) |
/// HMAC tag(4, truncated over the first 28 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub version: u8,
    pub method: u8,
    pub client_nonce: [u8; 16],
    pub timestamp: i64,
}

impl Handshake {
    pub fn new(method: u8) -> Self {
        let mut client_nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut client_nonce);
        let timestamp = now_unix();
        Self { version: PROTOCOL_VERSION, method, client_nonce, timestamp }
    }

    pub fn encode(&self, keys: &KeySchedule) -> [u8; HANDSHAKE_LEN] {
        let mut frame = [0u8; HANDSHAKE_LEN];
        frame[0] = self.version;
        frame[1] = self.method;
        // bytes 2..4 reserved, left zero
        frame[4..20].copy_from_slice(&self.client_nonce);
        frame[20..28].copy_from_slice(&self.timestamp.to_be_bytes());
        let tag = keys.handshake_tag(&frame[..28]);
        frame[28..32].copy_from_slice(&tag);
        frame
    }

    /// Parse and authenticate a handshake frame against the receiver's
    /// clock. Rejects anything outside the ±300s replay window.
    pub fn decode(frame: &[u8; HANDSHAKE_LEN], keys: &KeySchedule) -> ConnResult<Self> {
        let version = frame[0];
        if version != PROTOCOL_VERSION {
            return Err(ConnError::BadVersion);
        }
        let method = frame[1];
        let mut client_nonce = [0u8; 16];
        client_nonce.copy_from_slice(&frame[4..20]);
        let timestamp = i64::from_be_bytes(frame[20..28].try_into().expect("8-byte slice"));

        let mut tag = [0u8; 4];
        tag.copy_from_slice(&frame[28..32]);
        keys.verify_handshake_tag(&frame[..28], &tag)?;

        let now = now_unix();
        if (now - timestamp).abs() > REPLAY_WINDOW_SECS {
            return Err(ConnError::TimestampOutOfWindow);
        }

        Ok(Self { version, method, client_nonce, timestamp })
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::cipher::CipherSuite;

    fn keys() -> KeySchedule {
        KeySchedule::derive(b"shared-secret", CipherSuite::ChaCha20Poly1305)
    }

    #[test]
    fn round_trips_a_fresh_handshake() {
        let keys = keys();
        let hs = Handshake::new(0);
        let frame = hs.encode(&keys);
        let decoded = Handshake::decode(&frame, &keys).unwrap();
        assert_eq!(hs, decoded);
    }

    #[test]
    fn rejects_wrong_version() {
        let keys = keys();
        let hs = Handshake::new(0);
        let mut frame = hs.encode(&keys);
        frame[0] = 99;
        // Mutating the version also invalidates the tag over bytes[..28],
        // but version is checked first.
        assert!(matches!(Handshake::decode(&frame, &keys), Err(ConnError::BadVersion)));
    }

    #[test]
    fn rejects_flipped_tag_bit() {
        let keys = keys();
        let hs = Handshake::new(0);
        let mut frame = hs.encode(&keys);
        frame[31] ^= 0x01;
        assert!(matches!(Handshake::decode(&frame, &keys), Err(ConnError::BadAuth)));
    }

    #[test]
    fn rejects_timestamp_outside_replay_window() {
        let keys = keys();
        let mut hs = Handshake::new(0);
        hs.timestamp = now_unix() - (REPLAY_WINDOW_SECS + 1);
        let frame = hs.encode(&keys);
        assert!(matches!(
            Handshake::decode(&frame, &keys),
            Err(ConnError::TimestampOutOfWindow)
        ));
    }

    #[test]
    fn accepts_timestamp_at_window_boundary() {
        let keys = keys();
        let mut hs = Handshake::new(0);
        hs.timestamp = now_unix() - REPLAY_WINDOW_SECS;
        let frame = hs.encode(&keys);
        assert!(Handshake::decode(&frame, &keys).is_ok());
    }
}
