#![forbid(unsafe_code)]

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use chacha20poly1305::ChaCha20Poly1305;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{ConnError, ConnResult};

type HmacSha256 = Hmac<Sha256>;

const AEAD_KEY_LEN: usize = 32;
const HMAC_KEY_LEN: usize = 32;

/// The negotiated AEAD suite for a connection (spec §4.1): AES-256-GCM is
/// preferred when hardware AES is available, ChaCha20-Poly1305 is the
/// software fallback otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CipherSuite {
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl CipherSuite {
    /// Pick AES-256-GCM when the target has AES-NI (or equivalent hardware
    /// acceleration), else ChaCha20-Poly1305.
    pub fn select() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if std::is_x86_feature_detected!("aes") && std::is_x86_feature_detected!("sse2") {
                return CipherSuite::Aes256Gcm;
            }
        }
        #[cfg(target_arch = "aarch64")]
        {
            if std::is_aarch64_feature_detected!("aes") {
                return CipherSuite::Aes256Gcm;
            }
        }
        CipherSuite::ChaCha20Poly1305
    }
}

/// Sub-keys derived from the pre-shared authentication secret via
/// HKDF-SHA256 (spec §4.1 "Key schedule").
pub struct KeySchedule {
    pub suite: CipherSuite,
    aead_key: [u8; AEAD_KEY_LEN],
    hmac_key: [u8; HMAC_KEY_LEN],
}

impl KeySchedule {
    pub fn derive(psk: &[u8], suite: CipherSuite) -> Self {
        let hk = Hkdf::<Sha256>::new(None, psk);
        let mut aead_key = [0u8; AEAD_KEY_LEN];
        hk.expand(b"exitgate aead key", &mut aead_key)
            .expect("hkdf output length fits within its 255x hash-length limit");
        let mut hmac_key = [0u8; HMAC_KEY_LEN];
        hk.expand(b"exitgate hmac key", &mut hmac_key)
            .expect("hkdf output length fits within its 255x hash-length limit");
        Self { suite, aead_key, hmac_key }
    }

    pub fn cipher(&self) -> Cipher {
        match self.suite {
            CipherSuite::Aes256Gcm => Cipher::Aes256Gcm(Box::new(
                Aes256Gcm::new_from_slice(&self.aead_key)
                    .expect("32-byte key matches AES-256-GCM's required key length"),
            )),
            CipherSuite::ChaCha20Poly1305 => Cipher::ChaCha20Poly1305(Box::new(
                ChaCha20Poly1305::new_from_slice(&self.aead_key)
                    .expect("32-byte key matches ChaCha20-Poly1305's required key length"),
            )),
        }
    }

    /// Truncated HMAC-SHA256 tag (4 bytes) over the handshake's first 28
    /// bytes, using the authentication sub-key.
    pub fn handshake_tag(&self, message: &[u8]) -> [u8; 4] {
        let mut mac = HmacSha256::new_from_slice(&self.hmac_key)
            .expect("HMAC-SHA256 accepts any key length");
        mac.update(message);
        let full = mac.finalize().into_bytes();
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&full[..4]);
        tag
    }

    pub fn verify_handshake_tag(&self, message: &[u8], tag: &[u8; 4]) -> ConnResult<()> {
        let expected = self.handshake_tag(message);
        // Constant-time comparison: HMAC tags guard authentication, a timing
        // leak here would defeat the point of truncating it in the first place.
        if subtle::ConstantTimeEq::ct_eq(&expected[..], &tag[..]).into() {
            Ok(())
        } else {
            Err(ConnError::BadAuth)
        }
    }
}

/// An instantiated AEAD cipher for one connection direction.
pub enum Cipher {
    Aes256Gcm(Box<Aes256Gcm>),
    ChaCha20Poly1305(Box<ChaCha20Poly1305>),
}

impl Cipher {
    pub fn seal(&self, nonce: &[u8; 12], plaintext: &[u8]) -> ConnResult<Vec<u8>> {
        let nonce = AesNonce::from_slice(nonce);
        let payload = Payload { msg: plaintext, aad: &[] };
        match self {
            Cipher::Aes256Gcm(c) => c.encrypt(nonce, payload).map_err(|_| ConnError::BadAuth),
            Cipher::ChaCha20Poly1305(c) => {
                let nonce = chacha20poly1305::Nonce::from_slice(nonce.as_slice());
                let payload = Payload { msg: plaintext, aad: &[] };
                c.encrypt(nonce, payload).map_err(|_| ConnError::BadAuth)
            }
        }
    }

    pub fn open(&self, nonce: &[u8; 12], ciphertext: &[u8]) -> ConnResult<Vec<u8>> {
        let payload = Payload { msg: ciphertext, aad: &[] };
        match self {
            Cipher::Aes256Gcm(c) => {
                let nonce = AesNonce::from_slice(nonce);
                c.decrypt(nonce, payload).map_err(|_| ConnError::BadAuth)
            }
            Cipher::ChaCha20Poly1305(c) => {
                let nonce = chacha20poly1305::Nonce::from_slice(nonce.as_slice());
                let payload = Payload { msg: ciphertext, aad: &[] };
                c.decrypt(nonce, payload).map_err(|_| ConnError::BadAuth)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_under_both_suites() {
        for suite in [CipherSuite::Aes256Gcm, CipherSuite::ChaCha20Poly1305] {
            let schedule = KeySchedule::derive(b"test-preshared-secret", suite);
            let cipher = schedule.cipher();
            let nonce = [7u8; 12];
            let sealed = cipher.seal(&nonce, b"hello exit").unwrap();
            let opened = cipher.open(&nonce, &sealed).unwrap();
            assert_eq!(opened, b"hello exit");
        }
    }

    #[test]
    fn tampered_ciphertext_fails_auth() {
        let schedule = KeySchedule::derive(b"test-preshared-secret", CipherSuite::ChaCha20Poly1305);
        let cipher = schedule.cipher();
        let nonce = [1u8; 12];
        let mut sealed = cipher.seal(&nonce, b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(cipher.open(&nonce, &sealed).is_err());
    }

    #[test]
    fn handshake_tag_rejects_flipped_bit() {
        let schedule = KeySchedule::derive(b"test-preshared-secret", CipherSuite::Aes256Gcm);
        let mut message = [0u8; 28];
        message[0] = 5;
        let tag = schedule.handshake_tag(&message);
        assert!(schedule.verify_handshake_tag(&message, &tag).is_ok());
        message[0] ^= 0xff;
        assert!(schedule.verify_handshake_tag(&message, &tag).is_err());
    }
}
