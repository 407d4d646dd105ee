use sha2::{Digest, Sha256};

/// Deterministic destination-hash index (spec §4.3 "Destination-Hash",
/// §8 law 4 "selector determinism"): SHA-256 over `"host:port"`, first 8
/// bytes as a big-endian u64, modulo pool size.
pub fn index_for(host: &str, port: u16, pool_len: usize) -> usize {
    if pool_len == 0 {
        return 0;
    }
    let mut hasher = Sha256::new();
    hasher.update(host.as_bytes());
    hasher.update(b":");
    hasher.update(port.to_string().as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let value = u64::from_be_bytes(bytes);
    (value % pool_len as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_destination_same_pool_len_is_deterministic() {
        let a = index_for("example.com", 443, 5);
        let b = index_for("example.com", 443, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn index_is_within_pool_bounds() {
        for port in 1..200u16 {
            let idx = index_for("host", port, 7);
            assert!(idx < 7);
        }
    }
}
