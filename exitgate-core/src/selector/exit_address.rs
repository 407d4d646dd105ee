use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ExitAddressConfig;

/// A runtime exit address (spec §3 `ExitAddress`): the public source
/// address plus its kernel fwmark/routing-table assignment and the
/// counters the load-balanced selector reads.
///
/// `mark` and `table` are derived deterministically from ordinal position
/// at controller setup (`mark = i+1`, `table = 100+i`) and are stable for
/// the process's lifetime.
#[derive(Debug)]
pub struct ExitAddress {
    pub address: IpAddr,
    pub mark: u32,
    pub table: u32,
    pub label: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub active_connections: AtomicU64,
    pub total_bytes: AtomicU64,
}

impl ExitAddress {
    pub fn from_config(ordinal: usize, cfg: &ExitAddressConfig) -> Self {
        Self {
            address: cfg.address,
            mark: ordinal as u32 + 1,
            table: 100 + ordinal as u32,
            label: cfg.label.clone(),
            latitude: cfg.latitude,
            longitude: cfg.longitude,
            active_connections: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
        }
    }

    pub fn on_connect(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_disconnect(&self, bytes_transferred: u64) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes_transferred, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }
}

/// Build the full ordinal-assigned exit address list from configuration.
/// Ordinal position (and therefore mark/table) is fixed at process start
/// by the order addresses appear in config (spec §3 invariant).
pub fn build_exit_addresses(configs: &[ExitAddressConfig]) -> Vec<ExitAddress> {
    configs
        .iter()
        .enumerate()
        .map(|(i, cfg)| ExitAddress::from_config(i, cfg))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn mark_and_table_derive_from_ordinal_position() {
        let configs = vec![
            ExitAddressConfig { address: Ipv4Addr::new(1, 1, 1, 1).into(), label: None, latitude: None, longitude: None },
            ExitAddressConfig { address: Ipv4Addr::new(2, 2, 2, 2).into(), label: None, latitude: None, longitude: None },
        ];
        let exits = build_exit_addresses(&configs);
        assert_eq!(exits[0].mark, 1);
        assert_eq!(exits[0].table, 100);
        assert_eq!(exits[1].mark, 2);
        assert_eq!(exits[1].table, 101);
    }
}
