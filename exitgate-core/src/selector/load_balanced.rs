use crate::config::LoadBalanceMode;
use crate::selector::exit_address::ExitAddress;

/// Pick the pool member with the lowest load metric (spec §4.3
/// "Load-Balanced"). Ties are broken by pool order (first minimum wins).
pub fn pick<'a>(pool: &'a [&'a ExitAddress], mode: LoadBalanceMode) -> Option<&'a ExitAddress> {
    pool.iter().copied().min_by_key(|exit| match mode {
        LoadBalanceMode::Connections => exit.active_connections(),
        LoadBalanceMode::Traffic => exit.total_bytes(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExitAddressConfig;
    use crate::selector::exit_address::build_exit_addresses;
    use std::net::Ipv4Addr;

    fn cfg(n: u8) -> ExitAddressConfig {
        ExitAddressConfig { address: Ipv4Addr::new(10, 0, 0, n).into(), label: None, latitude: None, longitude: None }
    }

    #[test]
    fn picks_lowest_active_connections_with_pool_order_tiebreak() {
        let exits = build_exit_addresses(&[cfg(1), cfg(2), cfg(3)]);
        exits[0].on_connect();
        exits[0].on_connect();
        exits[2].on_connect();
        let pool: Vec<&ExitAddress> = exits.iter().collect();
        let picked = pick(&pool, LoadBalanceMode::Connections).unwrap();
        assert_eq!(picked.address, exits[1].address);
    }
}
