use std::net::IpAddr;

use crate::config::PortRange;

/// First matching half-open range `[start, end)` wins; otherwise the
/// first table entry (spec §4.3 "Port-Based"). `end` itself belongs to
/// whichever range starts there, not this one.
pub fn address_for(ranges: &[PortRange], dest_port: u16) -> Option<IpAddr> {
    ranges
        .iter()
        .find(|r| dest_port >= r.start && dest_port < r.end)
        .or_else(|| ranges.first())
        .map(|r| r.address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn range(start: u16, end: u16, n: u8) -> PortRange {
        PortRange { start, end, address: Ipv4Addr::new(10, 0, 0, n).into() }
    }

    #[test]
    fn matching_range_wins() {
        let ranges = vec![range(1, 1023, 1), range(1024, 65535, 2)];
        assert_eq!(address_for(&ranges, 80), Some(Ipv4Addr::new(10, 0, 0, 1).into()));
        assert_eq!(address_for(&ranges, 8080), Some(Ipv4Addr::new(10, 0, 0, 2).into()));
    }

    #[test]
    fn range_end_is_exclusive() {
        let ranges = vec![range(1000, 2000, 1), range(2000, 3000, 2)];
        assert_eq!(address_for(&ranges, 1999), Some(Ipv4Addr::new(10, 0, 0, 1).into()));
        assert_eq!(address_for(&ranges, 2000), Some(Ipv4Addr::new(10, 0, 0, 2).into()));
    }

    #[test]
    fn no_match_falls_back_to_first_entry() {
        let ranges = vec![range(1, 100, 9)];
        assert_eq!(address_for(&ranges, 5000), Some(Ipv4Addr::new(10, 0, 0, 9).into()));
    }

    #[test]
    fn empty_table_yields_none() {
        assert_eq!(address_for(&[], 80), None);
    }
}
