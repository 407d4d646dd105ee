use serde::Deserialize;
use std::net::IpAddr;

/// One configured public source address (spec §3 `ExitAddress`).
///
/// `mark` and `table` are *not* read from config — they are derived
/// deterministically from ordinal position at controller setup (spec §4.5).
/// Only the address itself, and optional geo coordinates for the `geo`
/// selector, are configuration surface.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ExitAddressConfig {
    /// The public source address to bind outbound connections to.
    pub address: IpAddr,
    /// Optional human-readable label, surfaced in stats/admin views.
    #[serde(default)]
    pub label: Option<String>,
    /// Latitude in degrees, required for the `geo` selector.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Longitude in degrees, required for the `geo` selector.
    #[serde(default)]
    pub longitude: Option<f64>,
}
