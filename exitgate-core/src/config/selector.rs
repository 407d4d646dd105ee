use serde::Deserialize;

/// Load-balanced selector tie-break metric (spec §4.3 "Load-Balanced").
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceMode {
    Connections,
    Traffic,
}

/// A half-open destination-port range routed to a fixed exit address
/// (spec §4.3 "Port-Based").
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
    pub address: std::net::IpAddr,
}

/// The primary exit-selection strategy. Exactly one is chosen; the
/// health-aware, geo, and rule-matched wrappers are layered on top per
/// `SelectorConfig` below rather than being strategy variants themselves
/// (spec §9 design note on sealed-enum dispatch plus decorators).
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PrimaryStrategy {
    RoundRobin,
    DestinationHash,
    LoadBalanced {
        #[serde(default = "default_lb_mode")]
        mode: LoadBalanceMode,
    },
    PortBased {
        ranges: Vec<PortRange>,
    },
}

fn default_lb_mode() -> LoadBalanceMode {
    LoadBalanceMode::Connections
}

impl Default for PrimaryStrategy {
    fn default() -> Self {
        PrimaryStrategy::RoundRobin
    }
}

/// Geo-aware wrapper configuration (spec §4.3 "Geo").
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GeoConfig {
    #[serde(default)]
    pub enabled: bool,
    /// How long a resolved geolocation is cached, in seconds.
    /// Default: 86400 (24 hours)
    #[serde(default = "default_geo_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_geo_cache_ttl() -> u64 {
    86_400
}

/// Top-level selector configuration: a primary strategy plus optional
/// wrapping decorators, innermost first in application order
/// (health-aware is always outermost, applied unconditionally by the
/// orchestrator rather than configured here).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SelectorConfig {
    #[serde(flatten, default)]
    pub primary: PrimaryStrategy,
    #[serde(default)]
    pub geo: GeoConfig,
    /// Apply the rule engine (spec §4.3 "Rule-Matched") in front of the
    /// primary strategy. The rule list itself lives in `CoreConfig::rules`.
    #[serde(default)]
    pub rules_enabled: bool,
}
