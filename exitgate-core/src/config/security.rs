use serde::Deserialize;

/// Admission control and rate limiting (spec §5 "Resource caps").
#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    /// Maximum number of simultaneous connections, global.
    /// Default: 10000
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Maximum simultaneous connections from a single source IP.
    /// Default: 256
    #[serde(default = "default_max_per_ip")]
    pub max_connections_per_ip: usize,
    /// Connection admission rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_connections_per_ip: default_max_per_ip(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

fn default_max_connections() -> usize {
    10_000
}

fn default_max_per_ip() -> usize {
    256
}

/// Rate limiting configuration. Backpressure on the accept path is reject,
/// not queue, per spec §5.
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// Enable connection-rate limiting.
    /// Default: false
    #[serde(default)]
    pub enabled: bool,
    /// Global connections-per-second allowance.
    /// Default: 1000
    #[serde(default = "default_global_rps")]
    pub global_connections_per_second: u32,
    /// Per-IP connections-per-second allowance.
    /// Default: 20
    #[serde(default = "default_per_ip_rps")]
    pub per_ip_connections_per_second: u32,
    /// Burst allowance on top of the steady rate.
    /// Default: 2x the global rate
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            global_connections_per_second: default_global_rps(),
            per_ip_connections_per_second: default_per_ip_rps(),
            burst: default_burst(),
        }
    }
}

fn default_global_rps() -> u32 {
    1_000
}

fn default_per_ip_rps() -> u32 {
    20
}

fn default_burst() -> u32 {
    2_000
}
