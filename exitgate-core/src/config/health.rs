use serde::Deserialize;

/// Health checker parameters (spec §4.4).
#[derive(Debug, Deserialize, Clone)]
pub struct HealthCheckConfig {
    /// Interval between probe rounds, in seconds.
    /// Default: 30
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Per-probe timeout, in seconds.
    /// Default: 5
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Consecutive failures required to flip an address to `Unhealthy`.
    /// Default: 3
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Well-known TCP ports probed in order; success on any marks the round
    /// healthy. UDP/53 is attempted as a last resort regardless of this list.
    /// Default: [80, 443, 53]
    #[serde(default = "default_probe_ports")]
    pub probe_ports: Vec<u16>,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            probe_timeout_secs: default_probe_timeout(),
            failure_threshold: default_failure_threshold(),
            probe_ports: default_probe_ports(),
        }
    }
}

fn default_interval() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_probe_ports() -> Vec<u16> {
    vec![80, 443, 53]
}
