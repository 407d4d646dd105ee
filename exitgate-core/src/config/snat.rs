use serde::Deserialize;
use std::net::IpAddr;

/// Linux SNAT/policy-routing configuration (spec §4.5). Ignored outright on
/// non-Linux builds; `enabled` only has effect where `cfg(target_os =
/// "linux")` compiles the controller in.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SnatConfig {
    /// Install fwmark/iptables/ip-rule plumbing at startup.
    /// Default: false
    #[serde(default)]
    pub enabled: bool,
    /// Egress interface SNAT rules are attached to, e.g. `eth0`.
    pub interface: Option<String>,
    /// Default gateway used by the per-exit routing tables. When omitted,
    /// the controller queries the main routing table for the current
    /// default route at setup time.
    #[serde(default)]
    pub gateway: Option<IpAddr>,
}
