use serde::Deserialize;
use std::net::SocketAddr;

use super::exits::ExitAddressConfig;
use super::health::HealthCheckConfig;
use super::rules::RuleConfig;
use super::security::SecurityConfig;
use super::selector::SelectorConfig;
use super::snat::SnatConfig;
use super::telemetry::{LoggingConfig, TelemetryConfig};
use super::timeout::TimeoutConfig;
use super::tls::TlsConfig;

/// The full, validated runtime configuration (spec §3 `Config`).
///
/// Deserialized from TOML by [`super::loader::load_from_path`], which also
/// runs [`super::validator::validate`] before handing back a `CoreConfig`.
#[derive(Debug, Deserialize, Clone)]
pub struct CoreConfig {
    /// Address the TLS-tunneled control/relay listener binds to.
    pub listen: SocketAddr,
    pub tls: TlsConfig,
    /// Filesystem path to the pre-shared tunnel authentication secret
    /// (spec §4.1 "Key schedule"). Read once at startup; never logged or
    /// embedded directly in this struct's `Debug` output.
    pub auth_secret_path: String,
    /// Pool of public source addresses selectable as exits. Must be
    /// non-empty.
    pub exits: Vec<ExitAddressConfig>,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub health: HealthCheckConfig,
    #[serde(default)]
    pub timeout: TimeoutConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub snat: SnatConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}
