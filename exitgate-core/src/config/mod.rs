mod exits;
mod health;
mod loader;
mod root;
mod rules;
mod security;
mod selector;
mod snat;
mod telemetry;
mod timeout;
mod tls;
mod validator;

pub use exits::ExitAddressConfig;
pub use health::HealthCheckConfig;
pub use loader::{load_from_path, ConfigHandle};
pub use root::CoreConfig;
pub use rules::{MatchKind, RuleAction, RuleConfig};
pub use security::{RateLimitConfig, SecurityConfig};
pub use selector::{GeoConfig, LoadBalanceMode, PortRange, PrimaryStrategy, SelectorConfig};
pub use snat::SnatConfig;
pub use telemetry::{LoggingConfig, TelemetryConfig};
pub use timeout::TimeoutConfig;
pub use tls::TlsConfig;
pub use validator::validate;
