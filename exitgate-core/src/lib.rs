#![forbid(unsafe_code)]

pub mod codec;
pub mod config;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod security;
pub mod selector;
pub mod shutdown;
pub mod snat;
pub mod stats;
pub mod telemetry;
pub mod tls;

pub use config::{load_from_path, ConfigHandle, CoreConfig};
pub use error::{ConnError, ConnResult, ProxyError, Result};
pub use orchestrator::run;
pub use shutdown::{ShutdownHandle, ShutdownSignal};
