use serde::Deserialize;

/// Connection timeout configuration (spec §4.6).
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutConfig {
    /// Dial timeout in milliseconds.
    /// Default: 5000 (5 seconds)
    #[serde(default = "default_dial_timeout")]
    pub dial_ms: u64,
    /// Read timeout in milliseconds, reset on every successful read.
    /// Default: 60000 (60 seconds)
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,
    /// Write timeout in milliseconds.
    /// Default: 60000 (60 seconds)
    #[serde(default = "default_write_timeout")]
    pub write_ms: u64,
    /// Idle timeout in milliseconds; resets on every successful read or
    /// write on either direction of the relay.
    /// Default: 300000 (5 minutes)
    #[serde(default = "default_idle_timeout")]
    pub idle_ms: u64,
    /// Graceful shutdown grace window in seconds.
    /// Default: 30
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            dial_ms: default_dial_timeout(),
            read_ms: default_read_timeout(),
            write_ms: default_write_timeout(),
            idle_ms: default_idle_timeout(),
            shutdown_grace_secs: default_shutdown_timeout(),
        }
    }
}

fn default_dial_timeout() -> u64 {
    5_000
}

fn default_read_timeout() -> u64 {
    60_000
}

fn default_write_timeout() -> u64 {
    60_000
}

fn default_idle_timeout() -> u64 {
    300_000
}

fn default_shutdown_timeout() -> u64 {
    30
}
