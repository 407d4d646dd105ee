use thiserror::Error;

/// Fatal errors: invalid config, missing certificate, bind failure. These
/// abort the process per spec §7.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No private key found in key file")]
    NoPrivateKey,

    #[error("No exit addresses configured")]
    NoExitAddresses,

    #[error("kernel setup failed: {0}")]
    KernelSetup(String),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

/// Per-connection errors. Caught by the orchestrator; end the connection
/// cleanly without aborting the process.
#[derive(Error, Debug)]
pub enum ConnError {
    #[error("bad protocol version")]
    BadVersion,

    #[error("bad framing: {0}")]
    BadFraming(String),

    #[error("authentication failed")]
    BadAuth,

    #[error("handshake timestamp outside the acceptance window")]
    TimestampOutOfWindow,

    #[error("nonce space exhausted")]
    NonceExhausted,

    #[error("no healthy exit address available")]
    NoneAvailable,

    #[error("blocked by rule")]
    Blocked,

    #[error("dial timed out")]
    DialTimeout,

    #[error("dial failed: {0}")]
    DialFailed(String),

    #[error("rejected by admission control")]
    AdmissionRejected,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConnResult<T> = std::result::Result<T, ConnError>;

/// Non-fatal errors raised by the kernel (SNAT/routing) controller during
/// teardown. Logged as warnings, never propagated.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("command {command} failed: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("netlink error: {0}")]
    Netlink(String),
}

/// Errors raised by the admin-facing rule CRUD surface (§4.8). Non-fatal,
/// reported back to the caller.
#[derive(Error, Debug)]
pub enum AdminError {
    #[error("invalid rule payload: {0}")]
    InvalidRule(String),

    #[error("unknown rule id: {0}")]
    UnknownRule(u64),
}
