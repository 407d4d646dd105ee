use serde::Deserialize;

/// TLS termination configuration for the tunnel listener.
///
/// TLS 1.3 only, per spec §4.2 — the acceptor does not negotiate below it.
#[derive(Debug, Deserialize, Clone)]
pub struct TlsConfig {
    /// PEM certificate chain path.
    pub cert_path: String,
    /// PEM private key path (PKCS8 or RSA).
    pub key_path: String,
    /// ALPN protocols advertised by the acceptor.
    /// Default: ["h2", "http/1.1"] to resemble ordinary HTTPS (fake-SNI mode).
    #[serde(default = "default_alpn")]
    pub alpn: Vec<String>,
    /// Common domain(s) the certificate advertises. Informational only —
    /// rustls serves whatever `cert_path` contains; this field documents the
    /// intended fake-SNI identity for operators.
    #[serde(default)]
    pub server_names: Vec<String>,
}

fn default_alpn() -> Vec<String> {
    vec!["h2".to_string(), "http/1.1".to_string()]
}
