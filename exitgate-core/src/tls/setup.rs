use crate::config::TlsConfig;
use crate::error::Result;

use super::reloader::TlsReloader;

/// Build the initial TLS acceptor and start the background hot-reload
/// watcher in one call, the way the orchestrator's startup path wants it.
pub async fn setup_tls_with_hot_reload(tls_config: &TlsConfig) -> Result<TlsReloader> {
    TlsReloader::start(tls_config.clone()).await
}
