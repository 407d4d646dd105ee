use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use notify::{RecursiveMode, Watcher};
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, warn};

use crate::config::TlsConfig;
use crate::error::Result;

use super::acceptor::build_rustls;

/// A hot-reloadable TLS acceptor: an `ArcSwap` snapshot kept current by a
/// `notify` watcher on the certificate and key files' parent directory.
/// Mirrors [`crate::config::ConfigHandle`]'s reload discipline — a reload
/// that fails to parse is logged and the previous acceptor is kept.
pub struct TlsReloader {
    acceptor: Arc<ArcSwap<TlsAcceptor>>,
    _watcher: notify::RecommendedWatcher,
}

impl TlsReloader {
    pub async fn start(tls_config: TlsConfig) -> Result<Self> {
        let initial = build_rustls(&tls_config)?;
        let acceptor = Arc::new(ArcSwap::from_pointee(initial));

        let watched = acceptor.clone();
        let watch_config = tls_config.clone();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    warn!("TLS file watcher error: {e}");
                    return;
                }
            };
            if !matches!(
                event.kind,
                notify::EventKind::Modify(_) | notify::EventKind::Create(_)
            ) {
                return;
            }
            match build_rustls(&watch_config) {
                Ok(new_acceptor) => {
                    info!("TLS certificate reloaded");
                    watched.store(Arc::new(new_acceptor));
                }
                Err(e) => {
                    error!("TLS certificate reload failed, keeping previous acceptor: {e}");
                }
            }
        })
        .map_err(|e| crate::error::ProxyError::Tls(format!("failed to start cert watcher: {e}")))?;

        for path in [&tls_config.cert_path, &tls_config.key_path] {
            let parent = Path::new(path).parent().unwrap_or_else(|| Path::new("."));
            watcher
                .watch(parent, RecursiveMode::NonRecursive)
                .map_err(|e| {
                    crate::error::ProxyError::Tls(format!("failed to watch {}: {e}", parent.display()))
                })?;
        }

        Ok(Self { acceptor, _watcher: watcher })
    }

    pub fn current(&self) -> Arc<TlsAcceptor> {
        self.acceptor.load_full()
    }
}
