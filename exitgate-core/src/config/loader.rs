use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{RecursiveMode, Watcher};
use tracing::{error, info, warn};

use crate::config::root::CoreConfig;
use crate::config::validator::validate;
use crate::error::{ProxyError, Result};

/// Parse and validate a `CoreConfig` from a TOML file on disk.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<CoreConfig> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| ProxyError::Config(format!("failed to read config file: {e}")))?;
    let cfg: CoreConfig = toml::from_str(&text)
        .map_err(|e| ProxyError::Config(format!("failed to parse config: {e}")))?;
    validate(&cfg)?;
    Ok(cfg)
}

/// A live, hot-reloadable configuration snapshot.
///
/// Wraps an `ArcSwap<CoreConfig>` and a background `notify` watcher on the
/// config file's parent directory. Reloads that fail to parse or validate
/// are logged and discarded, leaving the last-good snapshot in place — the
/// same tolerant-reload policy the TLS cert watcher applies to certificate
/// files.
pub struct ConfigHandle {
    current: Arc<ArcSwap<CoreConfig>>,
    _watcher: notify::RecommendedWatcher,
}

impl ConfigHandle {
    /// Load `path`, validate it, and start watching it for changes.
    pub fn watch(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let initial = load_from_path(&path)?;
        let current = Arc::new(ArcSwap::from_pointee(initial));

        let watch_path = path.clone();
        let watched = current.clone();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    warn!("config watcher error: {e}");
                    return;
                }
            };
            if !matches!(
                event.kind,
                notify::EventKind::Modify(_) | notify::EventKind::Create(_)
            ) {
                return;
            }
            match load_from_path(&watch_path) {
                Ok(cfg) => {
                    info!("configuration reloaded from {}", watch_path.display());
                    watched.store(Arc::new(cfg));
                }
                Err(e) => {
                    error!("config reload failed, keeping previous snapshot: {e}");
                }
            }
        })
        .map_err(|e| ProxyError::Config(format!("failed to start config watcher: {e}")))?;

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        watcher
            .watch(parent, RecursiveMode::NonRecursive)
            .map_err(|e| ProxyError::Config(format!("failed to watch config directory: {e}")))?;

        Ok(Self {
            current,
            _watcher: watcher,
        })
    }

    /// Build a handle over an already-loaded config, with no filesystem
    /// watcher. Used by the test harness and by single-shot CLI subcommands.
    pub fn static_snapshot(cfg: CoreConfig) -> Result<Self> {
        let watcher = notify::recommended_watcher(|_: notify::Result<notify::Event>| {})
            .map_err(|e| ProxyError::Config(format!("failed to construct watcher: {e}")))?;
        Ok(Self {
            current: Arc::new(ArcSwap::from_pointee(cfg)),
            _watcher: watcher,
        })
    }

    pub fn load(&self) -> Arc<CoreConfig> {
        self.current.load_full()
    }

    pub fn poll_interval() -> Duration {
        Duration::from_secs(1)
    }
}
