use std::collections::HashSet;
use std::path::Path;

use crate::config::root::CoreConfig;
use crate::config::rules::{MatchKind, RuleAction};
use crate::config::selector::PrimaryStrategy;
use crate::error::{ProxyError, Result};

/// Structural validation beyond what serde's field-level defaults can
/// express: cross-field invariants from spec §3 and §4.
pub fn validate(cfg: &CoreConfig) -> Result<()> {
    if cfg.exits.is_empty() {
        return Err(ProxyError::Config(
            "at least one exit address is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for exit in &cfg.exits {
        if !seen.insert(exit.address) {
            return Err(ProxyError::Config(format!(
                "duplicate exit address: {}",
                exit.address
            )));
        }
    }

    if !Path::new(&cfg.tls.cert_path).exists() {
        return Err(ProxyError::Config(format!(
            "certificate file not found: {}",
            cfg.tls.cert_path
        )));
    }
    if !Path::new(&cfg.tls.key_path).exists() {
        return Err(ProxyError::Config(format!(
            "key file not found: {}",
            cfg.tls.key_path
        )));
    }
    if !Path::new(&cfg.auth_secret_path).exists() {
        return Err(ProxyError::Config(format!(
            "auth secret file not found: {}",
            cfg.auth_secret_path
        )));
    }

    if let PrimaryStrategy::PortBased { ranges } = &cfg.selector.primary {
        if ranges.is_empty() {
            return Err(ProxyError::Config(
                "port_based selector requires at least one range".to_string(),
            ));
        }
        for range in ranges {
            if range.start > range.end {
                return Err(ProxyError::Config(format!(
                    "port range start {} exceeds end {}",
                    range.start, range.end
                )));
            }
            if !cfg.exits.iter().any(|e| e.address == range.address) {
                return Err(ProxyError::Config(format!(
                    "port range references unconfigured exit address: {}",
                    range.address
                )));
            }
        }
    }

    if cfg.selector.geo.enabled {
        for exit in &cfg.exits {
            if exit.latitude.is_none() || exit.longitude.is_none() {
                return Err(ProxyError::Config(format!(
                    "geo selector requires latitude/longitude on every exit, missing for {}",
                    exit.address
                )));
            }
        }
    }

    let mut rule_ids = HashSet::new();
    for rule in &cfg.rules {
        if !rule_ids.insert(rule.id.as_str()) {
            return Err(ProxyError::Config(format!(
                "duplicate rule id: {}",
                rule.id
            )));
        }
        match &rule.match_kind {
            MatchKind::Regex { pattern } => {
                regex::Regex::new(pattern).map_err(|e| {
                    ProxyError::Config(format!("invalid regex in rule {}: {e}", rule.id))
                })?;
            }
            MatchKind::DomainGlob { pattern } if pattern.is_empty() => {
                return Err(ProxyError::Config(format!(
                    "empty domain glob pattern in rule {}",
                    rule.id
                )));
            }
            _ => {}
        }
        let target = match &rule.action {
            RuleAction::UseAddress { address } | RuleAction::Redirect { address } => Some(*address),
            RuleAction::Block => None,
        };
        if let Some(addr) = target {
            if !cfg.exits.iter().any(|e| e.address == addr) {
                return Err(ProxyError::Config(format!(
                    "rule {} targets unconfigured exit address: {}",
                    rule.id, addr
                )));
            }
        }
    }

    if cfg.timeout.dial_ms == 0 {
        return Err(ProxyError::Config("timeout.dial_ms must be > 0".to_string()));
    }
    if cfg.timeout.read_ms == 0 {
        return Err(ProxyError::Config("timeout.read_ms must be > 0".to_string()));
    }
    if cfg.timeout.write_ms == 0 {
        return Err(ProxyError::Config("timeout.write_ms must be > 0".to_string()));
    }
    if cfg.timeout.idle_ms == 0 {
        return Err(ProxyError::Config("timeout.idle_ms must be > 0".to_string()));
    }
    if cfg.security.max_connections == 0 {
        return Err(ProxyError::Config(
            "security.max_connections must be > 0".to_string(),
        ));
    }

    if cfg.snat.enabled && cfg.snat.interface.is_none() {
        return Err(ProxyError::Config(
            "snat.interface is required when snat.enabled = true".to_string(),
        ));
    }

    Ok(())
}
