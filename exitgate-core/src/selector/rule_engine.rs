use std::net::IpAddr;

use regex::Regex;

use crate::config::{MatchKind, RuleAction, RuleConfig};
use crate::error::ConnError;

/// What a matched rule asks the selector to do next. `Block` short-
/// circuits connection setup entirely; the other two name a target
/// address the caller must still validate against the live healthy pool
/// (spec §8 law "every outbound socket is either marked for some healthy
/// address or not dialed at all" — a rule can't force a dial to an
/// address that just went unhealthy).
pub enum RuleOutcome {
    UseAddress(IpAddr),
    Block,
}

/// A rule list pre-sorted by descending priority (ties broken by original
/// insertion order) and pre-compiled (regex patterns parsed once, not per
/// lookup).
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
}

struct CompiledRule {
    enabled: bool,
    match_kind: CompiledMatch,
    action: RuleAction,
}

enum CompiledMatch {
    DomainGlob(Regex),
    Cidr(ipnet::IpNet),
    Ip(IpAddr),
    Regex(Regex),
}

impl RuleEngine {
    pub fn compile(rules: &[RuleConfig]) -> Result<Self, ConnError> {
        let mut sorted: Vec<&RuleConfig> = rules.iter().collect();
        // Stable sort: descending priority, ties keep insertion order.
        sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
        let compiled = sorted
            .into_iter()
            .map(|r| {
                let match_kind = match &r.match_kind {
                    MatchKind::DomainGlob { pattern } => {
                        CompiledMatch::DomainGlob(glob_to_regex(pattern))
                    }
                    MatchKind::Cidr { network } => CompiledMatch::Cidr(*network),
                    MatchKind::Ip { address } => CompiledMatch::Ip(*address),
                    MatchKind::Regex { pattern } => CompiledMatch::Regex(
                        Regex::new(pattern)
                            .map_err(|e| ConnError::BadFraming(format!("bad rule regex: {e}")))?,
                    ),
                };
                Ok(CompiledRule { enabled: r.enabled, match_kind, action: r.action.clone() })
            })
            .collect::<Result<Vec<_>, ConnError>>()?;
        Ok(Self { rules: compiled })
    }

    /// Walk the rule list in priority order; first enabled match wins.
    /// `host` is the original destination hostname if the request named
    /// one (domain-glob/regex rules never match a raw-IP destination).
    pub fn evaluate(&self, host: Option<&str>, ip: Option<IpAddr>) -> Option<RuleOutcome> {
        for rule in &self.rules {
            if !rule.enabled {
                continue;
            }
            let matched = match &rule.match_kind {
                CompiledMatch::DomainGlob(re) => host.is_some_and(|h| re.is_match(h)),
                CompiledMatch::Regex(re) => host.is_some_and(|h| re.is_match(h)),
                CompiledMatch::Cidr(net) => ip.is_some_and(|addr| net.contains(&addr)),
                CompiledMatch::Ip(want) => ip.is_some_and(|addr| addr == *want),
            };
            if !matched {
                continue;
            }
            return Some(match &rule.action {
                RuleAction::Block => RuleOutcome::Block,
                RuleAction::UseAddress { address } | RuleAction::Redirect { address } => {
                    RuleOutcome::UseAddress(*address)
                }
            });
        }
        None
    }
}

fn glob_to_regex(pattern: &str) -> Regex {
    let mut out = String::from("(?i)^");
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            c if "\\.+?()|[]{}^$".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    Regex::new(&out).expect("glob-derived pattern is always valid regex")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn rule(id: &str, priority: i32, match_kind: MatchKind, action: RuleAction) -> RuleConfig {
        RuleConfig { id: id.to_string(), enabled: true, priority, match_kind, action }
    }

    #[test]
    fn first_enabled_match_wins_by_priority() {
        let cfgs = vec![
            rule(
                "a",
                100,
                MatchKind::DomainGlob { pattern: "*.example.com".into() },
                RuleAction::UseAddress { address: Ipv4Addr::new(1, 1, 1, 1).into() },
            ),
            rule(
                "b",
                50,
                MatchKind::DomainGlob { pattern: "*.example.com".into() },
                RuleAction::UseAddress { address: Ipv4Addr::new(2, 2, 2, 2).into() },
            ),
        ];
        let engine = RuleEngine::compile(&cfgs).unwrap();
        match engine.evaluate(Some("api.example.com"), None) {
            Some(RuleOutcome::UseAddress(addr)) => assert_eq!(addr, Ipv4Addr::new(1, 1, 1, 1)),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn disabled_rule_is_skipped() {
        let mut r = rule(
            "a",
            1,
            MatchKind::Ip { address: Ipv4Addr::new(9, 9, 9, 9).into() },
            RuleAction::Block,
        );
        r.enabled = false;
        let engine = RuleEngine::compile(&[r]).unwrap();
        assert!(engine.evaluate(None, Some(Ipv4Addr::new(9, 9, 9, 9).into())).is_none());
    }

    #[test]
    fn cidr_match_blocks() {
        let cfgs = vec![rule(
            "a",
            1,
            MatchKind::Cidr { network: "10.0.0.0/8".parse().unwrap() },
            RuleAction::Block,
        )];
        let engine = RuleEngine::compile(&cfgs).unwrap();
        assert!(matches!(
            engine.evaluate(None, Some(Ipv4Addr::new(10, 1, 2, 3).into())),
            Some(RuleOutcome::Block)
        ));
    }

    #[test]
    fn no_match_returns_none() {
        let engine = RuleEngine::compile(&[]).unwrap();
        assert!(engine.evaluate(Some("anything"), None).is_none());
    }
}
