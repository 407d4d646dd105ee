use serde::Deserialize;
use std::net::IpAddr;

/// What a rule matches against (spec §4.3 "Rule-Matched").
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchKind {
    /// Glob over the destination hostname, e.g. `*.example.com`.
    DomainGlob { pattern: String },
    /// Destination IP falls within this CIDR block.
    Cidr { network: ipnet::IpNet },
    /// Exact destination IP match.
    Ip { address: IpAddr },
    /// Regex over the destination hostname.
    Regex { pattern: String },
}

/// What happens when a rule matches.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RuleAction {
    /// Force selection of a specific configured exit address.
    UseAddress { address: IpAddr },
    /// Reject the connection outright.
    Block,
    /// Alias for `UseAddress`, kept for configs migrated from reverse-proxy
    /// redirect rules; semantics are identical.
    Redirect { address: IpAddr },
}

/// A single routing rule. Rules are evaluated in descending `priority`
/// order; the first match wins and the rest are skipped.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RuleConfig {
    pub id: String,
    #[serde(default)]
    pub enabled: bool,
    /// Higher values are evaluated first; ties broken by insertion order.
    pub priority: i32,
    #[serde(rename = "match")]
    pub match_kind: MatchKind,
    pub action: RuleAction,
}
