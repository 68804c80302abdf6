//! Access control lists.
//!
//! # Evaluation order
//!
//! ```text
//! operation ──► first rule whose pattern matches (later rules ignored)
//!                 │            no rule ──► Denied
//!                 ▼
//!          entries, in order:
//!            grant == none     ──► skip
//!            grant == partial  ──► record entry, continue
//!            grant == full     ──► record entry, stop
//!                 │
//!                 ▼
//!   Full | Partial(recorded entries) | Denied (nothing recorded)
//! ```
//!
//! The outer scan stops at the first matching rule even when all of its
//! entries deny. Operators must order rules from specific to general.

use crate::error::{PolicyError, PolicyResult};
use crate::principal::Principal;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

lazy_static! {
    static ref MATCH_ALL: Regex = Regex::new(".*").unwrap();
}

/// Kind of grant an ACL entry expresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AclEntryType {
    All,
    OpsiDepotserver,
    OpsiClient,
    SysGroup,
    SysUser,
    /// Grants access to objects owned by the principal.
    SelfOwned,
    /// Unrecognized type from configuration; grants nothing.
    Unknown(String),
}

impl AclEntryType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "all",
            Self::OpsiDepotserver => "opsi_depotserver",
            Self::OpsiClient => "opsi_client",
            Self::SysGroup => "sys_group",
            Self::SysUser => "sys_user",
            Self::SelfOwned => "self",
            Self::Unknown(other) => other,
        }
    }
}

impl From<String> for AclEntryType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "all" => Self::All,
            "opsi_depotserver" => Self::OpsiDepotserver,
            "opsi_client" => Self::OpsiClient,
            "sys_group" => Self::SysGroup,
            "sys_user" => Self::SysUser,
            "self" => Self::SelfOwned,
            _ => Self::Unknown(value),
        }
    }
}

impl From<AclEntryType> for String {
    fn from(value: AclEntryType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AclEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw grant computed for a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    None,
    Full,
    /// Depends on the objects passed or returned (`self` entries).
    PartialObject,
    /// Restricted to a subset of attributes.
    PartialAttributes,
}

impl Grant {
    pub fn is_granted(self) -> bool {
        !matches!(self, Self::None)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawAclEntry {
    #[serde(rename = "type")]
    entry_type: AclEntryType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ids: Vec<String>,
    #[serde(default, alias = "allowAttributes", skip_serializing_if = "Vec::is_empty")]
    allow_attributes: Vec<String>,
    #[serde(default, alias = "denyAttributes", skip_serializing_if = "Vec::is_empty")]
    deny_attributes: Vec<String>,
}

/// One grant within an ACL rule.
///
/// Empty attribute lists are normalized to absent, so an entry carrying
/// `allow_attributes: []` still grants full access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawAclEntry", into = "RawAclEntry")]
pub struct AclEntry {
    entry_type: AclEntryType,
    ids: BTreeSet<String>,
    allow_attributes: Option<BTreeSet<String>>,
    deny_attributes: Option<BTreeSet<String>>,
}

fn non_empty_set<I, S>(values: I) -> Option<BTreeSet<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let set: BTreeSet<String> = values.into_iter().map(Into::into).collect();
    (!set.is_empty()).then_some(set)
}

impl From<RawAclEntry> for AclEntry {
    fn from(raw: RawAclEntry) -> Self {
        Self {
            entry_type: raw.entry_type,
            ids: raw.ids.into_iter().collect(),
            allow_attributes: non_empty_set(raw.allow_attributes),
            deny_attributes: non_empty_set(raw.deny_attributes),
        }
    }
}

impl From<AclEntry> for RawAclEntry {
    fn from(entry: AclEntry) -> Self {
        Self {
            entry_type: entry.entry_type,
            ids: entry.ids.into_iter().collect(),
            allow_attributes: entry.allow_attributes.into_iter().flatten().collect(),
            deny_attributes: entry.deny_attributes.into_iter().flatten().collect(),
        }
    }
}

impl AclEntry {
    pub fn new(entry_type: AclEntryType) -> Self {
        Self {
            entry_type,
            ids: BTreeSet::new(),
            allow_attributes: None,
            deny_attributes: None,
        }
    }

    pub fn all() -> Self {
        Self::new(AclEntryType::All)
    }

    pub fn self_owned() -> Self {
        Self::new(AclEntryType::SelfOwned)
    }

    pub fn sys_group<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(AclEntryType::SysGroup).with_ids(groups)
    }

    pub fn sys_user<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(AclEntryType::SysUser).with_ids(users)
    }

    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn allow<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_attributes = non_empty_set(attributes);
        self
    }

    pub fn deny<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deny_attributes = non_empty_set(attributes);
        self
    }

    pub fn entry_type(&self) -> &AclEntryType {
        &self.entry_type
    }

    pub fn ids(&self) -> &BTreeSet<String> {
        &self.ids
    }

    pub fn allow_attributes(&self) -> Option<&BTreeSet<String>> {
        self.allow_attributes.as_ref()
    }

    pub fn deny_attributes(&self) -> Option<&BTreeSet<String>> {
        self.deny_attributes.as_ref()
    }

    pub fn is_attribute_restricted(&self) -> bool {
        self.allow_attributes.is_some() || self.deny_attributes.is_some()
    }

    /// Raw grant of this entry for `principal`.
    pub fn grant(&self, principal: &Principal) -> Grant {
        let granted = match &self.entry_type {
            AclEntryType::All => Grant::Full,
            AclEntryType::OpsiDepotserver => full_if(principal.is_depot_server(&self.ids)),
            AclEntryType::OpsiClient => full_if(principal.is_client(&self.ids)),
            AclEntryType::SysGroup => full_if(principal.is_member_of(&self.ids)),
            AclEntryType::SysUser => full_if(principal.is_named(&self.ids)),
            AclEntryType::SelfOwned => Grant::PartialObject,
            AclEntryType::Unknown(entry_type) => {
                tracing::error!(entry_type = %entry_type, "unhandled acl entry type");
                Grant::None
            }
        };

        if granted.is_granted() && self.is_attribute_restricted() {
            Grant::PartialAttributes
        } else {
            granted
        }
    }
}

fn full_if(condition: bool) -> Grant {
    if condition {
        Grant::Full
    } else {
        Grant::None
    }
}

/// Uncompiled ACL rule as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclRuleSpec {
    pub pattern: String,
    #[serde(default)]
    pub entries: Vec<AclEntry>,
}

impl AclRuleSpec {
    pub fn new(pattern: impl Into<String>, entries: Vec<AclEntry>) -> Self {
        Self {
            pattern: pattern.into(),
            entries,
        }
    }
}

/// Compiled ACL rule.
#[derive(Debug, Clone)]
pub struct AclRule {
    pattern: Regex,
    entries: Vec<AclEntry>,
}

impl AclRule {
    pub fn compile(spec: &AclRuleSpec) -> PolicyResult<Self> {
        let pattern = Regex::new(&spec.pattern).map_err(|source| PolicyError::InvalidPattern {
            pattern: spec.pattern.clone(),
            source,
        })?;
        Ok(Self {
            pattern,
            entries: spec.entries.clone(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn entries(&self) -> &[AclEntry] {
        &self.entries
    }

    pub fn matches(&self, operation: &str) -> bool {
        self.pattern.is_match(operation)
    }
}

/// Outcome of ACL evaluation for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantDecision {
    Full,
    Denied,
    /// Access limited by the listed granting entries, in rule order.
    Partial(Vec<AclEntry>),
}

impl GrantDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Denied => "denied",
            Self::Partial(_) => "partial",
        }
    }
}

/// Decision plus how it was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEvaluation {
    /// Index of the rule that matched, if any.
    pub rule_index: Option<usize>,
    /// Number of entries of that rule that were evaluated.
    pub evaluated: usize,
    pub decision: GrantDecision,
}

/// Ordered list of ACL rules.
#[derive(Debug, Clone, Default)]
pub struct AclTable {
    rules: Vec<AclRule>,
}

impl AclTable {
    pub fn compile(specs: &[AclRuleSpec]) -> PolicyResult<Self> {
        let rules = specs
            .iter()
            .map(AclRule::compile)
            .collect::<PolicyResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Single rule matching every operation, granting full access to
    /// members of `admin_group`.
    pub fn admin_only(admin_group: &str) -> Self {
        Self {
            rules: vec![AclRule {
                pattern: MATCH_ALL.clone(),
                entries: vec![AclEntry::sys_group([admin_group])],
            }],
        }
    }

    /// This table, or [`AclTable::admin_only`] when it has no rules.
    pub fn or_admin_only(self, admin_group: &str) -> Self {
        if self.rules.is_empty() {
            Self::admin_only(admin_group)
        } else {
            self
        }
    }

    pub fn rules(&self) -> &[AclRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule whose pattern matches `operation`, with its index.
    pub fn rule_for(&self, operation: &str) -> Option<(usize, &AclRule)> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(operation))
    }

    pub fn evaluate(&self, operation: &str, principal: &Principal) -> GrantDecision {
        self.explain(operation, principal).decision
    }

    pub fn explain(&self, operation: &str, principal: &Principal) -> AclEvaluation {
        let Some((rule_index, rule)) = self.rule_for(operation) else {
            tracing::debug!(operation, "no acl rule matches");
            return AclEvaluation {
                rule_index: None,
                evaluated: 0,
                decision: GrantDecision::Denied,
            };
        };
        tracing::debug!(operation, pattern = rule.pattern(), "found matching acl rule");

        let mut granting = Vec::new();
        let mut evaluated = 0;
        let mut full = false;
        for entry in &rule.entries {
            evaluated += 1;
            let grant = entry.grant(principal);
            if !grant.is_granted() {
                continue;
            }
            granting.push(entry.clone());
            if grant == Grant::Full {
                full = true;
                break;
            }
        }

        let decision = if full {
            GrantDecision::Full
        } else if granting.is_empty() {
            GrantDecision::Denied
        } else {
            GrantDecision::Partial(granting)
        };
        AclEvaluation {
            rule_index: Some(rule_index),
            evaluated,
            decision,
        }
    }
}
