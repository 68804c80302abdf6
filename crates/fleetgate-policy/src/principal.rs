//! Authenticated identities.
//!
//! A [`Principal`] is produced exactly once, when authentication succeeds,
//! and is never mutated afterwards. It is either a managed host that
//! authenticated with its host key, or an operating-system user with a set
//! of group memberships.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Role of a managed host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKind {
    DepotServer,
    Client,
    Other,
}

impl HostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DepotServer => "depot_server",
            Self::Client => "client",
            Self::Other => "other",
        }
    }
}

/// Host record returned by a host lookup.
#[derive(Clone, PartialEq, Eq)]
pub struct HostRecord {
    pub id: String,
    pub kind: HostKind,
    secret_key: Option<String>,
}

impl HostRecord {
    pub fn new(id: impl Into<String>, kind: HostKind) -> Self {
        Self {
            id: id.into(),
            kind,
            secret_key: None,
        }
    }

    pub fn with_secret_key(mut self, key: impl Into<String>) -> Self {
        self.secret_key = Some(key.into());
        self
    }

    /// Stored host key, if any. Empty keys count as absent.
    pub fn secret_key(&self) -> Option<&str> {
        self.secret_key.as_deref().filter(|k| !k.is_empty())
    }
}

impl fmt::Debug for HostRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostRecord")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// What kind of identity a principal is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalKind {
    Host(HostRecord),
    User { groups: BTreeSet<String> },
}

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    name: String,
    kind: PrincipalKind,
}

impl Principal {
    /// Principal for a host that authenticated with its host key.
    pub fn host(record: HostRecord) -> Self {
        Self {
            name: record.id.clone(),
            kind: PrincipalKind::Host(record),
        }
    }

    /// Principal for an operating-system user.
    pub fn user<I, S>(name: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: PrincipalKind::User {
                groups: groups.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &PrincipalKind {
        &self.kind
    }

    pub fn host_record(&self) -> Option<&HostRecord> {
        match &self.kind {
            PrincipalKind::Host(record) => Some(record),
            PrincipalKind::User { .. } => None,
        }
    }

    /// Group memberships. Hosts have none.
    pub fn groups(&self) -> Option<&BTreeSet<String>> {
        match &self.kind {
            PrincipalKind::User { groups } => Some(groups),
            PrincipalKind::Host(_) => None,
        }
    }

    /// True if this is a user belonging to any of `ids`.
    pub fn is_member_of<'a, I>(&self, ids: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        match self.groups() {
            Some(groups) => ids.into_iter().any(|id| groups.contains(id)),
            None => false,
        }
    }

    /// True if the principal's name is one of `ids`.
    pub fn is_named<'a, I>(&self, ids: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        ids.into_iter().any(|id| *id == self.name)
    }

    /// True if this is a depot-server host and, when `ids` is non-empty,
    /// its identifier is listed.
    pub fn is_depot_server(&self, ids: &BTreeSet<String>) -> bool {
        self.is_host_of_kind(HostKind::DepotServer, ids)
    }

    /// True if this is a client host and, when `ids` is non-empty, its
    /// identifier is listed.
    pub fn is_client(&self, ids: &BTreeSet<String>) -> bool {
        self.is_host_of_kind(HostKind::Client, ids)
    }

    fn is_host_of_kind(&self, kind: HostKind, ids: &BTreeSet<String>) -> bool {
        match self.host_record() {
            Some(host) if host.kind == kind => ids.is_empty() || ids.contains(&host.id),
            _ => false,
        }
    }
}
