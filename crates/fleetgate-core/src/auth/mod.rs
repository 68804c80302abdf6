//! Authentication: turning (username, secret) into a [`Principal`].
//!
//! Names shaped like `host.domain.tld` authenticate by host key against a
//! [`HostLookup`]; every other name is an operating-system user checked by
//! a [`CredentialVerifier`].

mod host_lookup;
mod verifier;

pub use host_lookup::{BackendHostLookup, StaticHostDirectory};
pub use verifier::{StaticCredentials, UnsupportedVerifier};

use crate::error::{Error, Result};
use fleetgate_policy::{GateConfig, HostRecord, Principal};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;

lazy_static! {
    static ref HOST_NAME: Regex = Regex::new(r"^[^.]+\.[^.]+\.\S+$").unwrap();
}

/// Looks up host records by identifier.
pub trait HostLookup: Send + Sync {
    fn lookup_host(&self, name: &str) -> Result<Option<HostRecord>>;
}

/// Verifies operating-system credentials.
pub trait CredentialVerifier: Send + Sync {
    /// Groups of `username` if `secret` is valid for it.
    fn verify(&self, username: &str, secret: &str) -> Result<BTreeSet<String>>;
}

/// True if `username` has the three-part dotted shape of a host name.
pub fn is_host_name(username: &str) -> bool {
    HOST_NAME.is_match(username)
}

/// Authenticates principals against configured collaborators.
#[derive(Clone)]
pub struct Authenticator {
    verifier: Arc<dyn CredentialVerifier>,
    host_lookup: Option<Arc<dyn HostLookup>>,
    forced_groups: Option<BTreeSet<String>>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("host_lookup", &self.host_lookup.is_some())
            .field("forced_groups", &self.forced_groups)
            .finish()
    }
}

impl Authenticator {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            verifier,
            host_lookup: None,
            forced_groups: None,
        }
    }

    /// Enable host-key authentication.
    pub fn with_host_lookup(mut self, lookup: Arc<dyn HostLookup>) -> Self {
        self.host_lookup = Some(lookup);
        self
    }

    /// Use `groups` verbatim for every successfully verified user.
    pub fn with_forced_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forced_groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    /// Apply the forced groups of `config`, if any.
    pub fn configure(self, config: &GateConfig) -> Self {
        match &config.force_groups {
            Some(groups) => self.with_forced_groups(groups),
            None => self,
        }
    }

    pub fn authenticate(&self, username: &str, secret: &str) -> Result<Principal> {
        if username.is_empty() {
            return Err(Error::authentication("no username specified"));
        }
        if secret.is_empty() {
            return Err(Error::authentication("no password specified"));
        }

        if is_host_name(username) {
            let Some(lookup) = &self.host_lookup else {
                return Err(Error::configuration(format!(
                    "no host lookup configured, cannot authenticate host '{username}'"
                )));
            };
            self.authenticate_host(lookup.as_ref(), username, secret)
        } else {
            self.authenticate_user(username, secret)
        }
    }

    fn authenticate_host(
        &self,
        lookup: &dyn HostLookup,
        username: &str,
        secret: &str,
    ) -> Result<Principal> {
        let name = username.to_lowercase();
        tracing::debug!(host = %name, "authenticating by host key");

        let failed = |reason: &str| {
            tracing::info!(host = %name, reason, "host authentication failed");
            Error::authentication(format!("host key authentication failed for host '{name}'"))
        };

        let record = match lookup.lookup_host(&name) {
            Ok(Some(record)) => record,
            Ok(None) => return Err(failed("host not found")),
            Err(err) => {
                tracing::debug!(host = %name, error = %err, "host lookup failed");
                return Err(failed("host lookup failed"));
            }
        };
        let Some(stored) = record.secret_key() else {
            return Err(failed("no host key stored"));
        };
        if stored.as_bytes() != secret.as_bytes() {
            return Err(failed("wrong key"));
        }

        tracing::info!(host = %record.id, "host key authentication successful");
        Ok(Principal::host(record))
    }

    fn authenticate_user(&self, username: &str, secret: &str) -> Result<Principal> {
        tracing::debug!(user = %username, "authenticating by operating system");
        let groups = match self.verifier.verify(username, secret) {
            Ok(groups) => groups,
            Err(err) => {
                tracing::info!(user = %username, error = %err, "user authentication failed");
                return Err(Error::authentication(format!(
                    "authentication failed for user '{username}'"
                )));
            }
        };
        let groups = self.forced_groups.clone().unwrap_or(groups);
        tracing::info!(user = %username, groups = ?groups, "user authentication successful");
        Ok(Principal::user(username, groups))
    }
}
