use super::CredentialVerifier;
use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Verifier for environments without a platform mechanism; always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedVerifier;

impl CredentialVerifier for UnsupportedVerifier {
    fn verify(&self, _username: &str, _secret: &str) -> Result<BTreeSet<String>> {
        Err(Error::authentication("unsupported authentication environment"))
    }
}

#[derive(Debug, Clone)]
struct UserEntry {
    digest: String,
    groups: BTreeSet<String>,
}

/// In-memory user table holding SHA-256 hex digests of secrets.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    users: BTreeMap<String, UserEntry>,
}

fn secret_digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with a plaintext secret; only its digest is kept.
    pub fn with_user<I, S>(self, name: impl Into<String>, secret: &str, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_user_digest(name, secret_digest(secret), groups)
    }

    /// Add a user with a precomputed hex digest.
    pub fn with_user_digest<I, S>(
        mut self,
        name: impl Into<String>,
        digest: impl Into<String>,
        groups: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users.insert(
            name.into(),
            UserEntry {
                digest: digest.into().to_lowercase(),
                groups: groups.into_iter().map(Into::into).collect(),
            },
        );
        self
    }
}

impl CredentialVerifier for StaticCredentials {
    fn verify(&self, username: &str, secret: &str) -> Result<BTreeSet<String>> {
        match self.users.get(username) {
            Some(entry) if entry.digest == secret_digest(secret) => Ok(entry.groups.clone()),
            Some(_) => Err(Error::authentication(format!("wrong password for user '{username}'"))),
            None => Err(Error::authentication(format!("unknown user '{username}'"))),
        }
    }
}
