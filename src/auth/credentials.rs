//! Stored credentials and password verification

use crate::config::UserConfig;
use anyhow::{Context, Result};
use subtle::ConstantTimeEq;

/// A user's stored secret
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Compared byte for byte with the presented password
    Plain(String),
    /// Bcrypt hash of the password
    Bcrypt(String),
}

impl Credential {
    /// Pick the credential configured for a user. `password_hash` wins when
    /// both are set; validation rejects that case before we get here.
    pub fn from_config(user: &UserConfig) -> Option<Self> {
        match (&user.password_hash, &user.password) {
            (Some(hash), _) => Some(Self::Bcrypt(hash.clone())),
            (None, Some(password)) => Some(Self::Plain(password.clone())),
            (None, None) => None,
        }
    }

    /// Check a presented password. Case- and byte-sensitive, no normalization.
    pub fn verify(&self, presented: &str) -> bool {
        match self {
            Self::Plain(expected) => presented.as_bytes().ct_eq(expected.as_bytes()).into(),
            Self::Bcrypt(hash) => match bcrypt::verify(presented, hash) {
                Ok(valid) => valid,
                Err(e) => {
                    tracing::warn!(error = %e, "Password hash verification error");
                    false
                }
            },
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Credential::Plain(<redacted>)"),
            Self::Bcrypt(_) => f.write_str("Credential::Bcrypt(<redacted>)"),
        }
    }
}

/// Hash a password for a `passwordHash` configuration entry
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).context("Failed to hash password")
}
