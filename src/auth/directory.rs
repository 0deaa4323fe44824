//! Users and the directory that owns them

use super::credentials::Credential;
use super::{AuthFailure, AuthResult};
use crate::acl::Policy;
use crate::config::{AuthzConfig, ConfigError};
use std::collections::HashMap;
use std::sync::Arc;

/// An authentication identity and its ordered policies
#[derive(Debug)]
pub struct User {
    pub username: String,
    pub credential: Credential,
    pub policies: Vec<Policy>,
}

impl User {
    pub fn new(username: impl Into<String>, credential: Credential, policies: Vec<Policy>) -> Self {
        Self {
            username: username.into(),
            credential,
            policies,
        }
    }
}

/// Every configured user, keyed by username
///
/// Built once at startup and read-only afterwards.
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: HashMap<String, Arc<User>>,
}

impl UserDirectory {
    /// Build the directory from validated configuration
    pub fn from_config(config: &AuthzConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut directory = Self::default();
        for entry in &config.users {
            let credential = Credential::from_config(entry)
                .ok_or_else(|| ConfigError::MissingCredential(entry.username.clone()))?;
            let policies = entry.policies.iter().map(Policy::from_config).collect();
            directory.insert(User::new(entry.username.clone(), credential, policies))?;
        }

        Ok(directory)
    }

    /// Add a user. Usernames must be unique.
    pub fn insert(&mut self, user: User) -> Result<(), ConfigError> {
        if self.users.contains_key(&user.username) {
            return Err(ConfigError::DuplicateUser(user.username));
        }
        self.users.insert(user.username.clone(), Arc::new(user));
        Ok(())
    }

    pub fn get(&self, username: &str) -> Option<&Arc<User>> {
        self.users.get(username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn users(&self) -> impl Iterator<Item = &Arc<User>> {
        self.users.values()
    }

    /// Check a username/password pair
    pub fn authenticate(&self, username: &str, password: &str) -> AuthResult {
        let Some(user) = self.users.get(username) else {
            return AuthResult::Rejected(AuthFailure::UnknownIdentity);
        };

        if user.credential.verify(password) {
            AuthResult::Authenticated(Arc::clone(user))
        } else {
            AuthResult::Rejected(AuthFailure::BadCredential)
        }
    }
}
