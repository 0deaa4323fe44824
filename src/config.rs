//! Configuration types for the MQTT authorization agent
//!
//! The configuration is a JSON document loaded once at startup. It names the
//! port the hook listener binds and every user with their topic policies.
//! Nothing here is reloaded while the agent runs.

use crate::mqtt::TopicMatcher;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// MQTT authorization agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthzConfig {
    /// Port the hook listener binds
    #[serde(default = "default_port")]
    pub port: u16,

    /// Configured users, each with an ordered policy list
    #[serde(default)]
    pub users: Vec<UserConfig>,

    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            users: Vec::new(),
            general: GeneralConfig::default(),
        }
    }
}

impl AuthzConfig {
    /// Read, parse and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Check structural invariants.
    ///
    /// Regex syntax is deliberately not checked here: a broken pattern only
    /// disables the policy that carries it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();

        for user in &self.users {
            if user.username.is_empty() {
                return Err(ConfigError::EmptyUsername);
            }
            if !seen.insert(user.username.as_str()) {
                return Err(ConfigError::DuplicateUser(user.username.clone()));
            }

            match (&user.password, &user.password_hash) {
                (Some(_), None) | (None, Some(_)) => {}
                (None, None) => return Err(ConfigError::MissingCredential(user.username.clone())),
                (Some(_), Some(_)) => {
                    return Err(ConfigError::AmbiguousCredential(user.username.clone()))
                }
            }

            for (index, policy) in user.policies.iter().enumerate() {
                if policy.topic.is_empty() {
                    return Err(ConfigError::EmptyTopic {
                        username: user.username.clone(),
                        index,
                    });
                }
                if policy.use_regex && policy.use_wildcards {
                    return Err(ConfigError::ConflictingMatchModes {
                        username: user.username.clone(),
                        index,
                    });
                }
                if policy.use_wildcards && !TopicMatcher::new().is_valid_filter(&policy.topic) {
                    return Err(ConfigError::InvalidFilter {
                        username: user.username.clone(),
                        index,
                        filter: policy.topic.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Structural configuration problems. All of them are fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("user entry with an empty username")]
    EmptyUsername,

    #[error("user '{0}' is configured more than once")]
    DuplicateUser(String),

    #[error("user '{0}' has neither a password nor a password hash")]
    MissingCredential(String),

    #[error("user '{0}' has both a password and a password hash")]
    AmbiguousCredential(String),

    #[error("policy {index} of user '{username}' has an empty topic")]
    EmptyTopic { username: String, index: usize },

    #[error("policy {index} of user '{username}' enables both regex and wildcard matching")]
    ConflictingMatchModes { username: String, index: usize },

    #[error("policy {index} of user '{username}' has a malformed topic filter '{filter}'")]
    InvalidFilter {
        username: String,
        index: usize,
        filter: String,
    },
}

// ============================================================================
// Users and Policies
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    /// Unique username
    pub username: String,

    /// Plaintext credential, compared exactly
    #[serde(default)]
    pub password: Option<String>,

    /// Bcrypt hash, used instead of `password` when present
    #[serde(default)]
    pub password_hash: Option<String>,

    /// Policies in evaluation order
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    /// Literal topic, regex source or MQTT filter depending on the flags below
    pub topic: String,

    /// Treat `topic` as an unanchored regular expression
    #[serde(default)]
    pub use_regex: bool,

    /// Treat `topic` as an MQTT filter with `+` and `#` wildcards
    #[serde(default)]
    pub use_wildcards: bool,

    /// Grants SUBSCRIBE on matching filters
    #[serde(default)]
    pub allow_subscription: bool,

    /// Grants PUBLISH on matching topics
    #[serde(default)]
    pub allow_publish: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MqttAction {
    Subscribe,
    Publish,
}

impl std::fmt::Display for MqttAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subscribe => f.write_str("subscribe"),
            Self::Publish => f.write_str("publish"),
        }
    }
}

// ============================================================================
// General Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralConfig {
    /// Address the hook listener binds
    pub bind_address: String,

    /// Include presented passwords in connect log events (verbose, sensitive)
    pub log_credentials: bool,

    /// Drop the session binding when the broker reports a disconnect
    pub evict_on_disconnect: bool,

    /// Compile every regex policy at startup instead of on first use
    pub precompile_patterns: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            log_credentials: false,
            evict_on_disconnect: false,
            precompile_patterns: false,
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_port() -> u16 {
    1883
}
