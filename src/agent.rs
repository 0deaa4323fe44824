//! MQTT authorization agent
//!
//! The three broker hooks (connect, subscribe, publish) as plain decision
//! functions, plus an optional disconnect hook. Every call returns a
//! decision; bad input is a deny, never an error.

use crate::acl::{AclDecision, AclEvaluator};
use crate::auth::{AuthResult, ConnectReturnCode, User, UserDirectory};
use crate::config::{AuthzConfig, GeneralConfig};
use crate::session::{SessionRegistry, SessionStore};

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runtime switches taken from the general configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentOptions {
    /// Include the presented password in connect events
    pub log_credentials: bool,
    /// Remove the session binding on disconnect
    pub evict_on_disconnect: bool,
}

impl From<&GeneralConfig> for AgentOptions {
    fn from(general: &GeneralConfig) -> Self {
        Self {
            log_credentials: general.log_credentials,
            evict_on_disconnect: general.evict_on_disconnect,
        }
    }
}

/// Outcome of a CONNECT
#[derive(Debug, Clone)]
pub struct ConnectDecision {
    pub accepted: bool,
    pub user: Option<Arc<User>>,
    pub code: ConnectReturnCode,
}

impl From<AuthResult> for ConnectDecision {
    fn from(result: AuthResult) -> Self {
        let code = result.return_code();
        match result {
            AuthResult::Authenticated(user) => Self {
                accepted: true,
                user: Some(user),
                code,
            },
            AuthResult::Rejected(_) => Self {
                accepted: false,
                user: None,
                code,
            },
        }
    }
}

/// MQTT authorization agent
pub struct AuthzAgent {
    /// Configured users, read-only
    directory: Arc<UserDirectory>,
    /// Client id to user bindings
    sessions: Arc<dyn SessionStore>,
    /// Policy evaluator
    acl: AclEvaluator,
    options: AgentOptions,
}

impl AuthzAgent {
    /// Create an agent from its parts
    pub fn new(
        directory: Arc<UserDirectory>,
        sessions: Arc<dyn SessionStore>,
        options: AgentOptions,
    ) -> Self {
        Self {
            directory,
            sessions,
            acl: AclEvaluator::new(),
            options,
        }
    }

    /// Create an agent with an in-memory session registry
    pub fn with_config(config: &AuthzConfig) -> Result<Self> {
        let directory = UserDirectory::from_config(config)?;

        if config.general.precompile_patterns {
            let invalid = precompile(&directory);
            if invalid > 0 {
                warn!(invalid, "Some regex policies do not compile and will never match");
            }
        }

        info!(users = directory.len(), "User directory loaded");

        Ok(Self::new(
            Arc::new(directory),
            Arc::new(SessionRegistry::new()),
            AgentOptions::from(&config.general),
        ))
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    /// Handle CONNECT credential validation
    ///
    /// Binds the client id to the user on success and leaves the registry
    /// untouched on failure.
    pub fn on_connect(&self, client_id: &str, username: &str, password: &str) -> ConnectDecision {
        let result = self.directory.authenticate(username, password);

        match &result {
            AuthResult::Authenticated(user) => {
                self.sessions.bind(client_id, Arc::clone(user));
                if self.options.log_credentials {
                    info!(client_id, username, password, "CONNECT authenticated");
                } else {
                    info!(client_id, username, "CONNECT authenticated");
                }
            }
            AuthResult::Rejected(failure) => {
                let reason = failure.as_str();
                if self.options.log_credentials {
                    warn!(client_id, username, password, reason, "CONNECT rejected");
                } else {
                    warn!(client_id, username, reason, "CONNECT rejected");
                }
            }
        }

        ConnectDecision::from(result)
    }

    /// Handle SUBSCRIBE interception for one topic filter
    pub fn on_subscribe(&self, client_id: &str, topic_filter: &str) -> AclDecision {
        let Some(user) = self.sessions.lookup(client_id) else {
            warn!(client_id, topic = topic_filter, "SUBSCRIBE without authenticated session");
            return AclDecision::unbound_session();
        };

        let decision = self
            .acl
            .can_subscribe(client_id, &user.username, &user.policies, topic_filter);

        if decision.allowed {
            info!(
                client_id,
                username = %user.username,
                topic = topic_filter,
                policy = ?decision.policy,
                "SUBSCRIBE allowed"
            );
        } else {
            info!(
                client_id,
                username = %user.username,
                topic = topic_filter,
                reason = decision.reason.as_str(),
                "SUBSCRIBE denied"
            );
        }

        decision
    }

    /// Handle PUBLISH interception
    ///
    /// The payload is only logged by size; the decision depends on the topic alone.
    pub fn on_publish(&self, client_id: &str, topic: &str, payload: &[u8]) -> AclDecision {
        let Some(user) = self.sessions.lookup(client_id) else {
            warn!(client_id, topic, size = payload.len(), "PUBLISH without authenticated session");
            return AclDecision::unbound_session();
        };

        let decision = self
            .acl
            .can_publish(client_id, &user.username, &user.policies, topic);

        if decision.allowed {
            info!(
                client_id,
                username = %user.username,
                topic,
                size = payload.len(),
                policy = ?decision.policy,
                "PUBLISH allowed"
            );
        } else {
            info!(
                client_id,
                username = %user.username,
                topic,
                size = payload.len(),
                reason = decision.reason.as_str(),
                "PUBLISH denied"
            );
        }

        decision
    }

    /// Handle a disconnect notification
    ///
    /// Bindings are kept unless eviction is enabled. Returns true if a
    /// binding was removed.
    pub fn on_disconnect(&self, client_id: &str) -> bool {
        if !self.options.evict_on_disconnect {
            debug!(client_id, "DISCONNECT, session binding retained");
            return false;
        }

        let evicted = self.sessions.evict(client_id);
        debug!(client_id, evicted, "DISCONNECT, session binding evicted");
        evicted
    }
}

/// Compile every regex policy now. Returns how many failed.
fn precompile(directory: &UserDirectory) -> usize {
    directory
        .users()
        .flat_map(|user| user.policies.iter())
        .filter(|policy| !policy.pattern.precompile())
        .count()
}
