//! Policy types and decision results

use crate::config::{MqttAction, PolicyConfig};
use crate::mqtt::{MatchMode, TopicPattern};

/// A single allow rule owned by a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub pattern: TopicPattern,
    pub allow_subscribe: bool,
    pub allow_publish: bool,
}

impl Policy {
    pub fn new(pattern: TopicPattern, allow_subscribe: bool, allow_publish: bool) -> Self {
        Self {
            pattern,
            allow_subscribe,
            allow_publish,
        }
    }

    /// Build a policy from configuration
    pub fn from_config(config: &PolicyConfig) -> Self {
        let mode = MatchMode::from_flags(config.use_regex, config.use_wildcards);
        Self::new(
            TopicPattern::new(config.topic.clone(), mode),
            config.allow_subscription,
            config.allow_publish,
        )
    }

    /// Whether this policy grants the action at all, regardless of topic
    pub fn permits(&self, action: MqttAction) -> bool {
        match action {
            MqttAction::Subscribe => self.allow_subscribe,
            MqttAction::Publish => self.allow_publish,
        }
    }

    /// Whether this policy grants the action on the topic. For SUBSCRIBE the
    /// topic is the requested filter.
    pub fn grants(&self, action: MqttAction, topic: &str) -> bool {
        self.permits(action)
            && match action {
                MqttAction::Subscribe => self.pattern.matches_filter(topic),
                MqttAction::Publish => self.pattern.matches(topic),
            }
    }
}

/// ACL evaluation request
#[derive(Debug, Clone, Copy)]
pub struct AclRequest<'a> {
    pub client_id: &'a str,
    pub username: &'a str,
    pub policies: &'a [Policy],
    /// Subscription filter or publish target
    pub topic: &'a str,
    pub action: MqttAction,
}

/// Why a subscribe or publish was decided the way it was
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclReason {
    Allowed,
    /// No successful CONNECT is bound to the client id
    UnboundSession,
    /// Authenticated, but no policy grants the action on the topic
    NoMatchingPolicy,
}

impl AclReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::UnboundSession => "unbound-session",
            Self::NoMatchingPolicy => "no-matching-policy",
        }
    }
}

/// Result of ACL evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclDecision {
    pub allowed: bool,
    /// Index of the first policy that granted access
    pub policy: Option<usize>,
    pub reason: AclReason,
}

impl AclDecision {
    pub fn allow(policy: usize) -> Self {
        Self {
            allowed: true,
            policy: Some(policy),
            reason: AclReason::Allowed,
        }
    }

    pub fn unbound_session() -> Self {
        Self {
            allowed: false,
            policy: None,
            reason: AclReason::UnboundSession,
        }
    }

    pub fn default_deny() -> Self {
        Self {
            allowed: false,
            policy: None,
            reason: AclReason::NoMatchingPolicy,
        }
    }
}
