//! Policy evaluation for SUBSCRIBE and PUBLISH

use crate::config::MqttAction;
use tracing::{debug, trace};

use super::rules::{AclDecision, AclRequest, Policy};

/// Evaluates a user's policies against one topic
///
/// Only allow rules exist. Every policy is visited so each one shows up in
/// the trace log; the outcome is the logical OR of all of them, and anything
/// not granted is denied.
#[derive(Debug, Clone, Copy, Default)]
pub struct AclEvaluator;

impl AclEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate an ACL request
    pub fn evaluate(&self, request: &AclRequest<'_>) -> AclDecision {
        let decision = evaluate_policies(request.policies, request.action, request.topic);

        if !decision.allowed {
            debug!(
                client_id = %request.client_id,
                username = %request.username,
                action = %request.action,
                topic = %request.topic,
                policies = request.policies.len(),
                "No policy matched, default deny"
            );
        }

        decision
    }

    /// Check if a topic filter can be subscribed to
    pub fn can_subscribe(
        &self,
        client_id: &str,
        username: &str,
        policies: &[Policy],
        topic_filter: &str,
    ) -> AclDecision {
        self.evaluate(&AclRequest {
            client_id,
            username,
            policies,
            topic: topic_filter,
            action: MqttAction::Subscribe,
        })
    }

    /// Check if a topic can be published to
    pub fn can_publish(
        &self,
        client_id: &str,
        username: &str,
        policies: &[Policy],
        topic: &str,
    ) -> AclDecision {
        self.evaluate(&AclRequest {
            client_id,
            username,
            policies,
            topic,
            action: MqttAction::Publish,
        })
    }
}

/// Fold every policy into one decision
///
/// The result is the logical OR across all policies; the first granting
/// index is reported. No policy short-circuits the others.
pub fn evaluate_policies(policies: &[Policy], action: MqttAction, topic: &str) -> AclDecision {
    let granted_by = policies
        .iter()
        .enumerate()
        .fold(None, |first, (index, policy)| {
            let granted = policy.grants(action, topic);

            trace!(
                policy = index,
                pattern = %policy.pattern.source(),
                mode = ?policy.pattern.mode(),
                action = %action,
                topic,
                granted,
                "Policy evaluated"
            );

            first.or(granted.then_some(index))
        });

    match granted_by {
        Some(index) => AclDecision::allow(index),
        None => AclDecision::default_deny(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::AclReason;
    use crate::mqtt::TopicPattern;

    fn policies() -> Vec<Policy> {
        vec![
            Policy::new(TopicPattern::exact("home/#"), true, false),
            Policy::new(TopicPattern::regex("^sensors/"), true, true),
            Policy::new(TopicPattern::exact("alerts"), false, true),
        ]
    }

    #[test]
    fn test_subscribe_allowed_by_exact_policy() {
        let evaluator = AclEvaluator::new();
        let decision = evaluator.can_subscribe("c1", "alice", &policies(), "home/#");
        assert!(decision.allowed);
        assert_eq!(decision.policy, Some(0));
    }

    #[test]
    fn test_publish_flag_gates_publish() {
        let evaluator = AclEvaluator::new();
        let policies = policies();

        assert!(!evaluator.can_publish("c1", "alice", &policies, "home/#").allowed);
        assert!(evaluator.can_publish("c1", "alice", &policies, "alerts").allowed);
        assert!(!evaluator.can_subscribe("c1", "alice", &policies, "alerts").allowed);
    }

    #[test]
    fn test_first_granting_policy_is_reported() {
        let evaluator = AclEvaluator::new();
        let policies = vec![
            Policy::new(TopicPattern::exact("a/b"), false, true),
            Policy::new(TopicPattern::regex("b"), true, false),
            Policy::new(TopicPattern::regex("^a/"), true, false),
        ];

        let decision = evaluator.can_subscribe("c1", "bob", &policies, "a/b");
        assert!(decision.allowed);
        assert_eq!(decision.policy, Some(1));
    }

    #[test]
    fn test_empty_policies_deny_everything() {
        let evaluator = AclEvaluator::new();
        for topic in ["a", "home/#", "#", ""] {
            let decision = evaluator.can_subscribe("c1", "nobody", &[], topic);
            assert!(!decision.allowed);
            assert_eq!(decision.reason, AclReason::NoMatchingPolicy);
            assert!(!evaluator.can_publish("c1", "nobody", &[], topic).allowed);
        }
    }

    #[test]
    fn test_invalid_regex_does_not_block_other_policies() {
        let evaluator = AclEvaluator::new();
        let policies = vec![
            Policy::new(TopicPattern::regex("(broken"), true, true),
            Policy::new(TopicPattern::exact("ok/topic"), true, true),
        ];

        assert!(!evaluator.can_publish("c1", "u", &policies, "(broken").allowed);
        let decision = evaluator.can_publish("c1", "u", &policies, "ok/topic");
        assert!(decision.allowed);
        assert_eq!(decision.policy, Some(1));
    }

    #[test]
    fn test_evaluate_policies_is_logical_or() {
        let policies = policies();

        let decision = evaluate_policies(&policies, MqttAction::Publish, "sensors/temp");
        assert!(decision.allowed);
        assert_eq!(decision.policy, Some(1));

        let decision = evaluate_policies(&policies, MqttAction::Subscribe, "alerts");
        assert_eq!(decision, AclDecision::default_deny());
    }

    #[test]
    fn test_wildcard_policy_does_not_grant_broader_subscription() {
        let evaluator = AclEvaluator::new();
        let policies = vec![Policy::new(TopicPattern::wildcard("home/+"), true, false)];

        assert!(evaluator.can_subscribe("c1", "bob", &policies, "home/kitchen").allowed);
        assert!(!evaluator.can_subscribe("c1", "bob", &policies, "home/#").allowed);
    }
}
