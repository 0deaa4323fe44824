//! Access Control List (ACL) module
//!
//! Per-user topic policies and their evaluation for SUBSCRIBE and PUBLISH.

mod evaluator;
mod rules;

pub use evaluator::{evaluate_policies, AclEvaluator};
pub use rules::{AclDecision, AclReason, AclRequest, Policy};
