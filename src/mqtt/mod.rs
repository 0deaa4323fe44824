//! MQTT topic handling
//!
//! Topic patterns used by policies and the wildcard filter matcher behind them.

mod pattern;
mod topic;

pub use pattern::{MatchMode, TopicPattern};
pub use topic::TopicMatcher;
