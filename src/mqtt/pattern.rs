//! Topic patterns carried by policies
//!
//! A pattern is configured once and never changes. Regex patterns are compiled
//! on first use and the outcome, success or failure, is memoized for the
//! lifetime of the pattern.

use super::TopicMatcher;
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

/// How a pattern is compared against a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Byte-for-byte equality. `+` and `#` are ordinary characters.
    Exact,
    /// Unanchored regular expression search.
    Regex,
    /// MQTT filter semantics for `+` and `#`.
    Wildcard,
}

impl MatchMode {
    pub fn from_flags(use_regex: bool, use_wildcards: bool) -> Self {
        match (use_regex, use_wildcards) {
            (true, _) => Self::Regex,
            (false, true) => Self::Wildcard,
            (false, false) => Self::Exact,
        }
    }
}

/// A configured topic pattern
#[derive(Debug)]
pub struct TopicPattern {
    source: String,
    mode: MatchMode,
    /// `Some(None)` records a pattern that failed to compile.
    compiled: OnceLock<Option<Regex>>,
}

impl TopicPattern {
    pub fn new(source: impl Into<String>, mode: MatchMode) -> Self {
        Self {
            source: source.into(),
            mode,
            compiled: OnceLock::new(),
        }
    }

    pub fn exact(source: impl Into<String>) -> Self {
        Self::new(source, MatchMode::Exact)
    }

    pub fn regex(source: impl Into<String>) -> Self {
        Self::new(source, MatchMode::Regex)
    }

    pub fn wildcard(source: impl Into<String>) -> Self {
        Self::new(source, MatchMode::Wildcard)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Check a concrete topic name (a PUBLISH target) against this pattern.
    ///
    /// Never fails: a regex that does not compile matches nothing.
    pub fn matches(&self, topic: &str) -> bool {
        match self.mode {
            MatchMode::Exact => self.source == topic,
            MatchMode::Regex => self.compiled().is_some_and(|re| re.is_match(topic)),
            MatchMode::Wildcard => TopicMatcher::new().matches(topic, &self.source),
        }
    }

    /// Check a SUBSCRIBE filter against this pattern.
    ///
    /// Exact and regex patterns treat the filter as a plain string. A wildcard
    /// pattern must cover every topic the requested filter could match.
    pub fn matches_filter(&self, filter: &str) -> bool {
        match self.mode {
            MatchMode::Exact | MatchMode::Regex => self.matches(filter),
            MatchMode::Wildcard => TopicMatcher::new().covers(&self.source, filter),
        }
    }

    /// Force compilation now. Returns false for a regex that does not compile.
    pub fn precompile(&self) -> bool {
        match self.mode {
            MatchMode::Regex => self.compiled().is_some(),
            MatchMode::Exact | MatchMode::Wildcard => true,
        }
    }

    fn compiled(&self) -> Option<&Regex> {
        self.compiled
            .get_or_init(|| match Regex::new(&self.source) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(
                        pattern = %self.source,
                        error = %e,
                        "Invalid topic regex, policy will never match"
                    );
                    None
                }
            })
            .as_ref()
    }
}

impl Clone for TopicPattern {
    /// Clones the configured pattern; the compiled form is rebuilt on demand.
    fn clone(&self) -> Self {
        Self::new(self.source.clone(), self.mode)
    }
}

impl PartialEq for TopicPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.mode == other.mode
    }
}

impl Eq for TopicPattern {}
