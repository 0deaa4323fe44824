//! MQTT topic filter matching with wildcards
//!
//! Used only by policies that opt into wildcard mode. Supports single-level
//! (`+`) and multi-level (`#`) wildcards as defined by MQTT 3.1.1 and 5.0.
//! A filter starting with a wildcard never reaches a `$`-prefixed topic.

/// Topic matcher for MQTT topic filters
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicMatcher;

impl TopicMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Check if a concrete topic name matches a topic filter
    ///
    /// # MQTT Wildcard Rules
    /// * `+` matches exactly one topic level
    /// * `#` matches the parent level and any number of child levels
    ///
    /// # Examples
    /// ```
    /// use mqtt_authz_agent::mqtt::TopicMatcher;
    ///
    /// let matcher = TopicMatcher::new();
    /// assert!(matcher.matches("home/kitchen/temp", "home/+/temp"));
    /// assert!(matcher.matches("home/kitchen/temp", "home/#"));
    /// assert!(!matcher.matches("home/kitchen", "home/+/temp"));
    /// assert!(!matcher.matches("$SYS/broker", "#"));
    /// ```
    pub fn matches(&self, topic: &str, filter: &str) -> bool {
        if !self.is_valid_topic(topic) || !self.is_valid_filter(filter) {
            return false;
        }
        if hides_system_topic(filter, topic) {
            return false;
        }

        let mut topic_levels = topic.split('/');
        let mut filter_levels = filter.split('/').peekable();

        while let Some(f_level) = filter_levels.next() {
            if f_level == "#" {
                return filter_levels.peek().is_none();
            }

            match topic_levels.next() {
                Some(t_level) if f_level == "+" || f_level == t_level => {}
                _ => return false,
            }
        }

        topic_levels.next().is_none()
    }

    /// Check if every topic a requested filter can match is also matched by
    /// the granting filter
    ///
    /// A wildcard in the request is only covered by the same or a broader
    /// wildcard in the grant: `home/+` covers `home/kitchen` and `home/+`,
    /// but not `home/#`.
    pub fn covers(&self, granted: &str, requested: &str) -> bool {
        if !self.is_valid_filter(granted) || !self.is_valid_filter(requested) {
            return false;
        }
        if hides_system_topic(granted, requested) {
            return false;
        }

        let mut requested_levels = requested.split('/');
        let mut granted_levels = granted.split('/').peekable();

        while let Some(g_level) = granted_levels.next() {
            if g_level == "#" {
                return granted_levels.peek().is_none();
            }

            match requested_levels.next() {
                Some("#") => return false,
                Some(_) if g_level == "+" => {}
                Some(r_level) if r_level == g_level && r_level != "+" => {}
                _ => return false,
            }
        }

        requested_levels.next().is_none()
    }

    /// Check if a topic filter is well formed
    ///
    /// `#` must be alone and last, and `+` must be alone in its level.
    /// Empty levels are allowed.
    pub fn is_valid_filter(&self, filter: &str) -> bool {
        if filter.is_empty() {
            return false;
        }

        let last = filter.split('/').count() - 1;
        filter.split('/').enumerate().all(|(i, level)| {
            (!level.contains('#') || (level == "#" && i == last))
                && (!level.contains('+') || level == "+")
        })
    }

    /// Check if a concrete topic name is well formed (non-empty, no wildcards)
    pub fn is_valid_topic(&self, topic: &str) -> bool {
        !topic.is_empty() && !topic.contains(['+', '#'])
    }
}

/// A leading `+` or `#` does not reach topics whose first level starts with `$`.
fn hides_system_topic(filter: &str, topic: &str) -> bool {
    topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_levels() {
        let matcher = TopicMatcher::new();
        assert!(matcher.matches("home/kitchen", "home/kitchen"));
        assert!(!matcher.matches("home/kitchen", "home/garage"));
        assert!(!matcher.matches("home/kitchen/temp", "home/kitchen"));
    }

    #[test]
    fn test_single_level_wildcard() {
        let matcher = TopicMatcher::new();

        assert!(matcher.matches("home/kitchen", "home/+"));
        assert!(matcher.matches("a/b/c", "a/+/c"));

        assert!(!matcher.matches("home", "home/+"));
        assert!(!matcher.matches("home/kitchen/temp", "home/+"));
    }

    #[test]
    fn test_multi_level_wildcard() {
        let matcher = TopicMatcher::new();

        assert!(matcher.matches("home", "home/#"));
        assert!(matcher.matches("home/kitchen/temp", "home/#"));
        assert!(matcher.matches("anything/at/all", "#"));
        assert!(matcher.matches("a/b/c/d", "a/+/#"));

        // # is only a wildcard in the last position
        assert!(!matcher.matches("a/b/c", "a/#/c"));
    }

    #[test]
    fn test_topic_with_wildcard_characters_never_matches() {
        let matcher = TopicMatcher::new();
        assert!(!matcher.matches("home/#", "home/+"));
        assert!(!matcher.matches("home/+", "#"));
    }

    #[test]
    fn test_system_topics() {
        let matcher = TopicMatcher::new();

        assert!(!matcher.matches("$SYS", "#"));
        assert!(!matcher.matches("$SYS/broker/clients", "#"));
        assert!(!matcher.matches("$SYS/broker", "+/broker"));
        assert!(matcher.matches("$SYS/broker", "$SYS/+"));
        assert!(matcher.matches("$SYS/broker/clients", "$SYS/#"));
    }

    #[test]
    fn test_empty_levels() {
        let matcher = TopicMatcher::new();
        assert!(matcher.matches("/home", "/+"));
        assert!(matcher.matches("a//b", "a/+/b"));
        assert!(!matcher.matches("a/b", "a//b"));
    }

    #[test]
    fn test_single_level_grant_does_not_cover_multi_level_request() {
        let matcher = TopicMatcher::new();

        assert!(!matcher.covers("home/+", "home/#"));
        assert!(!matcher.covers("home/+/temp", "home/#"));
        assert!(!matcher.covers("home/kitchen", "home/+"));
        assert!(!matcher.covers("home/#", "#"));
    }

    #[test]
    fn test_covers() {
        let matcher = TopicMatcher::new();

        assert!(matcher.covers("home/+", "home/kitchen"));
        assert!(matcher.covers("home/+", "home/+"));
        assert!(matcher.covers("home/#", "home/#"));
        assert!(matcher.covers("home/#", "home/+/temp"));
        assert!(matcher.covers("home/#", "home"));
        assert!(matcher.covers("#", "#"));
        assert!(matcher.covers("+/+", "+/kitchen"));

        assert!(!matcher.covers("home/+", "home/kitchen/temp"));
        assert!(!matcher.covers("home/+/temp", "home/+/humidity"));
    }

    #[test]
    fn test_covers_system_topics() {
        let matcher = TopicMatcher::new();

        assert!(!matcher.covers("#", "$SYS/#"));
        assert!(!matcher.covers("+/broker", "$SYS/broker"));
        assert!(matcher.covers("$SYS/#", "$SYS/broker/+"));
    }

    #[test]
    fn test_covers_rejects_malformed_request() {
        let matcher = TopicMatcher::new();

        assert!(!matcher.covers("#", "home/#/temp"));
        assert!(!matcher.covers("#", "home/kit+chen"));
        assert!(!matcher.covers("#", ""));
    }

    #[test]
    fn test_valid_filters() {
        let matcher = TopicMatcher::new();

        assert!(matcher.is_valid_filter("home/+/temp"));
        assert!(matcher.is_valid_filter("home/#"));
        assert!(matcher.is_valid_filter("#"));
        assert!(matcher.is_valid_filter("/home"));
        assert!(matcher.is_valid_filter("home//temp"));

        assert!(!matcher.is_valid_filter(""));
        assert!(!matcher.is_valid_filter("home/temp+1"));
        assert!(!matcher.is_valid_filter("home/#/temp"));
        assert!(!matcher.is_valid_filter("home/temp#"));
    }

    #[test]
    fn test_valid_topics() {
        let matcher = TopicMatcher::new();

        assert!(matcher.is_valid_topic("home/kitchen"));
        assert!(matcher.is_valid_topic("$SYS/broker/clients"));
        assert!(matcher.is_valid_topic("home//kitchen"));

        assert!(!matcher.is_valid_topic("home/+"));
        assert!(!matcher.is_valid_topic("home/#"));
        assert!(!matcher.is_valid_topic(""));
    }
}
