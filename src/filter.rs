use tracing::debug;

// Topic phrases that disqualify a candidate before any paid rewrite work
// happens. Substring matching, not intent classification, so false
// positives are expected.
const DENY_LIST: &[&str] = &[
    "war",
    "terror",
    "shooting",
    "murder",
    "hostage",
    "kidnap",
    "fatal crash",
    "plane crash",
    "earthquake",
    "hurricane",
    "wildfire",
    "flood",
    "pandemic",
    "outbreak",
    "disease",
    "death toll",
    "missing person",
    "assault",
    "protest",
    "riot",
];

/// Screens candidate items against a deny-list of topic phrases.
pub struct TopicFilter {
    deny_list: Vec<String>,
}

impl TopicFilter {
    pub fn new() -> Self {
        Self {
            deny_list: DENY_LIST.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the built-in deny-list, for sites with their own editorial
    /// policy.
    pub fn with_deny_list(phrases: Vec<String>) -> Self {
        Self {
            deny_list: phrases.into_iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// Case-insensitive substring check, short-circuiting on the first hit.
    /// No side effects.
    pub fn is_sensitive(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        for phrase in &self.deny_list {
            if haystack.contains(phrase.as_str()) {
                debug!("Sensitive phrase matched: {:?}", phrase);
                return true;
            }
        }
        false
    }
}

impl Default for TopicFilter {
    fn default() -> Self {
        Self::new()
    }
}
