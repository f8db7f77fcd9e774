// src/memory/trigger.rs
// Lightweight regex classifier deciding whether a user utterance is worth
// spending a model call on extraction for.

use lazy_static::lazy_static;
use regex::RegexSet;

lazy_static! {
    static ref SIGNAL_PATTERNS: RegexSet = RegexSet::new([
        // identity
        r"(?i)\bmy name is\b",
        r"(?i)\bi am a[n]?\b",
        r"(?i)我叫",
        r"(?i)我是",
        // preference
        r"(?i)\bi (like|love|hate|prefer|dislike)\b",
        r"(?i)喜欢",
        r"(?i)不喜欢",
        // long-term habit / background
        r"(?i)\bi (always|usually|never|work as|work at|live in|grew up)\b",
        r"(?i)住在",
        r"(?i)搬到",
        // explicit memory request
        r"(?i)\bremember (that|this)\b",
        r"(?i)记住",
        // personal info
        r"(?i)\bmy (birthday|email|phone|address) is\b",
    ])
    .expect("trigger heuristic patterns must compile");
}

/// Returns true when the utterance matches at least one key-signal pattern.
/// The orchestrator may gate `ProcessConversation` on this to avoid spending
/// model calls on substance-free turns; when unused, extraction runs on every
/// turn.
pub fn has_memory_signal(utterance: &str) -> bool {
    SIGNAL_PATTERNS.is_match(utterance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_identity_statements() {
        assert!(has_memory_signal("我叫张三，是一名工程师"));
        assert!(has_memory_signal("My name is Alice"));
    }

    #[test]
    fn detects_preference_statements() {
        assert!(has_memory_signal("我喜欢喝咖啡"));
        assert!(has_memory_signal("I love hiking"));
    }

    #[test]
    fn substance_free_turns_do_not_match() {
        assert!(!has_memory_signal("what's the weather like today?"));
        assert!(!has_memory_signal("ok thanks"));
    }
}
