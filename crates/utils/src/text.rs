use std::sync::OnceLock;

use regex::Regex;

fn mention_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?:^|[\s(])@([A-Za-z0-9._+\-]+(?:@[A-Za-z0-9.\-]+\.[A-Za-z]{2,})?)").ok())
        .as_ref()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `@handle` tokens in a comment body, lowercased and deduplicated in order
/// of appearance. A handle is either a full email (`@ana@corp.io`) or an
/// email local part (`@ana`).
pub fn extract_mentions(content: &str) -> Vec<String> {
    let Some(pattern) = mention_pattern() else {
        return Vec::new();
    };
    let mut handles: Vec<String> = Vec::new();
    for capture in pattern.captures_iter(content) {
        let handle = capture[1].trim_end_matches('.').to_lowercase();
        if !handle.is_empty() && !handles.contains(&handle) {
            handles.push(handle);
        }
    }
    handles
}

/// Whether `handle` (from [`extract_mentions`]) refers to `email`.
pub fn mention_matches(handle: &str, email: &str) -> bool {
    let email = normalize_email(email);
    if handle.contains('@') {
        return email == handle;
    }
    email.split('@').next() == Some(handle)
}
