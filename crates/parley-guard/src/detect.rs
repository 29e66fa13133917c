use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use parley_types::models::{Flag, FlagType};

/// Matched values are cut to this many characters before they reach reports or audit rows.
pub const MAX_MATCHED_VALUE_CHARS: usize = 120;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9-]+(?:\.[a-z0-9-]+)*\.[a-z]{2,}\b")
        .expect("email pattern compiles")
});

// At least 8 digits, separated by any mix of spaces, dots, dashes and parentheses.
// Boundaries are part of the pattern, so a digit-led neighbour word is left out of the match.
static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+\s?)?\(?\b\d(?:[ \t().-]*\d){7,}\b").expect("phone pattern compiles")
});

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"']+"#).expect("url pattern compiles")
});

const URL_TRAILING: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}'];

/// Scan `body` for emails, phone numbers, URLs and sensitive words.
///
/// Results are deduplicated by `(type, normalized value)` and ordered by
/// type, then by first occurrence.
pub fn detect_flags<S: AsRef<str>>(body: &str, sensitive_words: &[S]) -> Vec<Flag> {
    let mut seen: HashSet<(FlagType, String)> = HashSet::new();
    let mut flags = Vec::new();
    let mut push = |flag_type: FlagType, raw: &str, normalized: String| {
        if seen.insert((flag_type, normalized)) {
            flags.push(Flag {
                flag_type,
                matched_value: truncate(raw),
            });
        }
    };

    for m in EMAIL.find_iter(body) {
        push(FlagType::Email, m.as_str(), m.as_str().to_lowercase());
    }

    for m in PHONE.find_iter(body) {
        let digits: String = m.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
        push(FlagType::Phone, m.as_str(), digits);
    }

    for m in URL.find_iter(body) {
        let url = m.as_str().trim_end_matches(URL_TRAILING);
        if url.is_empty() {
            continue;
        }
        push(FlagType::Url, url, url.to_lowercase());
    }

    let lowered = body.to_lowercase();
    for word in sensitive_words {
        let word = word.as_ref().trim().to_lowercase();
        if !word.is_empty() && lowered.contains(&word) {
            push(FlagType::Keyword, &word, word.clone());
        }
    }

    flags
}

fn truncate(value: &str) -> String {
    value.chars().take(MAX_MATCHED_VALUE_CHARS).collect()
}
