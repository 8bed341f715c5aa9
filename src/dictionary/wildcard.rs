use regex::Regex;

use crate::error::{IndexError, Result};

/// Literal text before the first wildcard of `pattern`
pub fn literal_prefix(pattern: &str) -> &str {
    match pattern.find(|c: char| c == '*' || c == '?') {
        Some(idx) => &pattern[..idx],
        None => pattern,
    }
}

/// Compile a `*`/`?` pattern into an anchored regex; `*` is any run of
/// characters and `?` is exactly one character.
pub fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let mut regex_pattern = String::with_capacity(pattern.len() + 2);
    regex_pattern.push('^');

    let mut buf = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '*' => regex_pattern.push_str(".*"),
            '?' => regex_pattern.push('.'),
            _ => regex_pattern.push_str(&regex::escape(ch.encode_utf8(&mut buf))),
        }
    }

    regex_pattern.push('$');

    Regex::new(&regex_pattern)
        .map_err(|e| IndexError::InvalidRequest(format!("Invalid wildcard pattern: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, text: &str) -> bool {
        wildcard_regex(pattern).unwrap().is_match(text)
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(literal_prefix("four*"), "four");
        assert_eq!(literal_prefix("f?ur"), "f");
        assert_eq!(literal_prefix("*play"), "");
        assert_eq!(literal_prefix("exact"), "exact");
    }

    #[test]
    fn test_wildcard_regex() {
        assert!(matches("four*", "fourplay"));
        assert!(matches("*play", "threeplay"));
        assert!(matches("t?st", "test"));
        assert!(matches("*e*e*", "threeplay"));
        assert!(matches("*", ""));
        assert!(!matches("t?st", "toast"));
        assert!(!matches("four", "fourplay"));
        assert!(matches("caf?", "café"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(matches("example.org", "example.org"));
        assert!(!matches("example.org", "examplexorg"));
        assert!(matches("a+b*", "a+bc"));
        assert!(matches("(x)", "(x)"));
        assert!(!matches("a+b", "aab"));
    }
}
