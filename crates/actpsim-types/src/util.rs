/// Whether `s` has the shape of a SHA-256 content hash: exactly 64
/// hexadecimal characters. Deliverable hashes failing this are dropped
/// rather than stored.
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Truncate a string to a maximum number of characters
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect::<String>() + "...(truncated)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_shape() {
        assert!(is_sha256_hex(&"ab".repeat(32)));
        assert!(!is_sha256_hex("abcd"));
        assert!(!is_sha256_hex(&"g".repeat(64)));
        assert!(!is_sha256_hex(&"ab".repeat(33)));
    }

    #[test]
    fn test_truncate_short_string_untouched() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_marks_overflow() {
        assert_eq!(truncate("abcdef", 3), "abc...(truncated)");
    }
}
