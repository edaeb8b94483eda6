/// Truncate a string at a valid UTF-8 character boundary.
///
/// Returns a slice of at most `max_bytes` bytes, ending at a valid char boundary.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Single-line preview of model output for logs and attempt reports.
pub fn preview(s: &str, max_bytes: usize) -> String {
    let flat = s.split_whitespace().collect::<Vec<_>>().join(" ");
    let cut = truncate_str(&flat, max_bytes);
    if cut.len() < flat.len() {
        format!("{}...", cut)
    } else {
        flat
    }
}

/// Case-insensitive ASCII prefix strip that never splits a multi-byte char.
pub fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 5), "hello");
    }

    #[test]
    fn test_truncate_multibyte() {
        // "é" is 2 bytes
        let s = "abé";
        assert_eq!(truncate_str(s, 3), "ab");
        assert_eq!(truncate_str(s, 4), "abé");
        assert_eq!(truncate_str("", 10), "");
    }

    #[test]
    fn test_preview_flattens_and_ellipsizes() {
        assert_eq!(preview("flowchart TD\n  A --> B", 100), "flowchart TD A --> B");
        assert_eq!(preview("abcdefgh", 4), "abcd...");
    }

    #[test]
    fn test_strip_prefix_ignore_case() {
        assert_eq!(strip_prefix_ignore_case("HERE is x", "here is"), Some(" x"));
        assert_eq!(strip_prefix_ignore_case("nope", "here is"), None);
        // "é" straddles byte 2; must not panic
        assert_eq!(strip_prefix_ignore_case("aé", "ab"), None);
    }
}
