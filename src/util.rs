//! Small string helpers shared by the gateway and the executor relay.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Works on character boundaries, so multi-byte UTF-8 output from tools
/// (box drawing, CJK, emoji) never panics when cut for a log line.
///
/// # Examples
/// ```ignore
/// use toolgate::util::truncate_with_ellipsis;
///
/// assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
/// assert_eq!(truncate_with_ellipsis("hello world", 5), "hello...");
/// assert_eq!(truncate_with_ellipsis("Hello 🦀 World", 8), "Hello 🦀...");
/// ```
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// True when `value` is empty or only whitespace.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
