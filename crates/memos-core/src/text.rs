//! Text helpers: flattening host message content and char-safe truncation.

use serde_json::Value;

/// Flatten a message `content` field into plain text.
///
/// Strings pass through. Block lists yield the space-joined `text` of every
/// `{"type": "text"}` block in order. Anything else is empty.
pub fn extract_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .map(|block| block.get("text").and_then(Value::as_str).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

/// Cut `text` to `max_chars` characters, appending `...` when anything was cut.
/// A limit of 0 disables truncation.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return text.to_string();
    }
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Cut `text` to at most `max_chars` characters without a marker.
pub fn take_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_plain_string() {
        assert_eq!(extract_text(&json!("hello")), "hello");
    }

    #[test]
    fn test_extract_text_blocks_only() {
        let content = json!([
            { "type": "text", "text": "first" },
            { "type": "image", "source": "..." },
            "stray",
            { "type": "text", "text": "second" },
        ]);
        assert_eq!(extract_text(&content), "first second");
    }

    #[test]
    fn test_extract_other_shapes() {
        assert_eq!(extract_text(&Value::Null), "");
        assert_eq!(extract_text(&json!({ "text": "x" })), "");
        assert_eq!(extract_text(&json!(42)), "");
        assert_eq!(extract_text(&json!([])), "");
    }

    #[test]
    fn test_truncate_boundaries() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
        assert_eq!(truncate("abcdef", 0), "abcdef");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        assert_eq!(truncate("日本語テキスト", 3), "日本語...");
        assert_eq!(truncate("héllo", 5), "héllo");
    }

    #[test]
    fn test_take_chars() {
        assert_eq!(take_chars("prefix:query", 6), "prefix");
        assert_eq!(take_chars("short", 100), "short");
        assert_eq!(take_chars("ünï", 2), "ün");
    }
}
