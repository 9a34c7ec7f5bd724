//! ============================================================================
//! Context Formatter - Search response → prompt context block
//! ============================================================================
//! The result object has moved around between API revisions, so it is located
//! by checking candidate paths in order. Output layout:
//!
//! ```text
//! Facts:
//! - <memory_value | memory_key>
//! Preferences:
//! - (<preference_type>) <preference>
//! Tool Memories:
//! - <tool_value>
//! Preference Note: <preference_note>
//! ```
//! ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::text::truncate;

/// Per-item cap used for injected recall context
pub const DEFAULT_MAX_ITEM_CHARS: usize = 200;

/// Candidate locations of the result object, checked in order
const RESULT_PATHS: &[&str] = &["/data", "/data/data", "/data/result", "/data/data/data"];

const RESULT_KEYS: &[&str] = &[
    "memory_detail_list",
    "preference_detail_list",
    "tool_memory_detail_list",
    "preference_note",
];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MemoryDetail {
    memory_key: Option<String>,
    memory_value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PreferenceDetail {
    preference: Option<String>,
    preference_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ToolMemoryDetail {
    tool_value: Option<String>,
}

/// Locate the result object inside a search response
pub fn locate_result(response: &Value) -> Option<&Value> {
    RESULT_PATHS
        .iter()
        .filter_map(|path| response.pointer(path))
        .find(|candidate| {
            candidate
                .as_object()
                .is_some_and(|obj| RESULT_KEYS.iter().any(|key| obj.contains_key(*key)))
        })
}

/// Render a search response; empty when there is nothing worth injecting
pub fn format_context_block(response: Option<&Value>, max_item_chars: usize) -> String {
    let Some(result) = response.and_then(locate_result) else {
        return String::new();
    };

    let mut lines = Vec::new();

    let facts: Vec<String> = records::<MemoryDetail>(result, "memory_detail_list")
        .into_iter()
        .filter_map(|m| first_non_empty(m.memory_value, m.memory_key))
        .map(|text| format!("- {}", truncate(&text, max_item_chars)))
        .collect();
    push_section(&mut lines, "Facts:", facts);

    let preferences: Vec<String> = records::<PreferenceDetail>(result, "preference_detail_list")
        .into_iter()
        .filter_map(|p| {
            let pref = p.preference.filter(|s| !s.is_empty())?;
            let kind = p
                .preference_type
                .filter(|s| !s.is_empty())
                .map(|t| format!("({}) ", t))
                .unwrap_or_default();
            Some(format!("- {}{}", kind, truncate(&pref, max_item_chars)))
        })
        .collect();
    push_section(&mut lines, "Preferences:", preferences);

    let tools: Vec<String> = records::<ToolMemoryDetail>(result, "tool_memory_detail_list")
        .into_iter()
        .filter_map(|t| t.tool_value.filter(|s| !s.is_empty()))
        .map(|value| format!("- {}", truncate(&value, max_item_chars)))
        .collect();
    push_section(&mut lines, "Tool Memories:", tools);

    if let Some(note) = result
        .get("preference_note")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
    {
        lines.push(format!("Preference Note: {}", truncate(note, max_item_chars)));
    }

    lines.join("\n")
}

/// Wrap a formatted block into the text prepended to the user prompt
pub fn wrap_recall_context(block: &str) -> String {
    format!(
        "<user_memory_context>\nRelevant memories from MemOS Cloud:\n{}\n</user_memory_context>",
        block
    )
}

/// Entries of `key` that look like records; anything else is skipped
fn records<T: for<'de> Deserialize<'de>>(result: &Value, key: &str) -> Vec<T> {
    result
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.is_object())
                .filter_map(|item| T::deserialize(item).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn first_non_empty(primary: Option<String>, secondary: Option<String>) -> Option<String> {
    primary
        .filter(|s| !s.is_empty())
        .or_else(|| secondary.filter(|s| !s.is_empty()))
}

fn push_section(lines: &mut Vec<String>, header: &str, entries: Vec<String>) {
    if entries.is_empty() {
        return;
    }
    lines.push(header.to_string());
    lines.extend(entries);
}
