//! Message selection for capture: which messages of a turn get submitted.

use crate::config::{CaptureStrategy, Settings};
use crate::text::{extract_text, truncate};
use crate::types::{Message, WireMessage, ROLE_ASSISTANT, ROLE_USER};

/// Pick, normalize and truncate the messages to submit for this turn
pub fn select_messages(messages: &[Message], settings: &Settings) -> Vec<WireMessage> {
    let window = match settings.capture_strategy {
        CaptureStrategy::FullSession => messages,
        CaptureStrategy::LastTurn => {
            let last_user = messages
                .iter()
                .rposition(|m| m.role.as_deref() == Some(ROLE_USER));
            match last_user {
                Some(idx) => &messages[idx..],
                None => return Vec::new(),
            }
        }
    };

    window
        .iter()
        .filter_map(|msg| normalize(msg, settings))
        .collect()
}

fn normalize(msg: &Message, settings: &Settings) -> Option<WireMessage> {
    let role = msg.role.as_deref()?;
    let keep = role == ROLE_USER || (role == ROLE_ASSISTANT && settings.include_assistant);
    if !keep {
        return None;
    }

    let text = extract_text(&msg.content);
    if text.is_empty() {
        return None;
    }

    Some(WireMessage {
        role: role.to_string(),
        content: truncate(&text, settings.max_message_chars),
    })
}
