//! ============================================================================
//! Core Types - Host-facing events, messages, and errors
//! ============================================================================
//! Shapes exchanged with the agent runtime's lifecycle hooks plus the error
//! enum shared by every component of the plugin.
//! ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Host Messages
// ============================================================================

/// A message from the host's turn history.
///
/// `content` is kept as raw JSON because hosts send either a plain string or a
/// list of typed blocks; see [`crate::text::extract_text`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(default, deserialize_with = "lenient")]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Value,
}

impl Message {
    pub fn new(role: &str, content: impl Into<Value>) -> Self {
        Self {
            role: Some(role.to_string()),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<Value>) -> Self {
        Self::new(ROLE_USER, content)
    }

    pub fn assistant(content: impl Into<Value>) -> Self {
        Self::new(ROLE_ASSISTANT, content)
    }

    /// Messages of a host history array. Entries that are not objects are
    /// dropped; anything but an array is an empty history.
    pub fn history_from_value(value: Value) -> Vec<Message> {
        let Value::Array(items) = value else {
            return Vec::new();
        };
        items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()
    }
}

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// A normalized message as submitted to `/add/message`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

// ============================================================================
// Hook Context & Events
// ============================================================================

/// Per-invocation runtime context supplied by the host
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HookContext {
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
}

impl HookContext {
    pub fn with_session_key(session_key: &str) -> Self {
        Self {
            session_key: Some(session_key.to_string()),
            ..Default::default()
        }
    }

    /// Session key, ignoring empty strings
    pub fn session_key(&self) -> Option<&str> {
        non_empty(self.session_key.as_deref())
    }

    pub fn session_id(&self) -> Option<&str> {
        non_empty(self.session_id.as_deref())
    }

    pub fn agent_id(&self) -> Option<&str> {
        non_empty(self.agent_id.as_deref())
    }
}

/// Fired before the agent starts working on a user prompt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeforeAgentStartEvent {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Fired after the agent finished a turn
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentEndEvent {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "lenient_history")]
    pub messages: Vec<Message>,
}

/// A host command event (e.g. the user typed `/new`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEvent {
    pub action: String,
    #[serde(default)]
    pub session_key: Option<String>,
}

/// Command action that starts a fresh conversation
pub const COMMAND_NEW: &str = "new";

/// Value returned from the pre-turn hook; the host prepends it to the prompt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PrependContext {
    pub prepend_context: String,
}

// ============================================================================
// Errors
// ============================================================================

/// Error types for the plugin
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemosError {
    #[error("Missing {0}")]
    ConfigurationIncomplete(&'static str),

    #[error("Missing MEMOS API key (Token auth)")]
    AuthenticationMissing,

    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response body: {0}")]
    InvalidBody(String),
}

impl MemosError {
    /// Whether this failure came from an attempt on the wire (and is retried)
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            MemosError::Status { .. }
                | MemosError::Timeout(_)
                | MemosError::Network(_)
                | MemosError::InvalidBody(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MemosError>;

/// Deserialize a field, reading a value of the wrong JSON type as absent
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_history<'de, D>(deserializer: D) -> std::result::Result<Vec<Message>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Message::history_from_value)
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
