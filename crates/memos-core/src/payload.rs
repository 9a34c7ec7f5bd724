//! ============================================================================
//! Payload Builders - Request bodies for the MemOS Cloud API
//! ============================================================================
//! Pure functions of settings, selected messages, and resolved identity.
//! ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Settings;
use crate::text::take_chars;
use crate::types::{HookContext, WireMessage};

/// Marker stored in `info.source` for every captured turn
pub const INFO_SOURCE: &str = "openclaw";

/// Body of `POST /search/memory`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchRequest {
    pub user_id: String,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub filter: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub knowledgebase_ids: Vec<String>,
    pub memory_limit_number: u64,
    pub include_preference: bool,
    pub preference_limit_number: u64,
    pub include_tool_memory: bool,
    pub tool_memory_limit_number: u64,
}

/// Body of `POST /add/message`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddMessageRequest {
    pub user_id: String,
    pub conversation_id: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub info: Map<String, Value>,
    pub allow_public: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub allow_knowledgebase_ids: Vec<String>,
    pub async_mode: bool,
}

/// Build the recall request.
///
/// `conversation_id` is dropped when global recall is enabled so the search
/// spans every conversation of the user.
pub fn build_search_payload(settings: &Settings, prompt: &str, conversation_id: &str) -> SearchRequest {
    let raw_query = format!("{}{}", settings.query_prefix, prompt);
    let query = take_chars(&raw_query, settings.max_query_chars).to_string();

    SearchRequest {
        user_id: settings.user_id.clone(),
        query,
        conversation_id: (!settings.recall_global && !conversation_id.is_empty())
            .then(|| conversation_id.to_string()),
        filter: settings.filter.clone(),
        knowledgebase_ids: settings.knowledgebase_ids.clone(),
        memory_limit_number: settings.memory_limit_number,
        include_preference: settings.include_preference,
        preference_limit_number: settings.preference_limit_number,
        include_tool_memory: settings.include_tool_memory,
        tool_memory_limit_number: settings.tool_memory_limit_number,
    }
}

/// Build the capture request
pub fn build_add_payload(
    settings: &Settings,
    messages: Vec<WireMessage>,
    conversation_id: &str,
    ctx: &HookContext,
) -> AddMessageRequest {
    let mut info = Map::new();
    info.insert("source".to_string(), Value::from(INFO_SOURCE));
    if let Some(key) = ctx.session_key() {
        info.insert("sessionKey".to_string(), Value::from(key));
    }
    if let Some(agent) = ctx.agent_id() {
        info.insert("agentId".to_string(), Value::from(agent));
    }
    for (key, value) in &settings.info {
        info.insert(key.clone(), value.clone());
    }

    AddMessageRequest {
        user_id: settings.user_id.clone(),
        conversation_id: conversation_id.to_string(),
        messages,
        agent_id: settings.agent_id.clone(),
        app_id: settings.app_id.clone(),
        tags: settings.tags.clone(),
        info,
        allow_public: settings.allow_public,
        allow_knowledgebase_ids: settings.allow_knowledgebase_ids.clone(),
        async_mode: settings.async_mode,
    }
}
