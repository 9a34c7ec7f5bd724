//! ============================================================================
//! Conversation Identity - Remote conversation key resolution
//! ============================================================================
//! Precedence:
//! 1. explicit `conversationId` from settings, verbatim
//! 2. session key → session id → `agent:<agentId>` → `openclaw-<millis>`
//! 3. `#N` counter suffix (suffix mode `counter`, N > 0)
//! 4. configured prefix / suffix around the result
//! ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::{Settings, SuffixMode};
use crate::types::HookContext;

/// Resolve the conversation id for a request.
///
/// `counter` is the current value for the context's session key (0 when unset).
pub fn resolve_conversation_id(settings: &Settings, ctx: &HookContext, counter: u64) -> String {
    resolve_conversation_id_at(settings, ctx, counter, chrono::Utc::now().timestamp_millis())
}

/// Same as [`resolve_conversation_id`] with an explicit clock for the fallback id
pub fn resolve_conversation_id_at(
    settings: &Settings,
    ctx: &HookContext,
    counter: u64,
    now_millis: i64,
) -> String {
    if !settings.conversation_id.is_empty() {
        return settings.conversation_id.clone();
    }

    let base = if let Some(key) = ctx.session_key() {
        key.to_string()
    } else if let Some(id) = ctx.session_id() {
        id.to_string()
    } else if let Some(agent) = ctx.agent_id() {
        format!("agent:{}", agent)
    } else {
        format!("openclaw-{}", now_millis)
    };

    let counter_suffix = match settings.conversation_suffix_mode {
        SuffixMode::Counter if counter > 0 => format!("#{}", counter),
        _ => String::new(),
    };

    format!(
        "{}{}{}{}",
        settings.conversation_id_prefix, base, counter_suffix, settings.conversation_id_suffix
    )
}

/// Per-session "new conversation" counters, shared between hook handlers
#[derive(Debug, Clone, Default)]
pub struct ConversationCounters {
    inner: Arc<RwLock<HashMap<String, u64>>>,
}

impl ConversationCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter for `session_key` (0 when never incremented)
    pub async fn get(&self, session_key: Option<&str>) -> u64 {
        let Some(key) = session_key else {
            return 0;
        };
        self.inner.read().await.get(key).copied().unwrap_or(0)
    }

    /// Bump the counter for `session_key` and return the new value
    pub async fn increment(&self, session_key: &str) -> u64 {
        let mut counters = self.inner.write().await;
        let value = counters.entry(session_key.to_string()).or_insert(0);
        *value += 1;
        info!("Conversation counter for {} is now {}", session_key, value);
        *value
    }
}
