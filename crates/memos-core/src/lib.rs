//! ============================================================================
//! MEMOS-CORE: Conversational memory for agent lifecycle hooks
//! ============================================================================
//! Connects an agent runtime to MemOS Cloud:
//! - Recall: search memories before a turn and prepend them as context
//! - Capture: submit the turn's messages after the agent finishes
//! - Conversation identity from session context and per-session counters
//! - Retrying API client with per-attempt timeout and linear backoff
//!
//! ## Usage
//! ```rust,ignore
//! use memos_core::{register, PluginConfig};
//!
//! let config = PluginConfig::from_json(&host_plugin_config);
//! let plugin = register(&mut host, Some(&config));
//! ```
//! ============================================================================

pub mod client;
pub mod config;
pub mod formatter;
pub mod identity;
pub mod payload;
pub mod plugin;
pub mod selector;
pub mod text;
pub mod types;

// Re-export main types for convenience
pub use client::{HttpTransport, MemosClient, ReqwestTransport};
pub use config::{
    CaptureStrategy, EnvLookup, PluginConfig, ProcessEnv, SettingsFile, Settings, StaticEnv,
    SuffixMode,
};
pub use formatter::format_context_block;
pub use identity::{resolve_conversation_id, ConversationCounters};
pub use payload::{build_add_payload, build_search_payload, AddMessageRequest, SearchRequest};
pub use plugin::{register, CaptureOutcome, HookHandler, HookRegistry, MemosPlugin};
pub use selector::select_messages;
pub use text::extract_text;
pub use types::*;
