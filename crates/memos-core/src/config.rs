//! ============================================================================
//! Config Resolver - Explicit config + environment + defaults
//! ============================================================================
//! Every option is resolved in the same order:
//! 1. explicit plugin config value (when present and non-empty)
//! 2. `MEMOS_*` key from the process environment, then `~/.openclaw/.env`
//! 3. built-in default
//!
//! Resolution never fails; malformed values fall through to the next source.
//! ============================================================================

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::types::{lenient, MemosError};

/// Default MemOS Cloud endpoint
pub const DEFAULT_BASE_URL: &str = "https://memos.memtensor.cn/api/openmem/v1";

/// User id used when none is configured
pub const DEFAULT_USER_ID: &str = "openclaw-user";

/// Default cap for query and message lengths (chars)
pub const DEFAULT_MAX_CHARS: usize = 2000;

/// Default per-kind recall limit
pub const DEFAULT_RECALL_LIMIT: u64 = 6;

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_RETRIES: u32 = 1;

// ============================================================================
// Explicit Plugin Config
// ============================================================================

/// A loosely-typed scalar as hosts send it: `true`, `3`, or `"yes"`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            Scalar::Number(n) => match n.as_u64() {
                Some(1) => Some(true),
                Some(0) => Some(false),
                _ => None,
            },
            Scalar::Text(s) => parse_bool(s),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Scalar::Bool(_) => None,
            Scalar::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            }),
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        Scalar::Number(value.into())
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

/// Plugin config as supplied by the host (camelCase JSON).
///
/// A field of the wrong JSON type reads as absent, so it falls through to the
/// environment or the default instead of rejecting the whole object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginConfig {
    #[serde(deserialize_with = "lenient")]
    pub base_url: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub api_key: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub user_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub conversation_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub conversation_id_prefix: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub conversation_id_suffix: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub conversation_suffix_mode: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub recall_global: Option<Scalar>,
    #[serde(deserialize_with = "lenient")]
    pub reset_on_new: Option<Scalar>,
    #[serde(deserialize_with = "lenient")]
    pub query_prefix: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub max_query_chars: Option<Scalar>,
    #[serde(deserialize_with = "lenient")]
    pub recall_enabled: Option<Scalar>,
    #[serde(deserialize_with = "lenient")]
    pub add_enabled: Option<Scalar>,
    #[serde(deserialize_with = "lenient")]
    pub capture_strategy: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub max_message_chars: Option<Scalar>,
    #[serde(deserialize_with = "lenient")]
    pub include_assistant: Option<Scalar>,
    #[serde(deserialize_with = "lenient")]
    pub memory_limit_number: Option<Scalar>,
    #[serde(deserialize_with = "lenient")]
    pub preference_limit_number: Option<Scalar>,
    #[serde(deserialize_with = "lenient")]
    pub include_preference: Option<Scalar>,
    #[serde(deserialize_with = "lenient")]
    pub include_tool_memory: Option<Scalar>,
    #[serde(deserialize_with = "lenient")]
    pub tool_memory_limit_number: Option<Scalar>,
    pub filter: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    pub knowledgebase_ids: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient")]
    pub tags: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient")]
    pub info: Option<Map<String, Value>>,
    #[serde(deserialize_with = "lenient")]
    pub agent_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub app_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub allow_public: Option<Scalar>,
    #[serde(deserialize_with = "lenient")]
    pub allow_knowledgebase_ids: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient")]
    pub async_mode: Option<Scalar>,
    #[serde(deserialize_with = "lenient")]
    pub timeout_ms: Option<Scalar>,
    #[serde(deserialize_with = "lenient")]
    pub retries: Option<Scalar>,
    #[serde(deserialize_with = "lenient")]
    pub throttle_ms: Option<Scalar>,
}

impl PluginConfig {
    /// Parse the host's plugin config object; anything but an object means
    /// "nothing explicit".
    pub fn from_json(value: &Value) -> Self {
        if !value.is_object() {
            if !value.is_null() {
                warn!("Plugin config is not an object; using environment and defaults");
            }
            return Self::default();
        }
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

// ============================================================================
// Environment Lookup
// ============================================================================

/// Ordered key lookup backing the second resolution step
pub trait EnvLookup: Send + Sync {
    /// Raw value for `key`, if any source has a non-empty one
    fn get(&self, key: &str) -> Option<String>;

    /// Whether the settings file could not be read
    fn settings_file_missing(&self) -> bool {
        false
    }
}

/// Parsed `KEY=value` settings file
#[derive(Debug, Clone, Default)]
pub struct SettingsFile {
    path: Option<PathBuf>,
    vars: HashMap<String, String>,
    missing: bool,
}

impl SettingsFile {
    /// Default location: `~/.openclaw/.env`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".openclaw").join(".env"))
    }

    /// Read and parse `path`. An unreadable file yields an empty, missing file.
    ///
    /// Unquoted and double-quoted values expand `$VAR`; single-quote a value
    /// that must stay literal.
    pub fn load(path: &Path) -> Self {
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(e) => {
                debug!("Settings file {} not loaded: {}", path.display(), e);
                return Self::missing_at(Some(path.to_path_buf()));
            }
        };

        let mut vars = HashMap::new();
        for item in iter {
            match item {
                Ok((key, value)) => {
                    vars.insert(key, value);
                }
                Err(e) => debug!("Skipping malformed line in {}: {}", path.display(), e),
            }
        }

        debug!("Loaded {} keys from {}", vars.len(), path.display());
        Self {
            path: Some(path.to_path_buf()),
            vars,
            missing: false,
        }
    }

    fn missing_at(path: Option<PathBuf>) -> Self {
        Self {
            path,
            vars: HashMap::new(),
            missing: true,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_missing(&self) -> bool {
        self.missing
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

/// The settings file at the default path, read at most once per process
static DEFAULT_SETTINGS_FILE: Lazy<Arc<SettingsFile>> = Lazy::new(|| {
    Arc::new(match SettingsFile::default_path() {
        Some(path) => SettingsFile::load(&path),
        None => SettingsFile::missing_at(None),
    })
});

/// Process environment first, then the settings file
#[derive(Debug, Clone)]
pub struct ProcessEnv {
    file: Arc<SettingsFile>,
}

impl ProcessEnv {
    /// Use the cached default settings file
    pub fn new() -> Self {
        Self {
            file: DEFAULT_SETTINGS_FILE.clone(),
        }
    }

    /// Use an explicitly loaded settings file instead of the default one
    pub fn with_file(file: SettingsFile) -> Self {
        Self {
            file: Arc::new(file),
        }
    }

    pub fn settings_file(&self) -> &SettingsFile {
        &self.file
    }
}

impl Default for ProcessEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvLookup for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        if let Ok(value) = std::env::var(key) {
            if !value.is_empty() {
                return Some(value);
            }
        }
        self.file
            .get(key)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn settings_file_missing(&self) -> bool {
        self.file.is_missing()
    }
}

/// Fixed in-memory lookup, for embedding hosts and tests
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    vars: HashMap<String, String>,
    file_missing: bool,
}

impl StaticEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_file_missing(mut self, missing: bool) -> Self {
        self.file_missing = missing;
        self
    }
}

impl EnvLookup for StaticEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).filter(|v| !v.is_empty()).cloned()
    }

    fn settings_file_missing(&self) -> bool {
        self.file_missing
    }
}

// ============================================================================
// Settings
// ============================================================================

/// How the conversation id is suffixed per session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuffixMode {
    #[default]
    None,
    Counter,
}

impl FromStr for SuffixMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(SuffixMode::None),
            "counter" => Ok(SuffixMode::Counter),
            _ => Err(format!("Unknown conversation suffix mode: {}", s)),
        }
    }
}

/// Which part of the turn history gets captured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStrategy {
    #[default]
    LastTurn,
    FullSession,
}

impl FromStr for CaptureStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "last_turn" => Ok(CaptureStrategy::LastTurn),
            "full_session" => Ok(CaptureStrategy::FullSession),
            _ => Err(format!("Unknown capture strategy: {}", s)),
        }
    }
}

/// Fully resolved, immutable plugin settings
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Settings {
    // Service
    pub base_url: String,
    pub api_key: String,
    pub user_id: String,

    // Conversation identity
    pub conversation_id: String,
    pub conversation_id_prefix: String,
    pub conversation_id_suffix: String,
    pub conversation_suffix_mode: SuffixMode,
    pub reset_on_new: bool,
    pub recall_global: bool,

    // Recall
    pub recall_enabled: bool,
    pub query_prefix: String,
    pub max_query_chars: usize,
    pub memory_limit_number: u64,
    pub include_preference: bool,
    pub preference_limit_number: u64,
    pub include_tool_memory: bool,
    pub tool_memory_limit_number: u64,
    pub filter: Option<Value>,
    pub knowledgebase_ids: Vec<String>,

    // Capture
    pub add_enabled: bool,
    pub capture_strategy: CaptureStrategy,
    pub max_message_chars: usize,
    pub include_assistant: bool,
    pub agent_id: Option<String>,
    pub app_id: Option<String>,
    pub tags: Vec<String>,
    pub info: Map<String, Value>,
    pub allow_public: bool,
    pub allow_knowledgebase_ids: Vec<String>,
    pub async_mode: bool,

    // Operational
    pub timeout_ms: u64,
    pub retries: u32,
    pub throttle_ms: u64,

    /// `~/.openclaw/.env` could not be read (diagnostics only)
    pub env_file_missing: bool,
}

impl Settings {
    /// Resolve settings against the process environment and default settings file
    pub fn resolve(explicit: Option<&PluginConfig>) -> Self {
        Self::resolve_with(explicit, &ProcessEnv::new())
    }

    /// Resolve settings against any [`EnvLookup`]
    pub fn resolve_with(explicit: Option<&PluginConfig>, env: &dyn EnvLookup) -> Self {
        let fallback = PluginConfig::default();
        let cfg = explicit.unwrap_or(&fallback);
        let r = Resolver { env };

        let base_url = r
            .string(cfg.base_url.as_ref(), "MEMOS_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let max_query_chars = match r.number(cfg.max_query_chars.as_ref(), "MEMOS_MAX_QUERY_CHARS") {
            Some(0) | None => DEFAULT_MAX_CHARS,
            Some(n) => n as usize,
        };

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: r
                .string(cfg.api_key.as_ref(), "MEMOS_API_KEY")
                .unwrap_or_default(),
            user_id: r
                .string(cfg.user_id.as_ref(), "MEMOS_USER_ID")
                .unwrap_or_else(|| DEFAULT_USER_ID.to_string()),

            conversation_id: r
                .string(cfg.conversation_id.as_ref(), "MEMOS_CONVERSATION_ID")
                .unwrap_or_default(),
            conversation_id_prefix: r
                .string(cfg.conversation_id_prefix.as_ref(), "MEMOS_CONVERSATION_PREFIX")
                .unwrap_or_default(),
            conversation_id_suffix: r
                .string(cfg.conversation_id_suffix.as_ref(), "MEMOS_CONVERSATION_SUFFIX")
                .unwrap_or_default(),
            conversation_suffix_mode: r.parsed(
                cfg.conversation_suffix_mode.as_ref(),
                "MEMOS_CONVERSATION_SUFFIX_MODE",
            ),
            reset_on_new: r.flag(cfg.reset_on_new.as_ref(), "MEMOS_CONVERSATION_RESET_ON_NEW", true),
            recall_global: r.flag(cfg.recall_global.as_ref(), "MEMOS_RECALL_GLOBAL", true),

            recall_enabled: r.flag(cfg.recall_enabled.as_ref(), "MEMOS_RECALL_ENABLED", true),
            query_prefix: r
                .string(cfg.query_prefix.as_ref(), "MEMOS_QUERY_PREFIX")
                .unwrap_or_default(),
            max_query_chars,
            memory_limit_number: r
                .number(cfg.memory_limit_number.as_ref(), "MEMOS_MEMORY_LIMIT_NUMBER")
                .unwrap_or(DEFAULT_RECALL_LIMIT),
            include_preference: r.flag(cfg.include_preference.as_ref(), "MEMOS_INCLUDE_PREFERENCE", true),
            preference_limit_number: r
                .number(cfg.preference_limit_number.as_ref(), "MEMOS_PREFERENCE_LIMIT_NUMBER")
                .unwrap_or(DEFAULT_RECALL_LIMIT),
            include_tool_memory: r.flag(cfg.include_tool_memory.as_ref(), "MEMOS_INCLUDE_TOOL_MEMORY", false),
            tool_memory_limit_number: r
                .number(cfg.tool_memory_limit_number.as_ref(), "MEMOS_TOOL_MEMORY_LIMIT_NUMBER")
                .unwrap_or(DEFAULT_RECALL_LIMIT),
            filter: r.json(cfg.filter.as_ref(), "MEMOS_FILTER"),
            knowledgebase_ids: r
                .list(cfg.knowledgebase_ids.as_ref(), "MEMOS_KNOWLEDGEBASE_IDS")
                .unwrap_or_default(),

            add_enabled: r.flag(cfg.add_enabled.as_ref(), "MEMOS_ADD_ENABLED", true),
            capture_strategy: r.parsed(cfg.capture_strategy.as_ref(), "MEMOS_CAPTURE_STRATEGY"),
            max_message_chars: r
                .number(cfg.max_message_chars.as_ref(), "MEMOS_MAX_MESSAGE_CHARS")
                .map(|n| n as usize)
                .unwrap_or(DEFAULT_MAX_CHARS),
            include_assistant: r.flag(cfg.include_assistant.as_ref(), "MEMOS_INCLUDE_ASSISTANT", true),
            agent_id: r.string(cfg.agent_id.as_ref(), "MEMOS_AGENT_ID"),
            app_id: r.string(cfg.app_id.as_ref(), "MEMOS_APP_ID"),
            tags: r
                .list(cfg.tags.as_ref(), "MEMOS_TAGS")
                .unwrap_or_else(|| vec!["openclaw".to_string()]),
            info: r
                .json(cfg.info.clone().map(Value::Object).as_ref(), "MEMOS_INFO")
                .and_then(|v| match v {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .unwrap_or_default(),
            allow_public: r.flag(cfg.allow_public.as_ref(), "MEMOS_ALLOW_PUBLIC", false),
            allow_knowledgebase_ids: r
                .list(cfg.allow_knowledgebase_ids.as_ref(), "MEMOS_ALLOW_KNOWLEDGEBASE_IDS")
                .unwrap_or_default(),
            async_mode: r.flag(cfg.async_mode.as_ref(), "MEMOS_ASYNC_MODE", true),

            timeout_ms: r
                .number(cfg.timeout_ms.as_ref(), "MEMOS_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_TIMEOUT_MS),
            retries: r
                .number(cfg.retries.as_ref(), "MEMOS_RETRIES")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(DEFAULT_RETRIES),
            throttle_ms: r.number(cfg.throttle_ms.as_ref(), "MEMOS_THROTTLE_MS").unwrap_or(0),

            env_file_missing: env.settings_file_missing(),
        }
    }

    /// Both the credential and the user id are set
    pub fn has_credentials(&self) -> bool {
        self.require_credentials().is_ok()
    }

    /// Error naming the first missing credential field
    pub fn require_credentials(&self) -> Result<(), MemosError> {
        if self.api_key.is_empty() {
            return Err(MemosError::ConfigurationIncomplete("apiKey"));
        }
        if self.user_id.is_empty() {
            return Err(MemosError::ConfigurationIncomplete("userId"));
        }
        Ok(())
    }

    /// Copy with the credential masked, for printing
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.api_key.is_empty() {
            let visible: String = copy.api_key.chars().take(4).collect();
            copy.api_key = format!("{}****", visible);
        }
        copy
    }
}

/// Parse the accepted boolean vocabulary; `None` for anything else
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

struct Resolver<'a> {
    env: &'a dyn EnvLookup,
}

impl Resolver<'_> {
    fn string(&self, explicit: Option<&String>, key: &str) -> Option<String> {
        explicit
            .filter(|v| !v.is_empty())
            .cloned()
            .or_else(|| self.env.get(key))
    }

    fn flag(&self, explicit: Option<&Scalar>, key: &str, default: bool) -> bool {
        explicit
            .and_then(Scalar::as_bool)
            .or_else(|| self.env.get(key).as_deref().and_then(parse_bool))
            .unwrap_or(default)
    }

    fn number(&self, explicit: Option<&Scalar>, key: &str) -> Option<u64> {
        explicit
            .and_then(Scalar::as_u64)
            .or_else(|| self.env.get(key).and_then(|v| v.trim().parse().ok()))
    }

    fn parsed<T: FromStr + Default>(&self, explicit: Option<&String>, key: &str) -> T {
        self.string(explicit, key)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    /// Comma-separated in the environment; an explicit list counts even when empty
    fn list(&self, explicit: Option<&Vec<String>>, key: &str) -> Option<Vec<String>> {
        if let Some(list) = explicit {
            return Some(list.clone());
        }
        self.env.get(key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }

    /// JSON-encoded in the environment
    fn json(&self, explicit: Option<&Value>, key: &str) -> Option<Value> {
        if let Some(value) = explicit.filter(|v| !v.is_null()) {
            return Some(value.clone());
        }
        let raw = self.env.get(key)?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) if !value.is_null() => Some(value),
            Ok(_) => None,
            Err(e) => {
                debug!("Ignoring {}: not valid JSON ({})", key, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve_with(None, &StaticEnv::new());

        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.api_key, "");
        assert_eq!(settings.user_id, "openclaw-user");
        assert_eq!(settings.conversation_suffix_mode, SuffixMode::None);
        assert!(settings.recall_global);
        assert!(settings.reset_on_new);
        assert!(settings.recall_enabled);
        assert!(settings.add_enabled);
        assert_eq!(settings.capture_strategy, CaptureStrategy::LastTurn);
        assert_eq!(settings.max_query_chars, 2000);
        assert_eq!(settings.max_message_chars, 2000);
        assert!(settings.include_assistant);
        assert_eq!(settings.memory_limit_number, 6);
        assert!(settings.include_preference);
        assert!(!settings.include_tool_memory);
        assert_eq!(settings.tags, vec!["openclaw".to_string()]);
        assert!(!settings.allow_public);
        assert!(settings.async_mode);
        assert_eq!(settings.timeout_ms, 5000);
        assert_eq!(settings.retries, 1);
        assert_eq!(settings.throttle_ms, 0);
        assert!(settings.filter.is_none());
        assert!(!settings.has_credentials());
        assert_eq!(
            settings.require_credentials(),
            Err(MemosError::ConfigurationIncomplete("apiKey"))
        );
    }

    #[test]
    fn test_explicit_beats_env() {
        let cfg: PluginConfig = serde_json::from_value(json!({
            "apiKey": "explicit-key",
            "userId": "",
            "baseUrl": "https://example.test/api///",
            "retries": "3",
            "recallEnabled": "off",
        }))
        .unwrap();
        let env = StaticEnv::new()
            .set("MEMOS_API_KEY", "env-key")
            .set("MEMOS_USER_ID", "env-user")
            .set("MEMOS_RETRIES", "7");

        let settings = Settings::resolve_with(Some(&cfg), &env);

        assert_eq!(settings.api_key, "explicit-key");
        // empty explicit value falls through to the environment
        assert_eq!(settings.user_id, "env-user");
        assert_eq!(settings.base_url, "https://example.test/api");
        assert_eq!(settings.retries, 3);
        assert!(!settings.recall_enabled);
    }

    #[test]
    fn test_env_values_and_fallbacks() {
        let env = StaticEnv::new()
            .set("MEMOS_RECALL_GLOBAL", "No")
            .set("MEMOS_CONVERSATION_RESET_ON_NEW", "maybe")
            .set("MEMOS_CONVERSATION_SUFFIX_MODE", "counter")
            .set("MEMOS_CAPTURE_STRATEGY", "full_session")
            .set("MEMOS_TIMEOUT_MS", "not-a-number")
            .set("MEMOS_TAGS", "a, b,,c")
            .set("MEMOS_INFO", r#"{"team":"core"}"#)
            .set("MEMOS_FILTER", "{broken");

        let settings = Settings::resolve_with(None, &env);

        assert!(!settings.recall_global);
        assert!(settings.reset_on_new);
        assert_eq!(settings.conversation_suffix_mode, SuffixMode::Counter);
        assert_eq!(settings.capture_strategy, CaptureStrategy::FullSession);
        assert_eq!(settings.timeout_ms, 5000);
        assert_eq!(settings.tags, vec!["a", "b", "c"]);
        assert_eq!(settings.info.get("team"), Some(&json!("core")));
        assert!(settings.filter.is_none());
    }

    #[test]
    fn test_unknown_enum_values_default() {
        let cfg: PluginConfig = serde_json::from_value(json!({
            "captureStrategy": "everything",
            "conversationSuffixMode": "uuid",
        }))
        .unwrap();
        let settings = Settings::resolve_with(Some(&cfg), &StaticEnv::new());
        assert_eq!(settings.capture_strategy, CaptureStrategy::LastTurn);
        assert_eq!(settings.conversation_suffix_mode, SuffixMode::None);
    }

    #[test]
    fn test_max_query_chars_zero_means_default() {
        let cfg: PluginConfig =
            serde_json::from_value(json!({ "maxQueryChars": 0, "maxMessageChars": 0 })).unwrap();
        let settings = Settings::resolve_with(Some(&cfg), &StaticEnv::new());
        assert_eq!(settings.max_query_chars, 2000);
        assert_eq!(settings.max_message_chars, 0);
    }

    #[test]
    fn test_explicit_empty_list_is_kept() {
        let cfg: PluginConfig = serde_json::from_value(json!({ "tags": [] })).unwrap();
        let settings = Settings::resolve_with(Some(&cfg), &StaticEnv::new());
        assert!(settings.tags.is_empty());
    }

    #[test]
    fn test_parse_bool_vocabulary() {
        for t in ["1", "true", "YES", "y", "On"] {
            assert_eq!(parse_bool(t), Some(true), "{}", t);
        }
        for f in ["0", "false", "no", "N", "OFF"] {
            assert_eq!(parse_bool(f), Some(false), "{}", f);
        }
        assert_eq!(parse_bool("enabled"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_scalar_numbers() {
        assert_eq!(Scalar::from(12u64).as_u64(), Some(12));
        assert_eq!(Scalar::from(" 40 ").as_u64(), Some(40));
        assert_eq!(Scalar::from("-1").as_u64(), None);
        assert_eq!(Scalar::from(true).as_u64(), None);
        let float: Scalar = serde_json::from_value(json!(2.5)).unwrap();
        assert_eq!(float.as_u64(), None);
    }

    #[test]
    fn test_missing_settings_file_is_flagged() {
        let file = SettingsFile::load(Path::new("/nonexistent/memos/.env"));
        assert!(file.is_missing());
        let settings = Settings::resolve_with(None, &ProcessEnv::with_file(file));
        assert!(settings.env_file_missing);
    }

    #[test]
    #[serial]
    fn test_settings_file_values() {
        let dir = std::env::temp_dir().join(format!("memos-core-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".env");
        std::fs::write(
            &path,
            "MEMOS_TEST_ONLY_KEY=\"quoted value\"\nMEMOS_TEST_OTHER='single'\nMEMOS_TEST_LITERAL='tok$en'\n",
        )
        .unwrap();

        let env = ProcessEnv::with_file(SettingsFile::load(&path));
        std::env::remove_var("MEMOS_TEST_ONLY_KEY");
        assert_eq!(env.get("MEMOS_TEST_ONLY_KEY").as_deref(), Some("quoted value"));
        assert_eq!(env.get("MEMOS_TEST_OTHER").as_deref(), Some("single"));
        assert_eq!(env.get("MEMOS_TEST_LITERAL").as_deref(), Some("tok$en"));
        assert!(!env.settings_file_missing());

        // process environment wins over the file
        std::env::set_var("MEMOS_TEST_ONLY_KEY", "from-process");
        assert_eq!(env.get("MEMOS_TEST_ONLY_KEY").as_deref(), Some("from-process"));
        std::env::remove_var("MEMOS_TEST_ONLY_KEY");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_mistyped_fields_fall_through() {
        let cfg = PluginConfig::from_json(&json!({
            "apiKey": "k",
            "userId": "u",
            "tags": "a,b",
            "info": [],
            "conversationSuffixMode": 1,
            "knowledgebaseIds": { "id": "kb" },
            "maxQueryChars": [],
        }));
        assert_eq!(cfg.api_key.as_deref(), Some("k"));
        assert!(cfg.tags.is_none());
        assert!(cfg.info.is_none());
        assert!(cfg.conversation_suffix_mode.is_none());

        let env = StaticEnv::new().set("MEMOS_TAGS", "x,y");
        let settings = Settings::resolve_with(Some(&cfg), &env);
        assert_eq!(settings.api_key, "k");
        assert_eq!(settings.user_id, "u");
        assert_eq!(settings.tags, vec!["x", "y"]);
        assert!(settings.info.is_empty());
        assert_eq!(settings.conversation_suffix_mode, SuffixMode::None);
        assert!(settings.knowledgebase_ids.is_empty());
        assert_eq!(settings.max_query_chars, DEFAULT_MAX_CHARS);
    }

    #[test]
    fn test_non_object_config_is_empty() {
        let cfg = PluginConfig::from_json(&json!("apiKey=k"));
        assert!(cfg.api_key.is_none());
        assert!(PluginConfig::from_json(&Value::Null).base_url.is_none());
    }

    #[test]
    fn test_redacted_masks_key() {
        let cfg: PluginConfig = serde_json::from_value(json!({ "apiKey": "mpg-secret" })).unwrap();
        let settings = Settings::resolve_with(Some(&cfg), &StaticEnv::new());
        assert_eq!(settings.redacted().api_key, "mpg-****");
    }
}
