//! ============================================================================
//! Plugin Orchestrator - Lifecycle hooks for recall and capture
//! ============================================================================
//! - before_agent_start: search memories, return context to prepend
//! - agent_end: select the turn's messages and submit them
//! - command `new`: bump the session's conversation counter
//!
//! Failures never reach the host; they are logged and the hook has no effect.
//! ============================================================================

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::{HttpTransport, MemosClient};
use crate::config::{PluginConfig, Settings, SuffixMode};
use crate::formatter::{format_context_block, wrap_recall_context, DEFAULT_MAX_ITEM_CHARS};
use crate::identity::{resolve_conversation_id, ConversationCounters};
use crate::payload::{build_add_payload, build_search_payload};
use crate::selector::select_messages;
use crate::types::{
    AgentEndEvent, BeforeAgentStartEvent, CommandEvent, HookContext, Message, MemosError,
    PrependContext, Result, COMMAND_NEW,
};

pub const PLUGIN_ID: &str = "memos-cloud-openclaw-plugin";
pub const PLUGIN_NAME: &str = "MemOS Cloud OpenClaw Plugin";

/// Prompts shorter than this (in chars) are not worth a recall
const MIN_PROMPT_CHARS: usize = 3;

/// Async hook callback as stored by a host
pub type HookHandler<E, R> = Arc<dyn Fn(E, HookContext) -> BoxFuture<'static, R> + Send + Sync>;

/// The host side of hook registration
pub trait HookRegistry {
    fn on_before_agent_start(&mut self, handler: HookHandler<BeforeAgentStartEvent, Option<PrependContext>>);

    fn on_agent_end(&mut self, handler: HookHandler<AgentEndEvent, ()>);

    /// Whether the host exposes command events at all
    fn supports_command_hooks(&self) -> bool {
        false
    }

    fn on_command(&mut self, _handler: HookHandler<CommandEvent, ()>) {}
}

/// What the post-turn hook ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Disabled,
    NothingToCapture,
    MissingCredentials,
    Throttled,
    NoMessagesSelected,
    Submitted { conversation_id: String, messages: usize },
    Failed(MemosError),
}

/// Plugin instance: immutable settings plus the per-registration mutable state
pub struct MemosPlugin {
    settings: Settings,
    client: MemosClient,
    counters: ConversationCounters,
    last_capture: Mutex<Option<Instant>>,
}

impl MemosPlugin {
    pub fn new(settings: Settings) -> Self {
        let client = MemosClient::new(&settings);
        Self::with_client(settings, client)
    }

    pub fn with_transport(settings: Settings, transport: Arc<dyn HttpTransport>) -> Self {
        let client = MemosClient::with_transport(&settings, transport);
        Self::with_client(settings, client)
    }

    fn with_client(settings: Settings, client: MemosClient) -> Self {
        Self {
            settings,
            client,
            counters: ConversationCounters::new(),
            last_capture: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn client(&self) -> &MemosClient {
        &self.client
    }

    pub fn counters(&self) -> &ConversationCounters {
        &self.counters
    }

    /// Whether the `new` command should start a fresh conversation id
    pub fn counter_reset_enabled(&self) -> bool {
        self.settings.conversation_suffix_mode == SuffixMode::Counter && self.settings.reset_on_new
    }

    /// Wire the hooks into `host`; the closures share this instance
    pub fn register(self: &Arc<Self>, host: &mut dyn HookRegistry) {
        if self.settings.env_file_missing {
            warn!("Settings file ~/.openclaw/.env not found; using plugin config and environment only");
        }

        let plugin = Arc::clone(self);
        host.on_before_agent_start(Arc::new(move |event: BeforeAgentStartEvent, ctx: HookContext| {
            let plugin = Arc::clone(&plugin);
            async move { plugin.before_agent_start(&event, &ctx).await }.boxed()
        }));

        let plugin = Arc::clone(self);
        host.on_agent_end(Arc::new(move |event: AgentEndEvent, ctx: HookContext| {
            let plugin = Arc::clone(&plugin);
            async move {
                plugin.agent_end(&event, &ctx).await;
            }
            .boxed()
        }));

        if !self.counter_reset_enabled() {
            return;
        }
        if !host.supports_command_hooks() {
            warn!("Host has no command hook system; conversation counter will not reset on /new");
            return;
        }

        let plugin = Arc::clone(self);
        host.on_command(Arc::new(move |event: CommandEvent, ctx: HookContext| {
            let plugin = Arc::clone(&plugin);
            async move { plugin.on_command(&event, &ctx).await }.boxed()
        }));
        debug!("Registered counter reset on /new");
    }

    // ========================================================================
    // Recall
    // ========================================================================

    /// Pre-turn hook: context to prepend, if any memories were found
    pub async fn before_agent_start(
        &self,
        event: &BeforeAgentStartEvent,
        ctx: &HookContext,
    ) -> Option<PrependContext> {
        if !self.settings.recall_enabled {
            return None;
        }
        let prompt = event.prompt.as_deref()?;
        if prompt.chars().count() < MIN_PROMPT_CHARS {
            return None;
        }
        if let Err(e) = self.settings.require_credentials() {
            warn!("{}; recall skipped", e);
            return None;
        }

        match self.recall(prompt, ctx).await {
            Ok(Some(block)) => Some(PrependContext {
                prepend_context: wrap_recall_context(&block),
            }),
            Ok(None) => None,
            Err(e) => {
                warn!("Recall failed: {}", e);
                None
            }
        }
    }

    /// Search and format; `None` when the response holds nothing to show
    pub async fn recall(&self, prompt: &str, ctx: &HookContext) -> Result<Option<String>> {
        let counter = self.counters.get(ctx.session_key()).await;
        let conversation_id = resolve_conversation_id(&self.settings, ctx, counter);
        let request = build_search_payload(&self.settings, prompt, &conversation_id);

        debug!(
            conversation_id = ?request.conversation_id,
            query_len = request.query.chars().count(),
            "Searching memories"
        );
        let response = self.client.search_memory(&request).await?;

        let block = format_context_block(Some(&response), DEFAULT_MAX_ITEM_CHARS);
        Ok((!block.is_empty()).then_some(block))
    }

    // ========================================================================
    // Capture
    // ========================================================================

    /// Post-turn hook
    pub async fn agent_end(&self, event: &AgentEndEvent, ctx: &HookContext) -> CaptureOutcome {
        if !self.settings.add_enabled {
            return CaptureOutcome::Disabled;
        }
        if !event.success || event.messages.is_empty() {
            return CaptureOutcome::NothingToCapture;
        }
        if let Err(e) = self.settings.require_credentials() {
            warn!("{}; add skipped", e);
            return CaptureOutcome::MissingCredentials;
        }
        if !self.try_start_capture().await {
            debug!("Capture throttled ({}ms window)", self.settings.throttle_ms);
            return CaptureOutcome::Throttled;
        }

        match self.capture(&event.messages, ctx).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Add failed: {}", e);
                CaptureOutcome::Failed(e)
            }
        }
    }

    /// Select and submit the turn's messages, bypassing enablement and throttle
    pub async fn capture(&self, messages: &[Message], ctx: &HookContext) -> Result<CaptureOutcome> {
        let selected = select_messages(messages, &self.settings);
        if selected.is_empty() {
            return Ok(CaptureOutcome::NoMessagesSelected);
        }

        let counter = self.counters.get(ctx.session_key()).await;
        let conversation_id = resolve_conversation_id(&self.settings, ctx, counter);
        let count = selected.len();
        let request = build_add_payload(&self.settings, selected, &conversation_id, ctx);

        self.client.add_message(&request).await?;

        info!(
            conversation_id = %conversation_id,
            messages = count,
            "Captured turn to MemOS"
        );
        Ok(CaptureOutcome::Submitted {
            conversation_id,
            messages: count,
        })
    }

    /// Record a capture attempt unless the last one is inside the throttle window
    async fn try_start_capture(&self) -> bool {
        let mut last = self.last_capture.lock().await;
        let now = Instant::now();
        let window = Duration::from_millis(self.settings.throttle_ms);

        if let Some(previous) = *last {
            if !window.is_zero() && now.duration_since(previous) < window {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    // ========================================================================
    // Counter reset
    // ========================================================================

    /// Command hook: `new` starts a fresh conversation for the session
    pub async fn on_command(&self, event: &CommandEvent, ctx: &HookContext) {
        if event.action != COMMAND_NEW || !self.counter_reset_enabled() {
            return;
        }

        let session_key = event
            .session_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .or_else(|| ctx.session_key());
        match session_key {
            Some(key) => {
                self.counters.increment(key).await;
            }
            None => debug!("Command /new without a session key; counter unchanged"),
        }
    }
}

/// Resolve settings from `config` and register a new plugin instance on `host`
pub fn register(host: &mut dyn HookRegistry, config: Option<&PluginConfig>) -> Arc<MemosPlugin> {
    let plugin = Arc::new(MemosPlugin::new(Settings::resolve(config)));
    plugin.register(host);
    info!("{} registered ({})", PLUGIN_NAME, PLUGIN_ID);
    plugin
}
