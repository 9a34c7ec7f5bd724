// ============================================================================
// memos-hook: drive the MemOS Cloud lifecycle plugin from a terminal
// ============================================================================
// Usage:
//   memos-hook config                               Show resolved settings
//   memos-hook recall --prompt TEXT [--session-key KEY]
//                                                   Run the pre-turn hook
//   memos-hook capture --messages FILE [--session-key KEY]
//                                                   Run the post-turn hook
//   memos-hook search --prompt TEXT                 Raw search, JSON response
// ============================================================================

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use memos_core::{
    build_search_payload, resolve_conversation_id, AgentEndEvent, BeforeAgentStartEvent,
    CaptureOutcome, HookContext, MemosPlugin, Message, PluginConfig, ProcessEnv, Settings,
};
use std::path::{Path, PathBuf};
use tracing::info;

/// MemOS Cloud plugin driver
#[derive(Parser)]
#[command(name = "memos-hook", version, about = "Run MemOS Cloud recall/capture hooks by hand")]
struct Cli {
    /// Explicit plugin config (JSON object, camelCase keys)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved settings (API key masked)
    Config,

    /// Run the pre-turn hook and print the context it would inject
    Recall {
        #[arg(long)]
        prompt: String,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Run the post-turn hook on a JSON array of host messages
    Capture {
        /// File with `[{"role": "...", "content": ...}, ...]`
        #[arg(long)]
        messages: PathBuf,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Search memories and print the raw JSON response
    Search {
        #[arg(long)]
        prompt: String,

        #[command(flatten)]
        context: ContextArgs,
    },
}

#[derive(Args)]
struct ContextArgs {
    #[arg(long)]
    session_key: Option<String>,

    #[arg(long)]
    session_id: Option<String>,

    #[arg(long)]
    agent_id: Option<String>,
}

impl From<ContextArgs> for HookContext {
    fn from(args: ContextArgs) -> Self {
        HookContext {
            session_key: args.session_key,
            session_id: args.session_id,
            agent_id: args.agent_id,
        }
    }
}

fn load_plugin_config(path: Option<&Path>) -> Result<Option<PluginConfig>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))?;
    Ok(Some(PluginConfig::from_json(&value)))
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("memos_core=info".parse()?)
                .add_directive("memos_cli=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let plugin_config = load_plugin_config(cli.config.as_deref())?;
    let env = ProcessEnv::new();
    let settings = Settings::resolve_with(plugin_config.as_ref(), &env);

    match cli.command {
        Commands::Config => cmd_config(&settings, &env),
        Commands::Recall { prompt, context } => cmd_recall(settings, &prompt, context.into()).await,
        Commands::Capture { messages, context } => {
            cmd_capture(settings, &messages, context.into()).await
        }
        Commands::Search { prompt, context } => cmd_search(settings, &prompt, context.into()).await,
    }
}

fn cmd_config(settings: &Settings, env: &ProcessEnv) -> Result<()> {
    let file = env.settings_file();
    let file_path = file
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(no home directory)".into());

    println!("=== MemOS Cloud Plugin Settings ===");
    println!(
        "Settings file: {} ({})",
        file_path,
        if file.is_missing() { "missing" } else { "loaded" }
    );
    println!("Credentials:   {}", if settings.has_credentials() { "ok" } else { "incomplete" });
    println!();
    println!("{}", serde_json::to_string_pretty(&settings.redacted())?);
    Ok(())
}

async fn cmd_recall(settings: Settings, prompt: &str, ctx: HookContext) -> Result<()> {
    let plugin = MemosPlugin::new(settings);
    let event = BeforeAgentStartEvent {
        prompt: Some(prompt.to_string()),
    };

    match plugin.before_agent_start(&event, &ctx).await {
        Some(injected) => println!("{}", injected.prepend_context),
        None => println!("(no context injected)"),
    }
    Ok(())
}

async fn cmd_capture(settings: Settings, messages_path: &Path, ctx: HookContext) -> Result<()> {
    let raw = std::fs::read_to_string(messages_path)
        .with_context(|| format!("Failed to read {}", messages_path.display()))?;
    let history: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid JSON in {}", messages_path.display()))?;
    if !history.is_array() {
        anyhow::bail!("Expected a JSON array of messages in {}", messages_path.display());
    }
    let messages = Message::history_from_value(history);

    let plugin = MemosPlugin::new(settings);
    let event = AgentEndEvent {
        success: true,
        messages,
    };

    match plugin.agent_end(&event, &ctx).await {
        CaptureOutcome::Submitted {
            conversation_id,
            messages,
        } => println!("Submitted {} messages to conversation {}", messages, conversation_id),
        CaptureOutcome::Failed(e) => anyhow::bail!("Capture failed: {}", e),
        other => println!("Nothing submitted: {:?}", other),
    }
    Ok(())
}

async fn cmd_search(settings: Settings, prompt: &str, ctx: HookContext) -> Result<()> {
    let plugin = MemosPlugin::new(settings);
    let settings = plugin.settings();

    let counter = plugin.counters().get(ctx.session_key()).await;
    let conversation_id = resolve_conversation_id(settings, &ctx, counter);
    let request = build_search_payload(settings, prompt, &conversation_id);
    info!("Searching {} as {}", plugin.client().base_url(), settings.user_id);

    let response = plugin.client().search_memory(&request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
