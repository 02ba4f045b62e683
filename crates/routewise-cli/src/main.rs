//! Routewise CLI - provider routing service for multi-provider AI chat

use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use clap::{Parser, Subcommand};
use routewise_core::api::{self, AppState};
use routewise_core::classifier::TaskClassifier;
use routewise_core::config::Config;
use routewise_core::cost::{CostLedger, spawn_cleanup};
use routewise_core::provider::Provider;
use routewise_core::routing::{ConversationContext, UserPreferences};
use routewise_core::tracking::{MetricStore, PerformanceTracker, spawn_writer, window_start};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

/// How often expired cost records are dropped while serving
const LEDGER_CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

#[derive(Parser)]
#[command(name = "routewise")]
#[command(author, version, about = "Provider routing for multi-provider AI chat", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to bind, overriding server.bind
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Classify a message
    Classify {
        /// Message text
        message: String,
    },

    /// Pick a provider for a message
    Route {
        /// Message text
        message: String,
        /// Preferred provider (google, openai, anthropic, hf)
        #[arg(short, long)]
        prefer: Option<String>,
        /// Favour low-latency models
        #[arg(long)]
        fast: bool,
        /// Favour cheap models
        #[arg(long)]
        cheap: bool,
    },

    /// Price a request and show whether it needs approval
    Price {
        /// Provider name
        provider: String,
        /// Model id
        model: String,
        /// Input tokens
        input_tokens: u64,
        /// Output tokens
        output_tokens: u64,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("routewise=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind } => cmd_serve(bind, cli.quiet).await,

        Commands::Classify { message } => cmd_classify(&message, cli.format),

        Commands::Route {
            message,
            prefer,
            fast,
            cheap,
        } => cmd_route(&message, prefer.as_deref(), fast, cheap, cli.format),

        Commands::Price {
            provider,
            model,
            input_tokens,
            output_tokens,
        } => cmd_price(&provider, &model, input_tokens, output_tokens, cli.format),

        Commands::Config { action } => cmd_config(action, cli.quiet),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_serve(bind: Option<String>, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let addr = bind.unwrap_or_else(|| config.server.bind.clone());

    let mut tracker = PerformanceTracker::new(config.tracking.capacity);
    let mut restored = Vec::new();

    if let Some(path) = &config.tracking.database_path {
        let store = open_store(path, config.cost.retention_days).await?;
        restored = store.load_recent(config.tracking.capacity).await?;

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tracker = tracker.with_sink(tx);
        spawn_writer(store, rx);
    }

    // Restoring goes through the tracker directly, so nothing is re-persisted
    let tracker = Arc::new(tracker);
    let count = tracker.restore(restored)?;
    if count > 0 {
        info!(count, "Restored performance metrics");
    }

    let state = AppState::from_config(&config, tracker)?;
    spawn_cleanup(
        Arc::clone(&state.ledger),
        config.cost.retention_days,
        LEDGER_CLEANUP_INTERVAL,
    );

    if !quiet {
        println!("Routewise listening on {}", addr);
    }
    api::serve(Arc::new(state), &addr).await
}

async fn open_store(path: &Path, retention_days: u32) -> anyhow::Result<MetricStore> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let store = MetricStore::connect(path).await?;
    store.init().await?;

    let cutoff = window_start(Duration::days(i64::from(retention_days)));
    match store.prune_older_than(cutoff).await {
        Ok(0) => {}
        Ok(pruned) => info!(pruned, retention_days, "Pruned old performance metrics"),
        Err(e) => warn!(error = %e, "Failed to prune performance metrics"),
    }

    Ok(store)
}

fn cmd_classify(message: &str, format: OutputFormat) -> anyhow::Result<()> {
    let config = Config::load()?;
    let classifier = TaskClassifier::new().with_max_input_bytes(config.routing.max_input_bytes);
    let classification = classifier.try_classify(message)?;

    emit(format, &classification, || {
        println!("Task type:      {}", classification.task_type);
        println!("Confidence:     {:.2}", classification.confidence);
        println!("Complexity:     {}", classification.complexity);
        println!("Requires tools: {}", classification.requires_tools);
        println!("Est. tokens:    {}", classification.estimated_tokens);
    })
}

fn cmd_route(
    message: &str,
    prefer: Option<&str>,
    fast: bool,
    cheap: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let preferred_provider = prefer.map(str::parse::<Provider>).transpose()?;

    let state = AppState::from_config(
        &config,
        Arc::new(PerformanceTracker::new(config.tracking.capacity)),
    )?;

    let context = ConversationContext::new("cli")
        .with_message(message)
        .with_preferences(UserPreferences {
            preferred_provider,
            cost_sensitive: cheap,
            quality_priority: false,
            speed_priority: fast,
        });

    let decision = state.router.select_provider(message, &context);

    emit(format, &decision, || {
        println!("Provider:   {}", decision.provider.display_name());
        println!("Model:      {}", decision.model);
        println!("Confidence: {:.2}", decision.confidence);
        println!("Est. cost:  ${:.6}", decision.estimated_cost);
        println!("Est. time:  {}ms", decision.estimated_latency_ms);
        if !decision.fallback_providers.is_empty() {
            let fallbacks: Vec<&str> = decision
                .fallback_providers
                .iter()
                .map(|p| p.as_str())
                .collect();
            println!("Fallbacks:  {}", fallbacks.join(", "));
        }
        println!("Reasoning:  {}", decision.reasoning);
    })
}

fn cmd_price(
    provider: &str,
    model: &str,
    input_tokens: u64,
    output_tokens: u64,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let ledger = CostLedger::from_config(&config.cost);
    let cost = ledger.calculate_cost(provider, model, input_tokens, output_tokens);

    let quote = json!({
        "provider": provider,
        "model": model,
        "inputTokens": input_tokens,
        "outputTokens": output_tokens,
        "cost": cost,
        "needsApproval": ledger.needs_approval(cost),
        "canAutoApprove": ledger.can_auto_approve(cost),
        "paymentRequired": ledger.payment_required(cost),
    });

    emit(format, &quote, || {
        println!("Cost: ${:.6}", cost);
        if ledger.can_auto_approve(cost) {
            println!("  Auto-approved");
        } else if ledger.needs_approval(cost) {
            println!("  [WARNING] Requires approval");
        } else {
            println!("  Within approval threshold");
        }
    })
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

/// Print `value` as JSON, or run the text renderer
fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(),
    }
    Ok(())
}
