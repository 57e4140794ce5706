//! llmprobe CLI - check LLM API endpoints from the terminal.
//!
//! Usage:
//!   llmprobe check --provider openai      - Run the battery against one provider
//!   llmprobe batch                        - Check all configured providers at once
//!   llmprobe keys --provider openai ...   - Validate a list of API keys
//!   llmprobe providers                    - List builtin presets
//!   llmprobe onboard                      - Create a default configuration
//!   llmprobe export --out report.json     - Run a batch and export the report
//!   llmprobe history                      - Show recent check history

use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use llmprobe_core::batch::{BatchRunner, KeyBatchConfig};
use llmprobe_core::check::report::{generate_report, text_summary};
use llmprobe_core::check::{CheckConfig, Checker, FullCheckResult};
use llmprobe_core::config::Config;
use llmprobe_core::history::{overall_status, HistorySink};
use llmprobe_core::registry;

#[derive(Parser)]
#[command(
    name = "llmprobe",
    version,
    about = "Health checker for OpenAI-, Anthropic- and Gemini-style LLM APIs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the check battery against one provider
    Check {
        /// Provider id from config or the builtin presets
        #[arg(short, long)]
        provider: Option<String>,

        /// Ad-hoc base URL (requires --protocol)
        #[arg(long)]
        base_url: Option<String>,

        /// API key (overrides the configured one)
        #[arg(short, long)]
        key: Option<String>,

        /// Model to probe (overrides config/preset default)
        #[arg(short, long)]
        model: Option<String>,

        /// Protocol for ad-hoc endpoints: openai, anthropic or gemini
        #[arg(long)]
        protocol: Option<String>,
    },

    /// Check all configured providers concurrently
    Batch,

    /// Validate a list of API keys against one provider
    Keys {
        /// Provider id from config or the builtin presets
        #[arg(short, long)]
        provider: String,

        /// Comma-separated keys
        #[arg(long, value_delimiter = ',')]
        keys: Vec<String>,

        /// File with one key per line
        #[arg(long)]
        keys_file: Option<PathBuf>,
    },

    /// List builtin provider presets
    Providers,

    /// Create or reset the default configuration
    Onboard,

    /// Run a batch check and export the JSON report
    Export {
        /// Output file path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Show recent check history
    History {
        /// Number of entries to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            provider,
            base_url,
            key,
            model,
            protocol,
        } => cmd_check(provider, base_url, key, model, protocol).await?,
        Commands::Batch => cmd_batch().await?,
        Commands::Keys {
            provider,
            keys,
            keys_file,
        } => cmd_keys(&provider, keys, keys_file).await?,
        Commands::Providers => cmd_providers(),
        Commands::Onboard => cmd_onboard()?,
        Commands::Export { out } => cmd_export(&out).await?,
        Commands::History { limit } => cmd_history(limit)?,
    }

    Ok(())
}

// ── History sink ────────────────────────────────────────────────────

/// Append-only JSONL history at `~/.llmprobe/history.jsonl`.
struct JsonlHistory {
    path: PathBuf,
}

impl JsonlHistory {
    fn default_path() -> PathBuf {
        Config::config_dir().join("history.jsonl")
    }

    fn open_default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

impl HistorySink for JsonlHistory {
    fn record(&self, result: &FullCheckResult) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut entry = serde_json::to_value(result)?;
        entry["status"] = serde_json::to_value(overall_status(result))?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{entry}")?;
        Ok(())
    }
}

fn record_all(results: &[FullCheckResult]) {
    let sink = JsonlHistory::open_default();
    for result in results {
        if let Err(e) = sink.record(result) {
            tracing::warn!(error = %e, "Failed to record history entry");
        }
    }
}

// ── Commands ────────────────────────────────────────────────────────

/// Resolve a provider id against config first, then the builtin presets.
fn resolve_provider(config: &Config, provider_id: &str) -> Result<CheckConfig> {
    if let Some(entry) = config.find_provider(provider_id) {
        return Ok(entry.resolve()?);
    }
    if registry::find(provider_id).is_some() {
        let entry = llmprobe_core::config::ProviderEntry {
            provider_id: provider_id.to_string(),
            ..Default::default()
        };
        return Ok(entry.resolve()?);
    }
    bail!(
        "provider {provider_id:?} is neither configured nor a builtin preset \
         (run `llmprobe providers` to list presets)"
    );
}

async fn cmd_check(
    provider: Option<String>,
    base_url: Option<String>,
    key: Option<String>,
    model: Option<String>,
    protocol: Option<String>,
) -> Result<()> {
    let config = Config::load()?;

    let mut check_config = match (&provider, &base_url) {
        (Some(id), _) => resolve_provider(&config, id)?,
        (None, Some(url)) => {
            let protocol = protocol
                .as_deref()
                .context("--protocol is required with --base-url")?
                .parse()?;
            CheckConfig {
                provider_id: "custom".into(),
                provider_name: "Custom".into(),
                base_url: url.clone(),
                api_key: String::new(),
                model: model.clone().unwrap_or_default(),
                protocol,
            }
        }
        (None, None) => bail!("pass --provider <id> or --base-url <url>"),
    };

    if let Some(key) = key {
        check_config.api_key = key;
    }
    if let Some(model) = model {
        check_config.model = model;
    }

    let checker = Checker::new();
    let result = checker.run_check(&check_config).await?;

    print!("{}", text_summary(std::slice::from_ref(&result)));
    record_all(std::slice::from_ref(&result));
    Ok(())
}

async fn cmd_batch() -> Result<()> {
    let config = Config::load()?;
    if config.providers.is_empty() {
        bail!("no providers configured; run `llmprobe onboard` and edit the config");
    }

    let mut units = Vec::new();
    for entry in &config.providers {
        units.push(entry.resolve()?);
    }

    println!("Checking {} providers (Ctrl-C to cancel)...", units.len());
    let results = run_cancellable_batch(&config, units).await;

    print!("{}", text_summary(&results));
    record_all(&results);
    Ok(())
}

async fn cmd_keys(provider: &str, mut keys: Vec<String>, keys_file: Option<PathBuf>) -> Result<()> {
    let config = Config::load()?;
    let resolved = resolve_provider(&config, provider)?;

    if let Some(path) = keys_file {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading keys from {}", path.display()))?;
        keys.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from),
        );
    }
    if keys.is_empty() {
        bail!("no keys given; pass --keys or --keys-file");
    }

    let base = KeyBatchConfig {
        provider_id: resolved.provider_id,
        provider_name: resolved.provider_name,
        base_url: resolved.base_url,
        model: resolved.model,
        protocol: resolved.protocol,
    };

    println!("Validating {} keys (Ctrl-C to cancel)...", keys.len());
    let runner = BatchRunner::new(Checker::new()).with_concurrency(config.concurrency);
    let cancel = cancel_on_ctrl_c();
    let results = runner.run_batch_key_check(base, keys, &cancel).await;

    print!("{}", text_summary(&results));
    record_all(&results);
    Ok(())
}

fn cmd_providers() {
    println!();
    for preset in registry::presets() {
        println!(
            "  {:<12} {:<16} {:<10} {}",
            preset.id, preset.name, preset.protocol, preset.base_url
        );
        println!("               models: {}", preset.models.join(", "));
    }
    println!();
}

fn cmd_onboard() -> Result<()> {
    let path = Config::write_default_template()?;
    println!();
    println!("  Configuration created at:");
    println!("     {}", path.display());
    println!();
    println!("  Next steps:");
    println!("  1. Edit the config file and add your API key(s)");
    println!("  2. Run `llmprobe batch` to check every configured provider");
    println!();
    Ok(())
}

async fn cmd_export(out: &PathBuf) -> Result<()> {
    let config = Config::load()?;
    if config.providers.is_empty() {
        bail!("no providers configured; run `llmprobe onboard` first");
    }

    let mut units = Vec::new();
    for entry in &config.providers {
        units.push(entry.resolve()?);
    }

    let results = run_cancellable_batch(&config, units).await;
    std::fs::write(out, generate_report(&results))
        .with_context(|| format!("writing report to {}", out.display()))?;

    println!("Report written to {}", out.display());
    record_all(&results);
    Ok(())
}

fn cmd_history(limit: usize) -> Result<()> {
    let path = JsonlHistory::default_path();
    if !path.exists() {
        println!("No history yet.");
        return Ok(());
    }

    let content = std::fs::read_to_string(&path)?;
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(limit);

    println!();
    for line in &lines[start..] {
        let Ok(entry) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        println!(
            "  {}  {:<8} {} ({}, {}ms)",
            entry["endTime"].as_str().unwrap_or("?"),
            entry["status"].as_str().unwrap_or("?"),
            entry["providerName"].as_str().unwrap_or("?"),
            entry["model"].as_str().unwrap_or("?"),
            entry["totalLatency"].as_u64().unwrap_or(0),
        );
    }
    println!();
    Ok(())
}

// ── Shared helpers ──────────────────────────────────────────────────

/// Token that fires on the first Ctrl-C, letting in-flight checks finish
/// while no new units are dispatched.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nCancelling: waiting for in-flight checks...");
            trigger.cancel();
        }
    });
    cancel
}

async fn run_cancellable_batch(config: &Config, units: Vec<CheckConfig>) -> Vec<FullCheckResult> {
    let runner = BatchRunner::new(Checker::new()).with_concurrency(config.concurrency);
    let cancel = cancel_on_ctrl_c();
    runner.run_batch_check(units, &cancel).await
}
