//! wordlist-service - Word List Matching Service
//!
//! # Usage
//!
//! ```bash
//! # Serve the HTTP API
//! wordlist-service serve --addr 0.0.0.0:8080
//!
//! # One-off check against a phrase file
//! wordlist-service check --tenant acme --locale en --category banned \
//!     --phrases banned.txt "you damn fool"
//! ```
//!
//! # Environment Variables
//!
//! - `WORDLIST_CONFIG`: Path to TOML config (default: ./wordlist_config.toml)
//! - `WORDLIST_CORS_ORIGINS`: Comma-separated allowed CORS origins
//! - `WORDLIST_LOG_JSON`: Emit JSON log lines when set to `true`
//! - `RUST_LOG`: Logging level (default: info)

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use wordlist_service::api::create_app;
use wordlist_service::{ServiceConfig, WordListCategory, WordListService};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "wordlist-service")]
#[command(about = "Per-tenant word list matching for comment moderation")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides WORDLIST_CONFIG)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the server address (default: "0.0.0.0:8080")
    #[arg(short, long, value_name = "HOST:PORT")]
    addr: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "WORDLIST_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the HTTP API until Ctrl+C
    Serve,

    /// Load a phrase file and print one JSON match result per text
    Check {
        #[arg(long)]
        tenant: String,

        #[arg(long, default_value = "en")]
        locale: String,

        /// BANNED or SUSPECT
        #[arg(long, default_value = "banned")]
        category: WordListCategory,

        /// Newline-delimited phrase file
        #[arg(long, value_name = "FILE")]
        phrases: PathBuf,

        /// Texts to check (reads stdin lines when omitted)
        texts: Vec<String>,
    },
}

fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    match path {
        Some(p) => ServiceConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config from {}", p.display())),
        None => Ok(ServiceConfig::load()),
    }
}

fn read_phrases(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read phrase file {}", path.display()))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect())
}

// ============================================================================
// Commands
// ============================================================================

async fn run_serve(config: ServiceConfig, server_addr: String) -> Result<()> {
    let service = Arc::new(WordListService::new(&config).context("Failed to start worker pool")?);

    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("Failed to bind {server_addr}"))?;
    info!(addr = %server_addr, workers = service.size(), "Word list service listening");

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let result = axum::serve(listener, create_app(Arc::clone(&service)))
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
            info!("[HttpServer] Received shutdown signal");
        })
        .await;

    service.shutdown().await;

    match result {
        Ok(()) => {
            info!("[HttpServer] Graceful shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("[HttpServer] Server error: {}", e);
            Err(anyhow::anyhow!("HTTP server error: {}", e))
        }
    }
}

async fn run_check(
    config: ServiceConfig,
    tenant: String,
    locale: String,
    category: WordListCategory,
    phrases: PathBuf,
    texts: Vec<String>,
) -> Result<()> {
    let phrases = read_phrases(&phrases)?;
    let service = WordListService::new(&config).context("Failed to start worker pool")?;

    let report = service
        .initialize_detailed(&tenant, &locale, category, phrases)
        .await;
    if !report.is_consistent() {
        service.shutdown().await;
        anyhow::bail!(
            "Word list rejected by {} of {} workers",
            report.failures.len(),
            service.size()
        );
    }

    let texts = if texts.is_empty() {
        std::io::stdin()
            .lock()
            .lines()
            .collect::<std::io::Result<Vec<_>>>()
            .context("Failed to read stdin")?
    } else {
        texts
    };

    for text in &texts {
        let result = service.process(&tenant, category, text).await;
        println!("{}", serde_json::to_string(&result)?);
    }

    service.shutdown().await;
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Initialize logging (stderr, so `check` output stays clean on stdout)
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
    let config = load_config(args.config.as_deref())?;

    match args.command {
        SubCommand::Serve => {
            let server_addr = args.addr.unwrap_or_else(|| config.server.addr.clone());
            run_serve(config, server_addr).await
        }
        SubCommand::Check {
            tenant,
            locale,
            category,
            phrases,
            texts,
        } => run_check(config, tenant, locale, category, phrases, texts).await,
    }
}
