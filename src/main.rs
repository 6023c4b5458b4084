//! # Trend Assistant CLI (`trend`)
//!
//! ## Usage
//!
//! ```bash
//! trend --config ./config/trend.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `trend init` | Create the SQLite cache database and run schema migrations |
//! | `trend run` | Research a brief and write the trend report and prompts |
//! | `trend prompts --report <file>` | Regenerate prompts from a saved report |
//! | `trend cache stats` | Show cache entry counts per embedding model |
//! | `trend cache clear` | Delete every cache entry |
//!
//! ## Examples
//!
//! ```bash
//! trend init --config ./config/trend.toml
//! trend run --season fall --year 2025 --theme "minimalist tailoring" --region Milan
//! trend run --passage "Gen Z resort wear for a Mediterranean summer 2026" --no-cache
//! trend prompts --report ./results/itemized_fashion_trends.json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use trend_assistant::run_cmd::BriefArgs;
use trend_assistant::{cache_cmd, config, migrate, run_cmd};

/// Trend Assistant CLI: research-backed fashion trend reports with a
/// semantic cache.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/trend.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "trend",
    about = "Trend Assistant: research-backed fashion trend reports and image prompts",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/trend.toml")]
    config: PathBuf,

    /// Log filter used when `RUST_LOG` is not set (e.g. `debug`, `trend_assistant=trace`).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the cache database schema.
    ///
    /// Creates the SQLite database file and the cache table. Idempotent.
    Init,

    /// Produce a trend report for a creative brief.
    ///
    /// Serves a cached report when a similar brief was researched before;
    /// otherwise searches, summarizes and synthesizes a new one.
    Run {
        /// Season: spring, summer, fall (or autumn), winter.
        #[arg(long)]
        season: Option<String>,

        /// Four-digit year.
        #[arg(long)]
        year: Option<i32>,

        /// Theme hint, e.g. "minimalist tailoring".
        #[arg(long)]
        theme: Option<String>,

        /// Target audience.
        #[arg(long)]
        audience: Option<String>,

        /// Region or market.
        #[arg(long)]
        region: Option<String>,

        /// Free-text request to deconstruct into a brief instead of the flags above.
        #[arg(long)]
        passage: Option<String>,

        /// Skip cache lookup and write-back for this run.
        #[arg(long)]
        no_cache: bool,

        /// Cancel the run after this many seconds (overrides `pipeline.run_timeout_secs`).
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Regenerate image prompts from a saved trend report.
    Prompts {
        /// Path to a report JSON file written by `trend run`.
        #[arg(long)]
        report: PathBuf,
    },

    /// Inspect or clear the semantic cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry counts per embedding model.
    Stats,
    /// Delete every cache entry.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Prompt regeneration works without a config file
    if let Commands::Prompts { report } = &cli.command {
        let cfg = config::load_config(&cli.config).unwrap_or_else(|_| config::Config::minimal());
        run_cmd::run_prompts(&cfg, report)?;
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Run {
            season,
            year,
            theme,
            audience,
            region,
            passage,
            no_cache,
            timeout_secs,
        } => {
            let args = BriefArgs {
                season,
                year,
                theme,
                audience,
                region,
                passage,
            };
            run_cmd::run_trends(&cfg, &args, !no_cache, timeout_secs).await?;
        }
        Commands::Prompts { .. } => {}
        Commands::Cache { action } => match action {
            CacheAction::Stats => cache_cmd::run_cache_stats(&cfg).await?,
            CacheAction::Clear => cache_cmd::run_cache_clear(&cfg).await?,
        },
    }

    Ok(())
}
