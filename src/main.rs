//! # Codex Context CLI (`codex-context`)
//!
//! Gathers context from configured repositories, the current repository
//! and the working directory, then prints a budgeted prompt or JSON bundle.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `codex-context gather --query <Q>` | Gather, summarize, and print context |
//! | `codex-context stats` | Per-repository file and byte counts |
//! | `codex-context repos add <SOURCE>` | Register a local path or remote URL |
//! | `codex-context repos list` | List configured repositories |
//! | `codex-context repos remove <SOURCE>` | Unregister a repository |
//!
//! Set `RUST_LOG=debug` to see cache and fetch decisions on stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use codex_context::cancel::CancelToken;
use codex_context::config::{self, Config};
use codex_context::diagnostics::TracingDiagnostics;
use codex_context::gather::Gatherer;
use codex_context::git::GitCli;
use codex_context::models::{AggregateContext, GatherOptions, RepoKind};
use codex_context::prompt::{context_size_bytes, format_bytes, render_prompt, DEFAULT_PREAMBLE};
use codex_context::summarize::{format_summary_stats, Summarizer};

/// Build budgeted multi-repository context bundles for LLM queries.
#[derive(Parser)]
#[command(name = "codex-context", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `~/.config/codex/config.toml`. A missing file means defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` wins when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gather context and print it as a prompt (or JSON with `--json`).
    Gather {
        /// Query appended to the rendered prompt.
        #[arg(long, default_value = "")]
        query: String,

        /// Print the summarized context as JSON instead of a prompt.
        #[arg(long)]
        json: bool,

        /// Override the summarization budget in bytes.
        #[arg(long)]
        budget: Option<usize>,

        /// Include the repository enclosing the working directory.
        #[arg(long)]
        current_repo: bool,

        /// Include a listing of the working directory.
        #[arg(long)]
        filesystem: bool,

        /// Skip summarization and print everything that was read.
        #[arg(long)]
        no_summarize: bool,
    },

    /// Show file and byte counts for each configured repository.
    Stats,

    /// Manage configured repositories.
    Repos {
        #[command(subcommand)]
        action: RepoAction,
    },
}

#[derive(Subcommand)]
enum RepoAction {
    /// Register a local path or remote git URL.
    Add { source: String },
    /// List configured repositories.
    List,
    /// Unregister a repository.
    Remove { source: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.unwrap_or_else(config::default_config_path);
    let mut cfg = config::load_config(&config_path)?;

    match cli.command {
        Commands::Gather {
            query,
            json,
            budget,
            current_repo,
            filesystem,
            no_summarize,
        } => {
            let opts = GatherOptions {
                include_current_repo: current_repo,
                include_filesystem: filesystem,
                working_dir: Some(std::env::current_dir().context("Failed to read working directory")?),
                ..GatherOptions::default()
            };
            let ctx = run_gather(&cfg, opts).await?;
            let ctx = if no_summarize {
                ctx
            } else {
                Summarizer::new(budget.unwrap_or(cfg.context.budget_bytes)).summarize_context(&ctx)
            };
            tracing::debug!(size = %format_bytes(context_size_bytes(&ctx) as u64), "context ready");

            if json {
                println!("{}", serde_json::to_string_pretty(&ctx)?);
            } else {
                print!("{}", render_prompt(DEFAULT_PREAMBLE, &query, &ctx));
            }
        }
        Commands::Stats => {
            let ctx = run_gather(&cfg, GatherOptions::default()).await?;
            let summarizer = Summarizer::new(cfg.context.budget_bytes);
            if ctx.configured_repos.is_empty() {
                println!("No repositories configured.");
            }
            for repo in &ctx.configured_repos {
                let Some(contents) = &repo.contents else {
                    continue;
                };
                let summary = summarizer.summarize_contents(contents);
                println!(
                    "{:<50} {}",
                    repo.source,
                    format_summary_stats(contents, Some(&summary))
                );
            }
            println!(
                "\nTotal: {}",
                format_bytes(context_size_bytes(&ctx) as u64)
            );
        }
        Commands::Repos { action } => match action {
            RepoAction::Add { source } => {
                let added = cfg.add_repo(&source)?.clone();
                cfg.save(&config_path)?;
                println!("Added {} repository: {}", kind_label(added.kind), added.source);
            }
            RepoAction::List => {
                if cfg.repos.is_empty() {
                    println!("No repositories configured.");
                }
                for repo in &cfg.repos {
                    match &repo.cache_path {
                        Some(cache) => println!(
                            "{:<7} {}  (cache: {})",
                            kind_label(repo.kind),
                            repo.source,
                            cache.display()
                        ),
                        None => println!("{:<7} {}", kind_label(repo.kind), repo.source),
                    }
                }
            }
            RepoAction::Remove { source } => {
                let removed = cfg.remove_repo(&source)?;
                cfg.save(&config_path)?;
                println!("Removed repository: {}", removed.source);
            }
        },
    }

    Ok(())
}

/// Run the blocking gather on a worker thread; Ctrl-C cancels it.
async fn run_gather(cfg: &Config, opts: GatherOptions) -> Result<AggregateContext> {
    let gatherer = Gatherer::from_config(cfg, Arc::new(GitCli::new()), Arc::new(TracingDiagnostics))?;
    let cancel = CancelToken::new();

    let signal_token = cancel.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            signal_token.cancel();
        }
    });

    let worker_token = cancel.clone();
    let result = tokio::task::spawn_blocking(move || gatherer.gather(&opts, &worker_token))
        .await
        .context("gather task panicked")?;
    signal.abort();

    Ok(result?)
}

fn kind_label(kind: RepoKind) -> &'static str {
    match kind {
        RepoKind::Local => "local",
        RepoKind::Remote => "remote",
    }
}
