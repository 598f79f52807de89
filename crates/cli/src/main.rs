mod metrics;
mod state;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use propalert_core::{load_config, RunPolicy, SearchOutcome};

use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Watch saved property searches and announce new listings.
#[derive(Debug, Parser)]
#[command(name = "propalert", version)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "PROPALERT_CONFIG", default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan every outstanding search once
    Run {
        /// Print Prometheus metrics after the run
        #[arg(long)]
        print_metrics: bool,

        /// Announce listings found on a search's first run
        #[arg(long)]
        notify_first_run: bool,
    },

    /// Manage outstanding searches
    Searches {
        #[command(subcommand)]
        action: SearchesCommand,
    },

    /// Show stored state for every outstanding search
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the store is reachable
    Ping,
}

#[derive(Debug, Subcommand)]
enum SearchesCommand {
    /// Start watching a search URL
    Add { url: String },

    /// Stop watching a search URL
    Remove {
        url: String,

        /// Also delete the search's seen listings and scan history
        #[arg(long)]
        forget: bool,
    },

    /// List watched search URLs
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!(version = VERSION, "Loading configuration from {:?}", cli.config);
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

    let state = AppState::new(config)?;
    let sanitized = serde_json::to_string(&state.sanitized_config()).unwrap_or_default();
    info!(config = %sanitized, "Configuration loaded");

    let result = dispatch(&state, cli.command).await;
    state.close().await?;
    result
}

async fn dispatch(state: &AppState, command: Command) -> Result<()> {
    match command {
        Command::Run {
            print_metrics,
            notify_first_run,
        } => {
            let mut policy = RunPolicy::from(&state.config().run);
            policy.notify_on_first_run |= notify_first_run;

            let runner = state.runner()?;
            let report = runner.run_once(policy).await?;

            for outcome in &report.outcomes {
                match outcome {
                    SearchOutcome::Scanned {
                        url,
                        found,
                        new,
                        first_run,
                        ..
                    } => println!(
                        "ok      {:>4} found {:>4} new{}  {}",
                        found,
                        new,
                        if *first_run { " (first run)" } else { "" },
                        url
                    ),
                    SearchOutcome::Failed { url, error } => {
                        println!("failed  {}  {}", url, error)
                    }
                }
            }
            if let Some(e) = &report.notification_error {
                println!("notification failed: {}", e);
            }

            if print_metrics {
                print!("{}", metrics::gather_text());
            }
            if !report.outcomes.is_empty() && report.failed_count() == report.outcomes.len() {
                bail!("all {} searches failed", report.outcomes.len());
            }
            Ok(())
        }

        Command::Searches { action } => match action {
            SearchesCommand::Add { url } => {
                url::Url::parse(&url).with_context(|| format!("Not a valid URL: {}", url))?;
                state.registry().add(&url).await?;
                println!("added {}", url);
                Ok(())
            }
            SearchesCommand::Remove { url, forget } => {
                state.registry().remove(&url).await?;
                if forget {
                    state.store().forget(&url).await?;
                }
                println!("removed {}", url);
                Ok(())
            }
            SearchesCommand::List => {
                let mut searches: Vec<String> =
                    state.registry().list().await?.into_iter().collect();
                searches.sort();
                for url in searches {
                    println!("{}", url);
                }
                Ok(())
            }
        },

        Command::Status { json } => {
            let mut searches: Vec<String> = state.registry().list().await?.into_iter().collect();
            searches.sort();
            let metadata = state.store().all_metadata(&searches).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&metadata)?);
            } else {
                for meta in metadata {
                    println!(
                        "{}  {:>5} seen  created {}  last scan {}  {}",
                        meta.fingerprint.short(),
                        meta.property_count,
                        meta.created_at
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| "never".to_string()),
                        meta.last_scan.label(),
                        meta.search_url
                    );
                }
            }
            Ok(())
        }

        Command::Ping => {
            state
                .store()
                .backend()
                .ping()
                .await
                .context("Store ping failed")?;
            println!("ok ({})", state.store().backend().name());
            Ok(())
        }
    }
}
