// MasteryHub Gateway - Main Entry Point
//
// This is the backend service that:
// - Gates every upstream API call behind the key's rate limits
// - Caches upstream responses with per-method TTLs
// - Tracks per-champion highscores and saves them on a timer

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mastery_hub::config::Config;
use mastery_hub::gateway::Gateway;
use mastery_hub::highscores::{HighscoreStore, TracingNotifier};
use mastery_hub::metrics;
use mastery_hub::upstream::{HttpUpstream, UpstreamClient};

/// MasteryHub: rate-limited stats gateway with highscore tracking
#[derive(Parser, Debug)]
#[command(name = "mastery-hub")]
#[command(author = "MasteryHub Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Upstream API gateway with response caching and highscores", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to a configuration file (default: XDG config directory)
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the gateway with its background save and sweep loops
    Run,
    /// Validate the configuration and exit
    CheckConfig,
    /// Resolve one summoner by name and print their mastery standings
    Lookup {
        /// Summoner display name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        config.log_level()?
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    match config.logging.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        "pretty" => tracing_subscriber::fmt().with_env_filter(filter).pretty().init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).compact().init(),
    }

    match args.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::CheckConfig => {
            // Loading already validated; print a summary.
            info!(
                application_windows = config.rate_limits.application.len(),
                methods = config.rate_limits.method.len(),
                track = config.highscores.track,
                display = config.highscores.display,
                "configuration is valid"
            );
            Ok(())
        }
        Commands::Lookup { name } => lookup(config, &name).await,
    }
}

/// Build the gateway from configuration, loading persisted highscores
async fn build_gateway(config: &Config) -> Result<Gateway> {
    if config.upstream.api_key.is_empty() {
        warn!("no upstream API key configured; set MASTERYHUB_API_KEY");
    }

    let notifier = Arc::new(TracingNotifier::new(
        config.highscores.log_rank_changes,
        config.highscores.log_value_updates,
    ));
    let highscores = Arc::new(HighscoreStore::open(&config.highscores, notifier).await);
    let upstream: Arc<dyn UpstreamClient> =
        Arc::new(HttpUpstream::new(&config.upstream).context("Failed to build upstream client")?);

    Gateway::new(config, upstream, highscores).context("Failed to build gateway")
}

/// Run the gateway until interrupted
async fn run(config: Config) -> Result<()> {
    metrics::init().context("Failed to initialize metrics")?;
    if config.metrics.enabled {
        let port = config.metrics.port;
        tokio::spawn(async move {
            if let Err(e) = metrics::serve(port).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    let gateway = Arc::new(build_gateway(&config).await?);
    info!("MasteryHub gateway started");

    // Periodic highscore save
    let save_loop = {
        let highscores = Arc::clone(gateway.highscores());
        let every = Duration::from_secs(config.highscores.save_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // immediate first tick
            loop {
                ticker.tick().await;
                // A failed save is logged inside and retried next tick.
                let _ = highscores.save().await;
            }
        })
    };

    // Periodic cache sweep
    let sweep_loop = {
        let cache = Arc::clone(gateway.cache());
        let every = Duration::from_secs(config.cache.sweep_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.sweep_expired();
            }
        })
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down, saving highscores");
    save_loop.abort();
    sweep_loop.abort();

    // Final save so nothing since the last tick is lost.
    if let Err(e) = gateway.highscores().save().await {
        error!("Final highscore save failed: {}", e);
    }
    Ok(())
}

/// One-off lookup from the command line
async fn lookup(config: Config, name: &str) -> Result<()> {
    let gateway = build_gateway(&config).await?;
    let lookup = gateway
        .lookup(name)
        .await
        .with_context(|| format!("Lookup for '{}' failed", name))?;

    println!(
        "{} ({} champions, {} total points)",
        lookup.summoner.name,
        lookup.masteries.len(),
        lookup.total_points
    );
    for mastery in lookup.masteries.iter().take(10) {
        println!(
            "  champion {:>5}  {:>10} pts",
            mastery.champion_id, mastery.champion_points
        );
    }

    gateway.highscores().save().await?;
    Ok(())
}
