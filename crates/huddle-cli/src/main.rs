//! huddle - consensus predictions from a panel of agents
//!
//! ## Commands
//!
//! - `predict`: Poll every agent for one matchup and print the consensus
//! - `health`: Probe every agent once and print the health report
//! - `watch`: Keep probing agents on an interval until interrupted

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use huddle_core::{Orchestrator, OrchestratorConfig, PredictError, PredictionRequest, METRICS};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(author = "Huddle Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Consensus matchup predictions from independent agents", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML config file (default: environment variables)
    #[arg(short, long, global = true, env = "HUDDLE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Predict the winner of one matchup
    Predict {
        #[arg(long)]
        game_id: i64,

        /// Home team name
        #[arg(long)]
        home: String,

        /// Away team name
        #[arg(long)]
        away: String,

        /// Kickoff time, RFC 3339 (default: now)
        #[arg(long)]
        time: Option<String>,

        #[arg(long)]
        venue: Option<String>,

        /// Game is played indoors
        #[arg(long)]
        dome: bool,

        /// Leave agent reasoning out of the consensus text
        #[arg(long)]
        no_reasoning: bool,

        /// Forwarded to agents unchanged
        #[arg(long, default_value_t = 0.0)]
        confidence_threshold: f64,

        /// Call every agent even if it would fail a health probe
        #[arg(long)]
        skip_health_check: bool,
    },

    /// Probe every agent once
    Health,

    /// Probe agents periodically until Ctrl-C
    Watch {
        /// Seconds between sweeps (default: from config)
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    huddle_core::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;
    let orchestrator =
        Orchestrator::from_config(&config).context("Failed to build orchestrator")?;

    run(cli.command, &orchestrator, &config).await
}

/// Run one command, then report the process counters.
async fn run(command: Commands, orchestrator: &Orchestrator, config: &OrchestratorConfig) -> Result<()> {
    let outcome = match command {
        Commands::Predict {
            game_id,
            home,
            away,
            time,
            venue,
            dome,
            no_reasoning,
            confidence_threshold,
            skip_health_check,
        } => {
            let kickoff = parse_kickoff(time.as_deref())?;
            let mut request = PredictionRequest::new(game_id, home, away, kickoff)
                .with_dome(dome)
                .with_reasoning(!no_reasoning)
                .with_confidence_threshold(confidence_threshold);
            if let Some(venue) = venue {
                request = request.with_venue(venue);
            }
            cmd_predict(orchestrator, request, !skip_health_check).await
        }
        Commands::Health => cmd_health(orchestrator).await,
        Commands::Watch { interval_secs } => {
            let interval = interval_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.health.interval());
            cmd_watch(orchestrator, interval).await
        }
    };
    METRICS.flush();
    outcome
}

fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig> {
    match path {
        Some(path) => OrchestratorConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => OrchestratorConfig::from_env().context("Invalid HUDDLE_* environment"),
    }
}

fn parse_kickoff(raw: Option<&str>) -> Result<DateTime<Utc>> {
    match raw {
        Some(raw) => Ok(DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("Invalid --time '{raw}', expected RFC 3339"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

/// Token cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            trigger.cancel();
        }
    });
    cancel
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render JSON")?;
    println!("{rendered}");
    Ok(())
}

async fn cmd_predict(
    orchestrator: &Orchestrator,
    request: PredictionRequest,
    check_health: bool,
) -> Result<()> {
    let cancel = cancel_on_ctrl_c();
    if check_health {
        let report = orchestrator.check_health().await;
        if !report.unhealthy_agents.is_empty() {
            warn!(
                unhealthy = ?report.unhealthy_agents,
                "some agents are down and will be excluded"
            );
        }
    }

    let game_id = request.game_id;
    let consensus = match orchestrator.predict_with_cancel(request, &cancel).await {
        Ok(consensus) => consensus,
        Err(PredictError::Cancelled) => anyhow::bail!("Prediction for game {game_id} cancelled"),
        Err(e) => return Err(e).context("Prediction failed"),
    };

    print_json(&consensus)
}

async fn cmd_health(orchestrator: &Orchestrator) -> Result<()> {
    let report = orchestrator.check_health().await;
    print_json(&report)?;
    if !report.all_healthy {
        info!(
            healthy = report.healthy_count(),
            unhealthy = report.unhealthy_count(),
            "not every agent is healthy"
        );
    }
    Ok(())
}

async fn cmd_watch(orchestrator: &Orchestrator, interval: Duration) -> Result<()> {
    anyhow::ensure!(!interval.is_zero(), "--interval-secs must be positive");
    let cancel = cancel_on_ctrl_c();
    info!(interval_secs = interval.as_secs(), "watching agent health");

    let monitor = orchestrator.spawn_health_monitor(interval, cancel.clone());
    cancel.cancelled().await;
    monitor.await.context("Health monitor task panicked")?;

    print_json(&orchestrator.health().report())
}
