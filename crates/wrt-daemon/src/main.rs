//! wrt-daemon entry point.
//!
//! Thin: loads config, sets up tracing, and dispatches the subcommand. Jobs
//! and routes live in the library target.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};
use wrt_config::{LoadedConfig, TrackerConfig};
use wrt_daemon::{
    jobs::{CAMPAIGN_JOB, LEDGER_JOB},
    orchestrator::CycleOutcome,
    routes,
    state::{self, AppState},
    wiring,
};

#[derive(Parser)]
#[command(name = "wrt-daemon")]
#[command(about = "World record tracker: polls record providers and keeps the canonical store current", long_about = None)]
struct Cli {
    /// Layered config paths in merge order
    #[arg(long = "config", global = true, default_value = "config/base.yaml")]
    config_paths: Vec<String>,

    #[command(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the job tickers and the status endpoints (default)
    Serve,

    /// Apply SQL migrations to the canonical store
    Migrate,

    /// Run a single cycle of one job and print its report
    RunOnce {
        #[arg(long, value_enum)]
        job: JobArg,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order; defaults to the --config layers
        paths: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum JobArg {
    Ledger,
    Campaign,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();

    if let Some(Commands::ConfigHash { paths }) = &cli.cmd {
        let paths = if paths.is_empty() { &cli.config_paths } else { paths };
        let loaded = load(paths)?;
        println!("config_hash={}", loaded.config_hash);
        println!("{}", loaded.canonical_json);
        return Ok(());
    }

    let loaded = load(&cli.config_paths)?;
    let cfg = loaded.typed()?;
    init_tracing(&cfg.daemon.log_level);
    info!(config_hash = %loaded.config_hash, "config loaded");

    match cli.cmd.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&cfg).await,
        Commands::Migrate => migrate(&cfg).await,
        Commands::RunOnce { job } => run_once(&cfg, job).await,
        Commands::ConfigHash { .. } => Ok(()),
    }
}

fn load(paths: &[String]) -> Result<LoadedConfig> {
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    wrt_config::load_layered_yaml(&refs)
}

fn init_tracing(fallback: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .init();
}

async fn migrate(cfg: &TrackerConfig) -> Result<()> {
    let url = std::env::var(&cfg.database.url_env)
        .with_context(|| format!("missing env var {}", cfg.database.url_env))?;
    let pool = wrt_db::connect(&url, wiring::canonical_pool_settings(cfg)).await?;
    wrt_db::migrate(&pool).await?;
    info!("migrations applied");
    Ok(())
}

async fn run_once(cfg: &TrackerConfig, job: JobArg) -> Result<()> {
    let secrets = wrt_config::resolve_secrets(cfg)?;
    let engine = wiring::build_engine(cfg, &secrets).await?;

    let outcome = match job {
        JobArg::Ledger => {
            let orch = engine
                .ledger
                .with_context(|| format!("job '{LEDGER_JOB}' has no enabled source"))?;
            orch.run_cycle().await?
        }
        JobArg::Campaign => {
            let orch = engine
                .campaign
                .with_context(|| format!("job '{CAMPAIGN_JOB}' is disabled"))?;
            orch.run_cycle().await?
        }
    };

    match outcome {
        CycleOutcome::Completed(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        CycleOutcome::Skipped(reason) => println!("skipped: {reason:?}"),
    }
    Ok(())
}

async fn serve(cfg: &TrackerConfig) -> Result<()> {
    // start the uptime clock
    let _ = routes::uptime_secs();
    let secrets = wrt_config::resolve_secrets(cfg)?;
    info!(?secrets, "secrets resolved");
    let engine = wiring::build_engine(cfg, &secrets).await?;
    let shared = Arc::new(AppState::new());

    if let Some(orch) = engine.ledger {
        let every = std::time::Duration::from_secs(cfg.jobs.ledger.interval_secs);
        state::spawn_ticker(orch, Arc::clone(&shared), every);
    }
    if let Some(orch) = engine.campaign {
        let every = std::time::Duration::from_secs(cfg.jobs.campaign.interval_secs);
        state::spawn_ticker(orch, Arc::clone(&shared), every);
    }

    let app = routes::build_router(Arc::clone(&shared)).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    let addr: SocketAddr = cfg
        .daemon
        .bind
        .parse()
        .with_context(|| format!("invalid daemon.bind '{}'", cfg.daemon.bind))?;
    info!("wrt-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .context("server crashed")?;

    Ok(())
}
