//! Heartbeat service entry point.
//!
//! Parses CLI arguments, loads configuration (TOML file plus environment),
//! initializes tracing, builds the database pool, and serves HTTP until a
//! termination signal arrives.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use heartbeat::config::{AppConfig, LogFormat, DEFAULT_LOG_FILTER};
use heartbeat::http::{start_server, ShutdownCoordinator};
use heartbeat::routes::create_router;
use heartbeat::state::AppState;
use heartbeat::store::{DataStore, PgStore};

/// Heartbeat: status and database health probes over HTTP
#[derive(Parser, Debug)]
#[command(name = "heartbeat", version, about)]
struct Args {
    /// Path to an optional TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Log level filter (e.g., "heartbeat=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,

    /// Listen port, overriding config and PORT
    #[arg(short, long)]
    port: Option<u16>,
}

fn init_tracing(filter: &str, format: LogFormat) {
    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(filter));
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Failures before tracing is set up (config errors) go to stderr.
            if tracing::dispatcher::has_been_set() {
                tracing::error!(error = %e, "Fatal error");
            } else {
                eprintln!("heartbeat: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is normal outside local development
    let _ = dotenvy::dotenv();

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.http.port = port;
    }

    init_tracing(&log_filter, config.log_format());

    tracing::info!(
        service = %config.service.name,
        environment = %config.environment,
        database = %config.database.redacted_url(),
        probe_timeout_ms = config.database.probe_timeout_ms,
        "Loaded configuration"
    );

    let store: Arc<dyn DataStore> = Arc::new(PgStore::connect_lazy(&config.database)?);
    let coordinator = ShutdownCoordinator::new();

    let state = AppState::new(config.clone(), store.clone());
    let app = create_router(state);

    start_server(app, &config, store.as_ref(), &coordinator).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
