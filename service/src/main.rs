//! `countdown-service` entry point.
//!
//! ## Modes
//!
//! - **`serve`** (default): load settings, check the record once, bind the
//!   HTTP listener and serve until Ctrl+C.
//! - **`check`**: load and validate the record, print a summary, exit
//!   non-zero on failure.
//! - **`init`**: write a template record if none exists yet.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use countdown_service::http::{self, CorsPolicy};
use countdown_service::model::{EventConfig, canonical_instant};
use countdown_service::service::ConfigService;
use countdown_service::settings::ServiceSettings;
use countdown_service::store::{ConfigStore, JsonFileStore};

#[derive(Debug, Parser)]
#[command(name = "countdown-service", version, about = "Single-record event countdown service")]
struct Cli {
    /// Settings file (overrides COUNTDOWN_CONFIG).
    #[arg(long = "config", short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Listen port (overrides settings and PORT).
    #[arg(long = "port", short = 'p', global = true)]
    port: Option<u16>,

    /// Record path (overrides settings and COUNTDOWN_DATA_PATH).
    #[arg(long = "data", short = 'd', global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,
    /// Validate the stored record and print a summary.
    Check,
    /// Write a template record if none exists.
    Init,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut settings = ServiceSettings::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(data) = cli.data {
        settings.store.path = data;
    }
    settings.validate()?;

    let store = Arc::new(JsonFileStore::new(settings.store.path.clone()));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_service(settings, store),
        Command::Check => check(&store),
        Command::Init => init(&store),
    }
}

fn check(store: &JsonFileStore) -> anyhow::Result<()> {
    let config = store
        .load()
        .with_context(|| format!("record at {} is not usable", store.path().display()))?;
    let details = &config.event_details;
    println!("record:         {}", store.path().display());
    println!("title:          {}", details.title);
    println!("target:         {}", canonical_instant(&details.target_instant));
    println!("timezone:       {}", details.timezone);
    println!("updatesAllowed: {}", config.settings.updates_allowed);
    println!(
        "lastUpdated:    {}",
        canonical_instant(&config.settings.last_updated)
    );
    Ok(())
}

fn init(store: &JsonFileStore) -> anyhow::Result<()> {
    if store.exists() {
        println!(
            "record already exists at {}, leaving it untouched",
            store.path().display()
        );
        return Ok(());
    }
    store
        .save(&EventConfig::template(Utc::now()))
        .with_context(|| format!("failed to write template to {}", store.path().display()))?;
    println!("wrote template record to {}", store.path().display());
    Ok(())
}

#[tokio::main]
async fn run_service(settings: ServiceSettings, store: Arc<JsonFileStore>) -> anyhow::Result<()> {
    tracing::info!(
        "countdown-service v{} starting",
        countdown_service::SERVICE_VERSION
    );

    // The record is provisioned out-of-band; a bad one is reported but does
    // not stop the listener, so /health keeps answering.
    match store.load() {
        Ok(config) => tracing::info!(
            path = %store.path().display(),
            target = %canonical_instant(&config.event_details.target_instant),
            updates_allowed = config.settings.updates_allowed,
            "event record loaded"
        ),
        Err(e) => tracing::error!(path = %store.path().display(), "event record unusable: {e}"),
    }

    let service = Arc::new(ConfigService::new(store));
    let cors = Arc::new(CorsPolicy::new(settings.cors.allowed_origins.clone()));
    let workers = settings.server.workers;

    let bind_addr = settings.server.bind_addr();
    let server = Arc::new(
        tiny_http::Server::http(&bind_addr)
            .map_err(|e| anyhow::anyhow!("failed to bind {bind_addr}: {e}"))?,
    );
    tracing::info!("{} listening on http://{bind_addr}", countdown_service::SERVICE_NAME);

    let serve_server = Arc::clone(&server);
    let serving = tokio::task::spawn_blocking(move || {
        http::serve(serve_server, service, cors, workers);
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Signal received, shutting down");

    http::shutdown(&server, workers);
    serving.await.context("http workers panicked")?;

    tracing::info!("countdown-service exiting cleanly");
    Ok(())
}
