use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keyrace::config::Config;
use keyrace::jobs::{JobQueue, JobWorker};
use keyrace::notifications::Mailer;
use keyrace::AppState;

#[derive(Parser, Debug)]
#[command(name = "keyrace")]
#[command(author, version, about = "Typing-practice backend", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "keyrace.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Keyrace v{}", env!("CARGO_PKG_VERSION"));

    // Ensure data directory exists
    keyrace::utils::ensure_dir(&config.server.data_dir)?;

    // Initialize database
    let db = keyrace::db::init(&config.server.data_dir).await?;

    // Seed practice texts
    keyrace::db::seed_text_snippets(&db, &config.seed.snippets_csv).await?;

    // Background job channel and worker
    let (job_tx, job_rx) = mpsc::channel(100);
    let jobs = JobQueue::new(job_tx);
    let mailer = Arc::new(Mailer::new(config.email.clone()));
    if !mailer.is_enabled() {
        tracing::warn!("SMTP not configured, notification emails will be skipped");
    }

    let worker = JobWorker::new(db.clone(), mailer.clone(), job_rx);
    tokio::spawn(async move {
        worker.run().await;
    });

    // Create app state and router
    let state = Arc::new(AppState::new(config.clone(), db, jobs, mailer));
    let app = keyrace::api::create_router(state);

    // Start API server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
