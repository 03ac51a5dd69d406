//! CipherSwarm server entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use cipherswarm::bootstrap;
use cipherswarm::infrastructure::config::ConfigLoader;
use cipherswarm::infrastructure::database::DatabaseConnection;
use cipherswarm::infrastructure::logging;

#[derive(Parser)]
#[command(name = "cipherswarm", about = "CipherSwarm agent control plane", version)]
struct Cli {
    /// Path to a configuration file (defaults to cipherswarm.yaml)
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server and the maintenance loop
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    logging::init(&config.logging)?;
    let config = Arc::new(config);

    match cli.command {
        Commands::Serve => serve(config).await,
    }
}

async fn serve(config: Arc<cipherswarm::domain::models::Config>) -> Result<()> {
    let database_url = format!("sqlite:{}", config.database.path);
    let db = DatabaseConnection::new(&database_url, config.database.max_connections)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.context("Failed to run migrations")?;

    let app = bootstrap::build(config.clone(), db.pool().clone());

    // Maintenance loop runs beside the server until shutdown.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let maintenance = tokio::spawn(app.maintenance.clone().run_loop(shutdown_rx));

    let router = cipherswarm::api::router(app.state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_address))?;
    info!(address = %config.server.bind_address, "server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    let _ = maintenance.await;
    db.close().await;
    Ok(())
}
