use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use geopull::source::DriverRegistry;
use geopull::{http, Config, SyncService};

#[derive(Parser)]
#[command(name = "geopull")]
#[command(about = "Synchronization daemon pulling vector geodata into PostgreSQL/PostGIS")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, short = 'c', env = "GEOPULL_CONFIG")]
    config: PathBuf,

    /// Override the HTTP listen address from the configuration file
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geopull=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = Arc::new(Config::from_file(&args.config)?);
    let listen = args.listen.unwrap_or_else(|| config.http.listen.clone());

    tracing::info!(
        "starting with {} workers and {} configured layers",
        config.workers,
        config.layers.len()
    );

    let driver = Arc::new(DriverRegistry::with_builtin_drivers());
    let service = SyncService::start(config, driver);

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    tracing::info!("listening on {listen}");

    axum::serve(listener, http::router(service.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("could not install the shutdown signal handler: {e}");
    }
}
