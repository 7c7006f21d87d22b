//! Payroll engine HTTP server.
//!
//! Reads its settings from the environment (a `.env` file is honoured):
//!
//! - `PAYROLL_CONFIG_DIR`: configuration directory, default `./config`
//! - `PAYROLL_BIND_ADDR`: listen address, default `0.0.0.0:3000`
//! - `PAYROLL_WORKERS`: bulk-run worker pool size, default 8
//! - `PAYROLL_LOG_LEVEL`: tracing filter, default `info`

use std::env;
use std::net::SocketAddr;

use tracing::info;
use tracing_subscriber::EnvFilter;

use payroll_engine::api::{AppState, create_router};
use payroll_engine::config::ConfigLoader;
use payroll_engine::engine::EngineSettings;

const DEFAULT_CONFIG_DIR: &str = "./config";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    let log_level = env::var("PAYROLL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .with_target(false)
        .init();

    let config_dir = env::var("PAYROLL_CONFIG_DIR").unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());
    let bind_addr: SocketAddr = env::var("PAYROLL_BIND_ADDR")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
        .parse()?;
    let mut settings = EngineSettings::default();
    if let Ok(workers) = env::var("PAYROLL_WORKERS") {
        settings.worker_count = workers.parse()?;
    }

    let config = ConfigLoader::load(&config_dir)?;
    let router = create_router(AppState::new(config, settings));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(
        bind_addr = %bind_addr,
        config_dir = %config_dir,
        workers = settings.worker_count,
        "Payroll engine listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
