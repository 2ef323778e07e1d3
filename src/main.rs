use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use jotter::config::{Cli, Config};
use jotter::db;
use jotter::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let instance_dir = Config::instance_dir(&cli);
    std::fs::create_dir_all(&instance_dir)?;
    tracing::info!("Instance directory: {}", instance_dir.display());

    let config = Config::load(&cli)?;
    if config.uses_default_credentials() {
        tracing::warn!("Using the default secret key or admin password; set SECRET_KEY and ADMIN_PASSWORD");
    }

    // Ensure media directories exist
    std::fs::create_dir_all(config.uploads_path())?;
    std::fs::create_dir_all(config.cloud_path())?;

    // Initialize database
    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;

    let state = AppState::new(pool, config.clone());
    let app = jotter::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
