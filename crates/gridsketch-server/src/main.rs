//! GridSketch HTTP server
//!
//! Holds the live drawing document for editors and automation clients,
//! stores PNG exports and saved drawings on disk.
//!
//! ## Environment
//!
//! - `PORT`: listen port (default 3000)
//! - `GRIDSKETCH_DATA_DIR`: directory for `saves/` and `exports/` (default `./data`)
//! - `RUST_LOG`: tracing filter

mod config;
mod error;
mod routes;
mod state;

use config::ServerConfig;
use error::StartupError;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridsketch_server=info,tower_http=info".into()),
        )
        .init();

    if let Err(e) = run(ServerConfig::from_env()).await {
        error!("server stopped: {e}");
        std::process::exit(1);
    }
}

async fn run(config: ServerConfig) -> Result<(), StartupError> {
    let state = Arc::new(AppState::new(&config)?);
    let app = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("GridSketch server listening on {}", addr);
    info!("data directory: {}", config.data_dir.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
