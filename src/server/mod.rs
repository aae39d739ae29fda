//! Kolosal Churn Server Module
//!
//! JSON API over a shared [`DashboardSession`](crate::dashboard::DashboardSession):
//! list the visible models and run dashboard passes on request.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use crate::config::DashboardConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub dashboard: DashboardConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            dashboard: DashboardConfig::default(),
        }
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let started = Instant::now();
    info!(
        data_path = %config.dashboard.data_path.display(),
        models_dir = %config.dashboard.models_dir.display(),
        "Initializing dashboard session"
    );

    if !config.dashboard.data_path.exists() {
        warn!(path = %config.dashboard.data_path.display(), "Data file not found, scoring requests will fail");
    }
    if !config.dashboard.models_dir.is_dir() {
        warn!(dir = %config.dashboard.models_dir.display(), "Models folder not found, no models will be listed");
    }

    let state = Arc::new(AppState::new(config.dashboard.clone())?);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(host = %config.host, port = config.port, address = %addr, "Kolosal Churn Server starting");
    info!(url = %format!("http://{}/api", addr), "REST API available");
    info!(url = %format!("http://{}/api/health", addr), "Health endpoint available");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl+c");
            return;
        }
        info!(
            uptime_secs = started.elapsed().as_secs(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(!config.host.is_empty());
        assert_eq!(config.dashboard.top_churners, 50);
    }
}
