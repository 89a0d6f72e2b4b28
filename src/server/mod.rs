//! RagShield HTTP server.
//!
//! JSON API over the guarded/unguarded pipeline:
//! - Chat (guardrails on or off per request)
//! - Document ingestion and clearing
//! - Security event log queries
//!
//! # Example
//!
//! ```rust,ignore
//! use ragshield::config::Config;
//! use ragshield::server::{run, ServerConfig};
//!
//! let server_config = ServerConfig::default().with_port(8000);
//! run(Config::default(), server_config).await?;
//! ```

mod config;
mod handlers;
mod state;

use std::sync::Arc;

pub use config::ServerConfig;
pub use handlers::{create_router, health_check};
pub use state::AppState;

use crate::error::{RagError, Result};

/// Build state, bind, and serve until shutdown.
pub async fn run(app_config: crate::config::Config, config: ServerConfig) -> Result<()> {
    let addr = config.addr;
    let state = Arc::new(AppState::new(app_config, config)?);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, router)
        .await
        .map_err(|e| RagError::Server(e.to_string()))
}
