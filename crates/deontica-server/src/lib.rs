//! Deontica Server
//!
//! HTTP API and command line front end for the clause pipeline: chat,
//! clause browsing and editing, export, and the clause dependency graph.

#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod graph;
pub mod handlers;

use handlers::{create_router, AppState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Model client could not be created
    #[error("LLM client error: {0}")]
    Llm(#[from] deontica_llm::LlmError),

    /// Database could not be opened
    #[error("Store error: {0}")]
    Store(#[from] deontica_store::StoreError),

    /// Vector index could not be opened
    #[error("Index error: {0}")]
    Index(#[from] deontica_store::IndexError),

    /// Pipeline could not be built
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] deontica_pipeline::PipelineError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Initialize logging; `RUST_LOG` overrides the default `info` level
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second initialization (e.g. in tests) is harmless.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Serve the HTTP API until the process is stopped
pub async fn start_server(state: AppState, bind_addr: &str) -> Result<(), ServerError> {
    info!("Starting Deontica server");
    info!("Vector backend: {}", state.vector_backend);
    info!("Chat model: {}", state.assistant.model_name());

    let app = create_router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    info!("Listening on {}", bind_addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    Ok(())
}
