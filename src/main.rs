//! Bookshelf Server
//!
//! A self-hosted PDF bookshelf: serves a catalog of books, generates cover
//! thumbnails, and runs fit-to-container reader sessions over MuPDF.

use std::net::SocketAddr;

use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookshelf_server::config::Config;
use bookshelf_server::routes;
use bookshelf_server::shelf::load_catalog;
use bookshelf_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookshelf_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Bookshelf Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Shelf directory: {}", config.shelf.dir.display());

    // Create application state (initializes the MuPDF engine)
    let state = AppState::new(config.clone());

    // Initial catalog scan; a missing or broken catalog leaves the shelf
    // empty and the server running
    match load_catalog(&config.shelf.dir).await {
        Ok(books) => {
            let count = books.len();
            for book in books {
                state.shelf().insert(book).await;
            }
            tracing::info!("Shelf initialized with {} books", count);
        }
        Err(e) => {
            tracing::warn!("Catalog load failed: {}. Starting with an empty shelf", e);
        }
    }

    // Build router
    let app = routes::app(state.clone());

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Bookshelf Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
