//! Polling backend: users register and log in, create multiple-choice,
//! true/false or comment polls, vote once per poll, and read tallies whose
//! disclosure the poll owner controls.
//!
//! # Layout
//!
//! - [`validation`]: pure input rules for polls and ballots
//! - [`poll`]: creation, update, soft delete, visibility toggle, listing
//! - [`vote`]: one vote per user per open poll
//! - [`results`]: on-demand tallies behind the visibility/expiry policy
//! - [`store`]: repository traits with Postgres and in-memory backends
//! - [`accounts`]: registration, login and bearer-token resolution
//! - [`routes`] / [`handlers`]: the HTTP surface
//!
//! # Running
//!
//! ```sh
//! DATABASE_URL=postgres://localhost/polls RUST_LOG=info cargo run
//! ```
//!
//! Or without a database:
//!
//! ```sh
//! STORE_BACKEND=memory RUST_LOG=debug cargo run
//! ```

use std::sync::Arc;

use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

pub mod accounts;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod poll;
pub mod results;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;
pub mod vote;

use config::{Config, ConfigError, StoreBackend};
use state::AppState;
use store::{MemoryStore, PgStore, Store};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub async fn start_server() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::load()?;

    match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .clone()
                .ok_or(ConfigError::Missing {
                    key: "DATABASE_URL",
                })?;

            info!("Connecting to Postgres...");
            let store = PgStore::connect(&database_url, config.max_connections).await?;
            serve(AppState::new(store, config)).await
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store, data will not survive a restart");
            serve(AppState::new(MemoryStore::new(), config)).await
        }
    }
}

async fn serve<S: Store>(state: Arc<AppState<S>>) -> Result<(), BoxError> {
    let address = format!("0.0.0.0:{}", state.config.port);
    let app = routes::create_routes(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {e}");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
