use db::{DBService, MoveStrategy};
use server::{AppState, file_logging, routes};
use sqlx::Error as SqlxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskTilesError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlx(#[from] SqlxError),
}

#[tokio::main]
async fn main() -> Result<(), TaskTilesError> {
    // Load .env file if present (for development)
    dotenvy::dotenv().ok();

    // The guard must be held for the lifetime of the application to flush logs
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _file_log_guard = file_logging::init_logging(&log_level);

    let db = DBService::new().await?;
    let state = AppState::new(db, MoveStrategy::from_env());
    let app_router = routes::router(state.clone());

    let port = std::env::var("BACKEND_PORT")
        .or_else(|_| std::env::var("PORT"))
        .ok()
        .and_then(|s| s.trim().parse::<u16>().ok())
        .unwrap_or_else(|| {
            tracing::info!("No PORT environment variable set, using port 0 for auto-assignment");
            0
        });

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    let actual_port = listener.local_addr()?.port();

    state.probe_database().await?;
    tracing::info!("Server running on http://{host}:{actual_port}");

    let shutdown_state = state.clone();
    axum::serve(listener, app_router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Requests still in flight finish; new ones get 503
            shutdown_state.set_ready(false);
            tracing::info!("Shutdown signal received, draining requests");
        })
        .await?;

    perform_cleanup_actions(&state).await;
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let terminate = async {
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
            } else {
                tracing::error!("Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}

pub async fn perform_cleanup_actions(state: &AppState) {
    // After this point the database file is consistent on its own
    tracing::info!("Running final WAL checkpoint...");
    match state.db().checkpoint().await {
        Ok(()) => {
            tracing::info!("Final WAL checkpoint completed - all data flushed to main database")
        }
        Err(e) => tracing::warn!(
            "Final WAL checkpoint failed (data may still be in WAL): {}",
            e
        ),
    }

    tracing::info!("Closing database connection pool...");
    state.pool().close().await;
    tracing::info!("Database connection pool closed");
}
