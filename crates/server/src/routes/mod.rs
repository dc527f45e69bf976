use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower_http::trace::TraceLayer;

use crate::{AppState, middleware::require_ready};

pub mod boards;
pub mod columns;
pub mod health;
pub mod tasks;

pub fn router(state: AppState) -> Router {
    // Everything except the health check waits for the database
    let gated = Router::new()
        .merge(boards::router(&state))
        .merge(columns::router(&state))
        .merge(tasks::router(&state))
        .layer(from_fn_with_state(state.clone(), require_ready));

    let api = Router::new()
        .route("/health", get(health::health_check))
        .merge(gated)
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}
