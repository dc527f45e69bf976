use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{AppState, error::ApiError};

/// Reject requests with 503 until the database is ready.
pub async fn require_ready(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.is_ready() {
        tracing::debug!(uri = %request.uri(), "Rejecting request, database not ready");
        return ApiError::NotReady.into_response();
    }
    next.run(request).await
}
