use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{PositionError, validation::ValidationError};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Position(#[from] PositionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("The database is not ready to accept connections")]
    NotReady,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) | ApiError::Database(sqlx::Error::RowNotFound) => {
                StatusCode::NOT_FOUND
            }
            ApiError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Position(err) => match err {
                PositionError::Validation(_) | PositionError::DestinationOutOfRange { .. } => {
                    StatusCode::BAD_REQUEST
                }
                PositionError::ContainerNotFound { .. } | PositionError::ItemNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                PositionError::StaleSource { .. } | PositionError::InconsistentPositions(_) => {
                    StatusCode::CONFLICT
                }
                PositionError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "Request failed");
            "Internal server error".to_string()
        } else {
            if status == StatusCode::CONFLICT {
                tracing::warn!(error = %self, "Rejected conflicting position write");
            }
            self.to_string()
        };

        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}
