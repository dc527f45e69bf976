use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::{
    PositionUpdate,
    models::{
        column::{Column, MoveColumn, UpdateColumn},
        task::Task,
    },
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, middleware::load_column_middleware};

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct TaskPositionsRequest {
    pub task_positions: Vec<PositionUpdate>,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct TaskCountResponse {
    pub task_count: i64,
}

pub async fn get_column(
    Extension(column): Extension<Column>,
) -> Result<ResponseJson<ApiResponse<Column>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(column)))
}

/// PUT /api/columns/{column_id} - rename only, the position is untouched
pub async fn update_column(
    Extension(column): Extension<Column>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateColumn>,
) -> Result<ResponseJson<ApiResponse<Column>>, ApiError> {
    let updated = Column::update(state.pool(), column.id, &payload)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("column {} not found", column.id)))?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

/// DELETE /api/columns/{column_id} - drops its tasks and compacts the board
pub async fn delete_column(
    Extension(column): Extension<Column>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    Column::delete(state.pool(), column.id).await?;
    tracing::info!(column_id = %column.id, board_id = %column.board_id, "Deleted column");
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/columns/{column_id}/move - reorder within the board
pub async fn move_column(
    Extension(column): Extension<Column>,
    State(state): State<AppState>,
    Json(payload): Json<MoveColumn>,
) -> Result<ResponseJson<ApiResponse<Vec<Column>>>, ApiError> {
    Column::move_to(
        state.pool(),
        column.id,
        column.board_id,
        &payload,
        state.move_strategy(),
    )
    .await?;
    let columns = Column::find_by_board_id(state.pool(), column.board_id).await?;
    Ok(ResponseJson(ApiResponse::success(columns)))
}

pub async fn get_column_tasks(
    Extension(column): Extension<Column>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = Task::find_by_column_id(state.pool(), column.id).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_column_task_count(
    Extension(column): Extension<Column>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<TaskCountResponse>>, ApiError> {
    let task_count = Column::task_count(state.pool(), column.id).await?;
    Ok(ResponseJson(ApiResponse::success(TaskCountResponse {
        task_count,
    })))
}

/// PUT /api/columns/{column_id}/tasks/positions
pub async fn update_task_positions(
    Extension(column): Extension<Column>,
    State(state): State<AppState>,
    Json(payload): Json<TaskPositionsRequest>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    Task::reorder(state.pool(), column.id, &payload.task_positions).await?;
    let tasks = Task::find_by_column_id(state.pool(), column.id).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let column_router = Router::new()
        .route("/", get(get_column).put(update_column).delete(delete_column))
        .route("/move", post(move_column))
        .route("/tasks", get(get_column_tasks))
        .route("/tasks/positions", put(update_task_positions))
        .route("/task-count", get(get_column_task_count))
        .layer(from_fn_with_state(state.clone(), load_column_middleware));

    Router::new().nest("/columns/{column_id}", column_router)
}
