use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use db::models::{board::Board, column::Column, task::Task};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

pub async fn load_board_middleware(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let board = match Board::find_by_id(state.pool(), board_id).await? {
        Some(board) => board,
        None => {
            tracing::warn!("Board {} not found", board_id);
            return Err(ApiError::NotFound(format!("board {board_id} not found")));
        }
    };

    request.extensions_mut().insert(board);
    Ok(next.run(request).await)
}

pub async fn load_column_middleware(
    State(state): State<AppState>,
    Path(column_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let column = match Column::find_by_id(state.pool(), column_id).await? {
        Some(column) => column,
        None => {
            tracing::warn!("Column {} not found", column_id);
            return Err(ApiError::NotFound(format!("column {column_id} not found")));
        }
    };

    request.extensions_mut().insert(column);
    Ok(next.run(request).await)
}

pub async fn load_task_middleware(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let task = match Task::find_by_id(state.pool(), task_id).await? {
        Some(task) => task,
        None => {
            tracing::warn!("Task {} not found", task_id);
            return Err(ApiError::NotFound(format!("task {task_id} not found")));
        }
    };

    request.extensions_mut().insert(task);
    Ok(next.run(request).await)
}
