use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::{
    PositionUpdate,
    models::{
        board::{Board, BoardWithColumns, CreateBoard, UpdateBoard},
        column::{Column, CreateColumn},
    },
};
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::load_board_middleware};

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ColumnPositionsRequest {
    pub column_positions: Vec<PositionUpdate>,
}

/// GET /api/boards - every board with ordered columns and task ids
pub async fn get_boards(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<BoardWithColumns>>>, ApiError> {
    let boards = Board::find_all_with_columns(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::success(boards)))
}

/// POST /api/boards
pub async fn create_board(
    State(state): State<AppState>,
    Json(payload): Json<CreateBoard>,
) -> Result<ResponseJson<ApiResponse<Board>>, ApiError> {
    let board = Board::create(state.pool(), &payload, Uuid::new_v4()).await?;
    tracing::info!(board_id = %board.id, "Created board");
    Ok(ResponseJson(ApiResponse::success(board)))
}

/// GET /api/boards/{board_id} - board with ordered columns and task ids
pub async fn get_board(
    Extension(board): Extension<Board>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<BoardWithColumns>>, ApiError> {
    let loaded = Board::find_with_columns(state.pool(), board.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("board {} not found", board.id)))?;
    Ok(ResponseJson(ApiResponse::success(loaded)))
}

pub async fn update_board(
    Extension(board): Extension<Board>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateBoard>,
) -> Result<ResponseJson<ApiResponse<Board>>, ApiError> {
    let updated = Board::update(state.pool(), board.id, &payload)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("board {} not found", board.id)))?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub async fn delete_board(
    Extension(board): Extension<Board>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = Board::delete(state.pool(), board.id).await?;
    if rows_affected == 0 {
        Err(ApiError::Database(sqlx::Error::RowNotFound))
    } else {
        tracing::info!(board_id = %board.id, "Deleted board");
        Ok(ResponseJson(ApiResponse::success(())))
    }
}

/// GET /api/boards/{board_id}/columns
pub async fn get_board_columns(
    Extension(board): Extension<Board>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Column>>>, ApiError> {
    let columns = Column::find_by_board_id(state.pool(), board.id).await?;
    Ok(ResponseJson(ApiResponse::success(columns)))
}

/// POST /api/boards/{board_id}/columns - append a column
pub async fn create_column(
    Extension(board): Extension<Board>,
    State(state): State<AppState>,
    Json(payload): Json<CreateColumn>,
) -> Result<ResponseJson<ApiResponse<Column>>, ApiError> {
    let column = Column::create(state.pool(), board.id, &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(column)))
}

/// PUT /api/boards/{board_id}/columns/positions
pub async fn update_column_positions(
    Extension(board): Extension<Board>,
    State(state): State<AppState>,
    Json(payload): Json<ColumnPositionsRequest>,
) -> Result<ResponseJson<ApiResponse<Vec<Column>>>, ApiError> {
    Column::reorder(state.pool(), board.id, &payload.column_positions).await?;
    let columns = Column::find_by_board_id(state.pool(), board.id).await?;
    Ok(ResponseJson(ApiResponse::success(columns)))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let board_router = Router::new()
        .route("/", get(get_board).put(update_board).delete(delete_board))
        .route("/columns", get(get_board_columns).post(create_column))
        .route("/columns/positions", put(update_column_positions))
        .layer(from_fn_with_state(state.clone(), load_board_middleware));

    let inner = Router::new()
        .route("/", get(get_boards).post(create_board))
        .nest("/{board_id}", board_router);

    Router::new().nest("/boards", inner)
}
