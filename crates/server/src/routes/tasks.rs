use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use db::{
    models::task::{CreateTask, MoveTask, Task, UpdateTask},
    validation::validate_search_term,
};
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::load_task_middleware};

#[derive(Debug, Deserialize, TS)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeQuery {
    #[ts(type = "Date")]
    pub start_date: DateTime<Utc>,
    #[ts(type = "Date")]
    pub end_date: DateTime<Utc>,
}

pub async fn get_tasks(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = Task::find_all(state.pool()).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

/// POST /api/tasks - append to the end of `columnId`
pub async fn create_task(
    State(state): State<AppState>,
    Json(payload): Json<CreateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = Task::create(state.pool(), &payload, Uuid::new_v4()).await?;
    tracing::info!(
        task_id = %task.id,
        column_id = %task.column_id,
        position = task.position,
        "Created task"
    );
    Ok(ResponseJson(ApiResponse::success(task)))
}

/// GET /api/tasks/search?q=
pub async fn search_tasks(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let term = validate_search_term(&query.q)?;
    let tasks = Task::search(state.pool(), &term).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

/// GET /api/tasks/date-range?startDate=&endDate=
pub async fn get_tasks_in_date_range(
    State(state): State<AppState>,
    Query(query): Query<DateRangeQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    if query.start_date > query.end_date {
        return Err(ApiError::BadRequest(
            "startDate must not be after endDate".to_string(),
        ));
    }
    let tasks = Task::find_in_date_range(state.pool(), query.start_date, query.end_date).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_task(
    Extension(task): Extension<Task>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn update_task(
    Extension(task): Extension<Task>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let updated = Task::update(state.pool(), task.id, &payload)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("task {} not found", task.id)))?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

/// DELETE /api/tasks/{task_id} - closes the gap in its column
pub async fn delete_task(
    Extension(task): Extension<Task>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    Task::delete(state.pool(), task.id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/tasks/{task_id}/move
pub async fn move_task(
    Extension(task): Extension<Task>,
    State(state): State<AppState>,
    Json(payload): Json<MoveTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    Task::move_to(state.pool(), task.id, &payload, state.move_strategy()).await?;
    let moved = Task::find_by_id(state.pool(), task.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("task {} not found", task.id)))?;
    Ok(ResponseJson(ApiResponse::success(moved)))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let task_router = Router::new()
        .route("/", get(get_task).put(update_task).delete(delete_task))
        .route("/move", post(move_task))
        .layer(from_fn_with_state(state.clone(), load_task_middleware));

    let inner = Router::new()
        .route("/", get(get_tasks).post(create_task))
        .route("/search", get(search_tasks))
        .route("/date-range", get(get_tasks_in_date_range))
        .nest("/{task_id}", task_router);

    Router::new().nest("/tasks", inner)
}
