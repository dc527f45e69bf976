use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::column::Column;
use crate::{
    position::PositionError,
    validation::{normalize_description, validate_title},
};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Board {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct CreateBoard {
    pub title: String,
    pub description: Option<String>,
}

impl CreateBoard {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, TS)]
pub struct UpdateBoard {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// A column with the ids of its tasks in display order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ColumnWithTaskIds {
    #[serde(flatten)]
    #[ts(flatten)]
    pub column: Column,
    pub task_ids: Vec<Uuid>,
}

/// Everything the board view needs in one response.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct BoardWithColumns {
    #[serde(flatten)]
    #[ts(flatten)]
    pub board: Board,
    pub columns: Vec<ColumnWithTaskIds>,
}

#[derive(FromRow)]
struct TaskPlacement {
    id: Uuid,
    column_id: Uuid,
}

/// Group ordered columns under their boards and ordered task ids under their
/// columns, keeping the input order at both levels.
fn assemble(
    boards: Vec<Board>,
    columns: Vec<Column>,
    placements: Vec<TaskPlacement>,
) -> Vec<BoardWithColumns> {
    let mut task_ids: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for placement in placements {
        task_ids
            .entry(placement.column_id)
            .or_default()
            .push(placement.id);
    }

    let mut columns_by_board: HashMap<Uuid, Vec<ColumnWithTaskIds>> = HashMap::new();
    for column in columns {
        columns_by_board
            .entry(column.board_id)
            .or_default()
            .push(ColumnWithTaskIds {
                task_ids: task_ids.remove(&column.id).unwrap_or_default(),
                column,
            });
    }

    boards
        .into_iter()
        .map(|board| BoardWithColumns {
            columns: columns_by_board.remove(&board.id).unwrap_or_default(),
            board,
        })
        .collect()
}

impl Board {
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateBoard,
        board_id: Uuid,
    ) -> Result<Self, PositionError> {
        let title = validate_title(&data.title)?;
        let description = normalize_description(data.description.as_deref());

        let board = sqlx::query_as::<_, Board>(
            r#"INSERT INTO boards (id, title, description)
               VALUES ($1, $2, $3)
               RETURNING id, title, description, created_at, updated_at"#,
        )
        .bind(board_id)
        .bind(title)
        .bind(description)
        .fetch_one(pool)
        .await?;
        Ok(board)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Board>(
            r#"SELECT id, title, description, created_at, updated_at
               FROM boards
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Load a board with its ordered columns and each column's ordered task ids.
    pub async fn find_with_columns(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<BoardWithColumns>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(board) = sqlx::query_as::<_, Board>(
            r#"SELECT id, title, description, created_at, updated_at
               FROM boards
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let columns = sqlx::query_as::<_, Column>(
            r#"SELECT id, board_id, title, position, created_at, updated_at
               FROM columns
               WHERE board_id = $1
               ORDER BY position ASC, created_at ASC"#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let placements = sqlx::query_as::<_, TaskPlacement>(
            r#"SELECT t.id, t.column_id
               FROM tasks t
               JOIN columns c ON c.id = t.column_id
               WHERE c.board_id = $1
               ORDER BY t.position ASC, t.created_at ASC"#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(assemble(vec![board], columns, placements).pop())
    }

    /// Every board, newest first, each with its ordered columns and task ids.
    /// The three reads share one transaction.
    pub async fn find_all_with_columns(
        pool: &SqlitePool,
    ) -> Result<Vec<BoardWithColumns>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let boards = sqlx::query_as::<_, Board>(
            r#"SELECT id, title, description, created_at, updated_at
               FROM boards
               ORDER BY created_at DESC"#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let columns = sqlx::query_as::<_, Column>(
            r#"SELECT id, board_id, title, position, created_at, updated_at
               FROM columns
               ORDER BY position ASC, created_at ASC"#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let placements = sqlx::query_as::<_, TaskPlacement>(
            r#"SELECT id, column_id
               FROM tasks
               ORDER BY position ASC, created_at ASC"#,
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(assemble(boards, columns, placements))
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateBoard,
    ) -> Result<Option<Self>, PositionError> {
        let title = data.title.as_deref().map(validate_title).transpose()?;

        let Some(current) = Self::find_by_id(pool, id).await? else {
            return Ok(None);
        };

        let title = title.unwrap_or(current.title);
        let description = match data.description.as_deref() {
            Some(description) => normalize_description(Some(description)),
            None => current.description,
        };

        let board = sqlx::query_as::<_, Board>(
            r#"UPDATE boards
               SET title = $2, description = $3, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, title, description, created_at, updated_at"#,
        )
        .bind(id)
        .bind(title)
        .bind(description)
        .fetch_optional(pool)
        .await?;
        Ok(board)
    }

    /// Delete a board with its columns and tasks. Returns rows affected.
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM boards WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
