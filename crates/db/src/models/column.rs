use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    position::{
        MoveRequest, MoveStrategy, PositionError, PositionManager, PositionScope, PositionUpdate,
    },
    validation::validate_title,
};

/// A column of a board. Its position is dense within the board.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Column {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    pub position: i64,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

impl PositionScope for Column {
    const TABLE: &'static str = "columns";
    const CONTAINER_KEY: &'static str = "board_id";
    const CONTAINER_TABLE: &'static str = "boards";
    const KIND: &'static str = "column";
    const CONTAINER_KIND: &'static str = "board";
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct CreateColumn {
    pub title: String,
}

impl CreateColumn {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct UpdateColumn {
    pub title: String,
}

/// Reorder of a single column within its board.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct MoveColumn {
    pub source_index: i64,
    pub destination_index: i64,
}

impl Column {
    /// Insert a column at the end of its board.
    pub async fn create(
        pool: &SqlitePool,
        board_id: Uuid,
        data: &CreateColumn,
        column_id: Uuid,
    ) -> Result<Self, PositionError> {
        let title = validate_title(&data.title)?;

        let mut tx = pool.begin().await?;
        let position = PositionManager::append::<Column>(&mut tx, board_id).await?;

        let column = sqlx::query_as::<_, Column>(
            r#"INSERT INTO columns (id, board_id, title, position)
               VALUES ($1, $2, $3, $4)
               RETURNING id, board_id, title, position, created_at, updated_at"#,
        )
        .bind(column_id)
        .bind(board_id)
        .bind(title)
        .bind(position)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(column)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Column>(
            r#"SELECT id, board_id, title, position, created_at, updated_at
               FROM columns
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Columns of a board in display order.
    pub async fn find_by_board_id(
        pool: &SqlitePool,
        board_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Column>(
            r#"SELECT id, board_id, title, position, created_at, updated_at
               FROM columns
               WHERE board_id = $1
               ORDER BY position ASC, created_at ASC"#,
        )
        .bind(board_id)
        .fetch_all(pool)
        .await
    }

    /// Rename a column. Its position is left alone.
    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateColumn,
    ) -> Result<Option<Self>, PositionError> {
        let title = validate_title(&data.title)?;
        let column = sqlx::query_as::<_, Column>(
            r#"UPDATE columns
               SET title = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, board_id, title, position, created_at, updated_at"#,
        )
        .bind(id)
        .bind(title)
        .fetch_optional(pool)
        .await?;
        Ok(column)
    }

    /// Delete a column (its tasks cascade) and compact the board.
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<(), PositionError> {
        PositionManager::new(pool)
            .delete_and_compact::<Column>(id)
            .await
    }

    pub async fn move_to(
        pool: &SqlitePool,
        id: Uuid,
        board_id: Uuid,
        data: &MoveColumn,
        strategy: MoveStrategy,
    ) -> Result<(), PositionError> {
        let request = MoveRequest {
            item_id: id,
            source_container_id: board_id,
            destination_container_id: board_id,
            source_index: data.source_index,
            destination_index: data.destination_index,
        };
        PositionManager::new(pool)
            .with_strategy(strategy)
            .move_item::<Column>(&request)
            .await
    }

    /// Replace the order of every column in a board.
    pub async fn reorder(
        pool: &SqlitePool,
        board_id: Uuid,
        positions: &[PositionUpdate],
    ) -> Result<(), PositionError> {
        PositionManager::new(pool)
            .bulk_reposition::<Column>(board_id, positions)
            .await
    }

    pub async fn task_count(pool: &SqlitePool, id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE column_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
    }
}
