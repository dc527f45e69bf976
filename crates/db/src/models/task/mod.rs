//! Task model.
//!
//! A task lives in exactly one column and carries a position that is dense
//! within that column. Every write that affects positions goes through
//! [`PositionManager`].

mod queries;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    position::{
        MoveRequest, MoveStrategy, PositionError, PositionManager, PositionScope, PositionUpdate,
    },
    validation::{normalize_description, validate_title},
};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: Uuid,
    pub column_id: Uuid, // Foreign key to Column
    pub title: String,
    pub description: Option<String>,
    pub position: i64,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

impl PositionScope for Task {
    const TABLE: &'static str = "tasks";
    const CONTAINER_KEY: &'static str = "column_id";
    const CONTAINER_TABLE: &'static str = "columns";
    const KIND: &'static str = "task";
    const CONTAINER_KIND: &'static str = "column";
}

#[derive(Debug, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub column_id: Uuid,
    pub title: String,
    pub description: Option<String>,
}

impl CreateTask {
    pub fn from_title_description(
        column_id: Uuid,
        title: String,
        description: Option<String>,
    ) -> Self {
        Self {
            column_id,
            title,
            description,
        }
    }
}

/// Title/description edit. `None` keeps the stored value; an empty
/// description clears it. Positions are never touched here.
#[derive(Debug, Default, Serialize, Deserialize, TS)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Drag-and-drop move as sent by the board UI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct MoveTask {
    pub source_column_id: Uuid,
    pub destination_column_id: Uuid,
    pub source_index: i64,
    pub destination_index: i64,
}

impl Task {
    /// Insert a task at the end of its column.
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateTask,
        task_id: Uuid,
    ) -> Result<Self, PositionError> {
        let title = validate_title(&data.title)?;
        let description = normalize_description(data.description.as_deref());

        let mut tx = pool.begin().await?;
        let position = PositionManager::append::<Task>(&mut tx, data.column_id).await?;

        let task = sqlx::query_as::<_, Task>(
            r#"INSERT INTO tasks (id, column_id, title, description, position)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, column_id, title, description, position, created_at, updated_at"#,
        )
        .bind(task_id)
        .bind(data.column_id)
        .bind(title)
        .bind(description)
        .bind(position)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(task)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateTask,
    ) -> Result<Option<Self>, PositionError> {
        let title = data.title.as_deref().map(validate_title).transpose()?;

        let current = match Self::find_by_id(pool, id).await? {
            Some(task) => task,
            None => return Ok(None),
        };

        let title = title.unwrap_or(current.title);
        let description = match data.description.as_deref() {
            Some(description) => normalize_description(Some(description)),
            None => current.description,
        };

        let task = sqlx::query_as::<_, Task>(
            r#"UPDATE tasks
               SET title = $2,
                   description = $3,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id, column_id, title, description, position, created_at, updated_at"#,
        )
        .bind(id)
        .bind(title)
        .bind(description)
        .fetch_optional(pool)
        .await?;
        Ok(task)
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<(), PositionError> {
        PositionManager::new(pool)
            .delete_and_compact::<Task>(id)
            .await
    }

    pub async fn move_to(
        pool: &SqlitePool,
        id: Uuid,
        data: &MoveTask,
        strategy: MoveStrategy,
    ) -> Result<(), PositionError> {
        let request = MoveRequest {
            item_id: id,
            source_container_id: data.source_column_id,
            destination_container_id: data.destination_column_id,
            source_index: data.source_index,
            destination_index: data.destination_index,
        };
        PositionManager::new(pool)
            .with_strategy(strategy)
            .move_item::<Task>(&request)
            .await
    }

    /// Replace the order of every task in a column.
    pub async fn reorder(
        pool: &SqlitePool,
        column_id: Uuid,
        positions: &[PositionUpdate],
    ) -> Result<(), PositionError> {
        PositionManager::new(pool)
            .bulk_reposition::<Task>(column_id, positions)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        board::{Board, CreateBoard},
        column::{Column, CreateColumn},
    };
    use crate::test_utils::create_test_pool;

    async fn seed_column(pool: &SqlitePool) -> Column {
        let board = Board::create(pool, &CreateBoard::new("Board"), Uuid::new_v4())
            .await
            .unwrap();
        Column::create(pool, board.id, &CreateColumn::new("To do"), Uuid::new_v4())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_trims_and_appends() {
        let (pool, _temp_dir) = create_test_pool().await;
        let column = seed_column(&pool).await;

        let data = CreateTask::from_title_description(
            column.id,
            "  Write docs ".to_string(),
            Some("   ".to_string()),
        );
        let task = Task::create(&pool, &data, Uuid::new_v4()).await.unwrap();

        assert_eq!(task.title, "Write docs");
        assert_eq!(task.description, None);
        assert_eq!(task.position, 0);
        assert_eq!(task.column_id, column.id);
    }

    #[tokio::test]
    async fn test_create_in_missing_column_is_not_found() {
        let (pool, _temp_dir) = create_test_pool().await;
        let data = CreateTask::from_title_description(Uuid::new_v4(), "Orphan".to_string(), None);

        let err = Task::create(&pool, &data, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            PositionError::ContainerNotFound { kind: "column", .. }
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title_without_writing() {
        let (pool, _temp_dir) = create_test_pool().await;
        let column = seed_column(&pool).await;
        let data = CreateTask::from_title_description(column.id, "  ".to_string(), None);

        let err = Task::create(&pool, &data, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, PositionError::Validation(_)));
        assert!(Task::find_by_column_id(&pool, column.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_keeps_position() {
        let (pool, _temp_dir) = create_test_pool().await;
        let column = seed_column(&pool).await;
        for title in ["a", "b"] {
            let data = CreateTask::from_title_description(column.id, title.to_string(), None);
            Task::create(&pool, &data, Uuid::new_v4()).await.unwrap();
        }
        let second = Task::find_by_column_id(&pool, column.id).await.unwrap()[1].clone();

        let updated = Task::update(
            &pool,
            second.id,
            &UpdateTask {
                title: Some("renamed".to_string()),
                description: Some("details".to_string()),
            },
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(updated.title, "renamed");
        assert_eq!(updated.description.as_deref(), Some("details"));
        assert_eq!(updated.position, 1);

        // Empty description clears, missing title keeps
        let cleared = Task::update(
            &pool,
            second.id,
            &UpdateTask {
                title: None,
                description: Some(String::new()),
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(cleared.title, "renamed");
        assert_eq!(cleared.description, None);
    }

    #[tokio::test]
    async fn test_update_missing_task_returns_none() {
        let (pool, _temp_dir) = create_test_pool().await;
        let result = Task::update(&pool, Uuid::new_v4(), &UpdateTask::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_move_task_uses_camel_case() {
        let json = serde_json::json!({
            "sourceColumnId": Uuid::nil(),
            "destinationColumnId": Uuid::nil(),
            "sourceIndex": 0,
            "destinationIndex": 2
        });
        let parsed: MoveTask = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.destination_index, 2);
    }
}
