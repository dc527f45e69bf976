use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::Task;

/// Escape LIKE wildcards so a search term matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

impl Task {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"SELECT id, column_id, title, description, position, created_at, updated_at
               FROM tasks
               ORDER BY created_at DESC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"SELECT id, column_id, title, description, position, created_at, updated_at
               FROM tasks
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Tasks of a column in display order.
    pub async fn find_by_column_id(
        pool: &SqlitePool,
        column_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"SELECT id, column_id, title, description, position, created_at, updated_at
               FROM tasks
               WHERE column_id = $1
               ORDER BY position ASC, created_at ASC"#,
        )
        .bind(column_id)
        .fetch_all(pool)
        .await
    }

    /// Case-insensitive substring match on title or description.
    pub async fn search(pool: &SqlitePool, term: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"SELECT id, column_id, title, description, position, created_at, updated_at
               FROM tasks
               WHERE title LIKE $1 ESCAPE '\' OR description LIKE $1 ESCAPE '\'
               ORDER BY created_at DESC"#,
        )
        .bind(like_pattern(term))
        .fetch_all(pool)
        .await
    }

    /// Tasks created within `[start, end]`, newest first.
    pub async fn find_in_date_range(
        pool: &SqlitePool,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"SELECT id, column_id, title, description, position, created_at, updated_at
               FROM tasks
               WHERE julianday(created_at) BETWEEN julianday($1) AND julianday($2)
               ORDER BY created_at DESC"#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
    }
}
