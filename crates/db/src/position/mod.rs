//! Position manager for ordered board content.
//!
//! Tasks are ordered within their column and columns within their board. For
//! every container the `position` values of its members are exactly
//! `0..count`, and this module is the only writer of those values.
//!
//! Each operation is a single transaction whose first statement writes the
//! row it pivots on (the container for appends and bulk reorders, the item
//! for moves and deletes). On SQLite that write takes the database write lock,
//! so the position reads that follow cannot interleave with another writer.
//! Lock waits are bounded by the connection's `busy_timeout`.

mod reorder;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

pub use reorder::is_dense;

use crate::validation::{ValidationError, validate_index};

/// A table whose rows carry a `position` that is dense within a container.
pub trait PositionScope {
    /// Table holding the positioned rows.
    const TABLE: &'static str;
    /// Foreign key naming the owning container.
    const CONTAINER_KEY: &'static str;
    /// Table holding the containers.
    const CONTAINER_TABLE: &'static str;
    /// Human name of a row, used in errors.
    const KIND: &'static str;
    /// Human name of a container, used in errors.
    const CONTAINER_KIND: &'static str;
}

/// How `move_item` renumbers siblings.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MoveStrategy {
    /// Verify the caller's source against storage, then rebuild the affected
    /// orderings in memory and write back every changed position.
    #[default]
    Reindex,
    /// Close the source gap, reassign the item, open the destination gap, in
    /// that order, trusting the caller's indices.
    ThreeStep,
}

impl MoveStrategy {
    /// Read `TILES_MOVE_STRATEGY`, falling back to [`MoveStrategy::Reindex`].
    pub fn from_env() -> Self {
        match std::env::var("TILES_MOVE_STRATEGY") {
            Ok(value) => value.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(
                    value = %value,
                    "Unknown TILES_MOVE_STRATEGY, using {}",
                    Self::default()
                );
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }
}

/// One entry of a bulk reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct PositionUpdate {
    pub id: Uuid,
    pub position: i64,
}

/// A member of a container as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, TS)]
pub struct Slot {
    pub id: Uuid,
    pub position: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct MoveRequest {
    pub item_id: Uuid,
    pub source_container_id: Uuid,
    pub destination_container_id: Uuid,
    /// Index of the item in the source container before the move.
    pub source_index: i64,
    /// Index in the destination list after the item left the source.
    pub destination_index: i64,
}

#[derive(Debug, Error)]
pub enum PositionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{kind} {id} not found")]
    ContainerNotFound { kind: &'static str, id: Uuid },
    #[error("{kind} {id} not found")]
    ItemNotFound { kind: &'static str, id: Uuid },
    #[error(
        "{kind} {id} is at index {actual_index} of {actual_container}, \
         not index {expected_index} of {expected_container}"
    )]
    StaleSource {
        kind: &'static str,
        id: Uuid,
        expected_container: Uuid,
        expected_index: i64,
        actual_container: Uuid,
        actual_index: i64,
    },
    #[error("destination index {index} is out of range (0..={max})")]
    DestinationOutOfRange { index: i64, max: usize },
    #[error("inconsistent positions: {0}")]
    InconsistentPositions(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, FromRow)]
struct Placement {
    container_id: Uuid,
    position: i64,
}

pub struct PositionManager<'a> {
    pool: &'a SqlitePool,
    strategy: MoveStrategy,
}

impl<'a> PositionManager<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self {
            pool,
            strategy: MoveStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: MoveStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> MoveStrategy {
        self.strategy
    }

    /// Reserve the next position in `container_id` for a row about to be
    /// inserted on `conn`.
    ///
    /// Must run inside the transaction that inserts the row: the container
    /// write lock taken here is what keeps two concurrent appends from
    /// reading the same count.
    pub async fn append<S: PositionScope>(
        conn: &mut SqliteConnection,
        container_id: Uuid,
    ) -> Result<i64, PositionError> {
        lock_container::<S>(conn, container_id).await?;

        let sql = format!(
            "SELECT COUNT(*) FROM {table} WHERE {key} = $1",
            table = S::TABLE,
            key = S::CONTAINER_KEY
        );
        let position: i64 = sqlx::query_scalar(&sql)
            .bind(container_id)
            .fetch_one(&mut *conn)
            .await?;

        tracing::debug!(
            kind = S::KIND,
            container_id = %container_id,
            position,
            "Appending at end of container"
        );
        Ok(position)
    }

    /// Move an item to `destination_index` of the destination container.
    pub async fn move_item<S: PositionScope>(
        &self,
        request: &MoveRequest,
    ) -> Result<(), PositionError> {
        validate_index("sourceIndex", request.source_index)?;
        validate_index("destinationIndex", request.destination_index)?;

        tracing::debug!(
            kind = S::KIND,
            item_id = %request.item_id,
            source_container_id = %request.source_container_id,
            destination_container_id = %request.destination_container_id,
            source_index = request.source_index,
            destination_index = request.destination_index,
            strategy = %self.strategy,
            "Moving item"
        );

        let mut tx = self.pool.begin().await?;
        match self.strategy {
            MoveStrategy::Reindex => move_reindex::<S>(&mut tx, request).await?,
            MoveStrategy::ThreeStep => move_three_step::<S>(&mut tx, request).await?,
        }
        tx.commit().await?;
        Ok(())
    }

    /// Write caller-computed positions for every member of a container.
    ///
    /// The set must assign each current member exactly one position in
    /// `0..count`; anything else is rejected before a single row is written.
    pub async fn bulk_reposition<S: PositionScope>(
        &self,
        container_id: Uuid,
        updates: &[PositionUpdate],
    ) -> Result<(), PositionError> {
        for update in updates {
            validate_index("position", update.position)?;
        }

        let mut tx = self.pool.begin().await?;
        lock_container::<S>(&mut tx, container_id).await?;

        let members: Vec<Uuid> = ordered_slots::<S>(&mut tx, container_id)
            .await?
            .into_iter()
            .map(|slot| slot.id)
            .collect();
        reorder::validate_permutation(&members, updates)?;

        let sql = format!(
            "UPDATE {table} SET position = $1 WHERE id = $2 AND {key} = $3",
            table = S::TABLE,
            key = S::CONTAINER_KEY
        );
        for update in updates {
            sqlx::query(&sql)
                .bind(update.position)
                .bind(update.id)
                .bind(container_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::debug!(
            kind = S::KIND,
            container_id = %container_id,
            count = updates.len(),
            "Repositioned container"
        );
        Ok(())
    }

    /// Delete an item and close the gap it leaves behind.
    pub async fn delete_and_compact<S: PositionScope>(
        &self,
        item_id: Uuid,
    ) -> Result<(), PositionError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "DELETE FROM {table} WHERE id = $1 RETURNING {key} AS container_id, position",
            table = S::TABLE,
            key = S::CONTAINER_KEY
        );
        let placement = sqlx::query_as::<_, Placement>(&sql)
            .bind(item_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(PositionError::ItemNotFound {
                kind: S::KIND,
                id: item_id,
            })?;

        let sql = format!(
            "UPDATE {table} SET position = position - 1 WHERE {key} = $1 AND position > $2",
            table = S::TABLE,
            key = S::CONTAINER_KEY
        );
        let shifted = sqlx::query(&sql)
            .bind(placement.container_id)
            .bind(placement.position)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        tracing::debug!(
            kind = S::KIND,
            item_id = %item_id,
            container_id = %placement.container_id,
            position = placement.position,
            shifted,
            "Deleted item and compacted container"
        );
        Ok(())
    }

    /// Members of a container ordered by position.
    pub async fn slots<S: PositionScope>(
        &self,
        container_id: Uuid,
    ) -> Result<Vec<Slot>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        ordered_slots::<S>(&mut conn, container_id).await
    }
}

/// Touch the container row so this transaction holds the write lock.
///
/// The touch bumps the container's `updated_at`: adding or moving a task
/// into a column marks the column updated, and adding or reordering columns
/// marks the board updated.
async fn lock_container<S: PositionScope>(
    conn: &mut SqliteConnection,
    container_id: Uuid,
) -> Result<(), PositionError> {
    let sql = format!(
        "UPDATE {container} SET updated_at = datetime('now', 'subsec') WHERE id = $1",
        container = S::CONTAINER_TABLE
    );
    let result = sqlx::query(&sql)
        .bind(container_id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(PositionError::ContainerNotFound {
            kind: S::CONTAINER_KIND,
            id: container_id,
        });
    }
    Ok(())
}

/// Touch the item row and return where it currently sits.
async fn lock_item<S: PositionScope>(
    conn: &mut SqliteConnection,
    item_id: Uuid,
) -> Result<Placement, PositionError> {
    let sql = format!(
        "UPDATE {table} SET updated_at = datetime('now', 'subsec') WHERE id = $1 \
         RETURNING {key} AS container_id, position",
        table = S::TABLE,
        key = S::CONTAINER_KEY
    );
    sqlx::query_as::<_, Placement>(&sql)
        .bind(item_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(PositionError::ItemNotFound {
            kind: S::KIND,
            id: item_id,
        })
}

async fn ordered_slots<S: PositionScope>(
    conn: &mut SqliteConnection,
    container_id: Uuid,
) -> Result<Vec<Slot>, sqlx::Error> {
    let sql = format!(
        "SELECT id, position FROM {table} WHERE {key} = $1 ORDER BY position ASC, created_at ASC",
        table = S::TABLE,
        key = S::CONTAINER_KEY
    );
    sqlx::query_as::<_, Slot>(&sql)
        .bind(container_id)
        .fetch_all(&mut *conn)
        .await
}

/// The literal three-statement shift. Correct only when the caller's
/// indices match what is stored.
async fn move_three_step<S: PositionScope>(
    conn: &mut SqliteConnection,
    request: &MoveRequest,
) -> Result<(), PositionError> {
    lock_item::<S>(conn, request.item_id).await?;
    lock_container::<S>(conn, request.destination_container_id).await?;

    let close_gap = format!(
        "UPDATE {table} SET position = position - 1 WHERE {key} = $1 AND position > $2",
        table = S::TABLE,
        key = S::CONTAINER_KEY
    );
    sqlx::query(&close_gap)
        .bind(request.source_container_id)
        .bind(request.source_index)
        .execute(&mut *conn)
        .await?;

    let reassign = format!(
        "UPDATE {table} SET {key} = $1, position = $2 WHERE id = $3",
        table = S::TABLE,
        key = S::CONTAINER_KEY
    );
    sqlx::query(&reassign)
        .bind(request.destination_container_id)
        .bind(request.destination_index)
        .bind(request.item_id)
        .execute(&mut *conn)
        .await?;

    let open_gap = format!(
        "UPDATE {table} SET position = position + 1 \
         WHERE {key} = $1 AND position >= $2 AND id != $3",
        table = S::TABLE,
        key = S::CONTAINER_KEY
    );
    sqlx::query(&open_gap)
        .bind(request.destination_container_id)
        .bind(request.destination_index)
        .bind(request.item_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn move_reindex<S: PositionScope>(
    conn: &mut SqliteConnection,
    request: &MoveRequest,
) -> Result<(), PositionError> {
    let placement = lock_item::<S>(conn, request.item_id).await?;
    if placement.container_id != request.source_container_id
        || placement.position != request.source_index
    {
        return Err(PositionError::StaleSource {
            kind: S::KIND,
            id: request.item_id,
            expected_container: request.source_container_id,
            expected_index: request.source_index,
            actual_container: placement.container_id,
            actual_index: placement.position,
        });
    }

    let same_container = request.source_container_id == request.destination_container_id;
    if !same_container {
        lock_container::<S>(conn, request.destination_container_id).await?;
    }

    let source = ordered_slots::<S>(conn, request.source_container_id).await?;
    let destination = if same_container {
        None
    } else {
        Some(ordered_slots::<S>(conn, request.destination_container_id).await?)
    };

    let from = source
        .iter()
        .position(|slot| slot.id == request.item_id)
        .ok_or(PositionError::ItemNotFound {
            kind: S::KIND,
            id: request.item_id,
        })?;
    // Non-negative was checked before the transaction opened.
    let destination_index = usize::try_from(request.destination_index).unwrap_or(usize::MAX);

    let plan = reorder::plan_move(
        source.iter().map(|slot| slot.id).collect(),
        destination
            .as_ref()
            .map(|slots| slots.iter().map(|slot| slot.id).collect()),
        from,
        destination_index,
    )?;

    let mut previous: HashMap<Uuid, (Uuid, i64)> = source
        .iter()
        .map(|slot| (slot.id, (request.source_container_id, slot.position)))
        .collect();
    if let Some(slots) = &destination {
        previous.extend(
            slots
                .iter()
                .map(|slot| (slot.id, (request.destination_container_id, slot.position))),
        );
    }

    write_ordering::<S>(conn, request.source_container_id, &plan.source, &previous).await?;
    if let Some(ordering) = &plan.destination {
        write_ordering::<S>(conn, request.destination_container_id, ordering, &previous).await?;
    }
    Ok(())
}

/// Persist `ordering` as positions `0..len` of `container_id`, skipping rows
/// that already sit where they belong.
async fn write_ordering<S: PositionScope>(
    conn: &mut SqliteConnection,
    container_id: Uuid,
    ordering: &[Uuid],
    previous: &HashMap<Uuid, (Uuid, i64)>,
) -> Result<(), PositionError> {
    let sql = format!(
        "UPDATE {table} SET {key} = $1, position = $2 WHERE id = $3",
        table = S::TABLE,
        key = S::CONTAINER_KEY
    );
    for (index, id) in ordering.iter().enumerate() {
        let position = index as i64;
        if previous.get(id) == Some(&(container_id, position)) {
            continue;
        }
        sqlx::query(&sql)
            .bind(container_id)
            .bind(position)
            .bind(*id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
