//! Integration tests for the position manager.
//!
//! Every test checks the same contract: within a container, positions are
//! exactly `0..count` after each committed operation.

use std::str::FromStr;

use db::{
    models::{
        board::{Board, CreateBoard},
        column::{Column, CreateColumn},
        task::{CreateTask, MoveTask, Task},
    },
    position::{MoveStrategy, PositionError, PositionManager, PositionUpdate, is_dense},
    validation::ValidationError,
};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};
use tempfile::TempDir;
use uuid::Uuid;

async fn setup_test_pool() -> (SqlitePool, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");

    let options =
        SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.to_string_lossy()))
            .expect("Invalid database URL")
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePool::connect_with(options)
        .await
        .expect("Failed to create pool");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    (pool, temp_dir)
}

/// Board with column A = [T1, T2, T3] and column B = [T4].
struct Fixture {
    column_a: Uuid,
    column_b: Uuid,
    t1: Uuid,
    t2: Uuid,
    t3: Uuid,
    t4: Uuid,
}

async fn create_task(pool: &SqlitePool, column_id: Uuid, title: &str) -> Uuid {
    let data = CreateTask::from_title_description(column_id, title.to_string(), None);
    Task::create(pool, &data, Uuid::new_v4())
        .await
        .expect("Failed to create task")
        .id
}

async fn seed(pool: &SqlitePool) -> Fixture {
    let board = Board::create(pool, &CreateBoard::new("Board"), Uuid::new_v4())
        .await
        .expect("Failed to create board");
    let column_a = Column::create(pool, board.id, &CreateColumn::new("A"), Uuid::new_v4())
        .await
        .expect("Failed to create column A")
        .id;
    let column_b = Column::create(pool, board.id, &CreateColumn::new("B"), Uuid::new_v4())
        .await
        .expect("Failed to create column B")
        .id;

    let t1 = create_task(pool, column_a, "T1").await;
    let t2 = create_task(pool, column_a, "T2").await;
    let t3 = create_task(pool, column_a, "T3").await;
    let t4 = create_task(pool, column_b, "T4").await;

    Fixture {
        column_a,
        column_b,
        t1,
        t2,
        t3,
        t4,
    }
}

/// `(id, position)` pairs of a column in display order.
async fn layout(pool: &SqlitePool, column_id: Uuid) -> Vec<(Uuid, i64)> {
    Task::find_by_column_id(pool, column_id)
        .await
        .expect("Failed to load column")
        .into_iter()
        .map(|task| (task.id, task.position))
        .collect()
}

async fn positions(pool: &SqlitePool, column_id: Uuid) -> Vec<i64> {
    layout(pool, column_id)
        .await
        .into_iter()
        .map(|(_, position)| position)
        .collect()
}

async fn move_task(
    pool: &SqlitePool,
    task_id: Uuid,
    source_column_id: Uuid,
    destination_column_id: Uuid,
    source_index: i64,
    destination_index: i64,
    strategy: MoveStrategy,
) -> Result<(), PositionError> {
    let data = MoveTask {
        source_column_id,
        destination_column_id,
        source_index,
        destination_index,
    };
    Task::move_to(pool, task_id, &data, strategy).await
}

const STRATEGIES: [MoveStrategy; 2] = [MoveStrategy::Reindex, MoveStrategy::ThreeStep];

#[tokio::test]
async fn test_append_assigns_positions_in_creation_order() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let fx = seed(&pool).await;

    let t5 = create_task(&pool, fx.column_a, "T5").await;
    let t6 = create_task(&pool, fx.column_a, "T6").await;

    assert_eq!(
        layout(&pool, fx.column_a).await,
        vec![(fx.t1, 0), (fx.t2, 1), (fx.t3, 2), (t5, 3), (t6, 4)]
    );
}

#[tokio::test]
async fn test_move_across_columns_scenario() {
    for strategy in STRATEGIES {
        let (pool, _temp_dir) = setup_test_pool().await;
        let fx = seed(&pool).await;

        move_task(&pool, fx.t1, fx.column_a, fx.column_b, 0, 1, strategy)
            .await
            .unwrap_or_else(|e| panic!("{strategy} move failed: {e}"));

        assert_eq!(
            layout(&pool, fx.column_a).await,
            vec![(fx.t2, 0), (fx.t3, 1)],
            "{strategy}"
        );
        assert_eq!(
            layout(&pool, fx.column_b).await,
            vec![(fx.t4, 0), (fx.t1, 1)],
            "{strategy}"
        );

        let moved = Task::find_by_id(&pool, fx.t1).await.unwrap().unwrap();
        assert_eq!(moved.column_id, fx.column_b);
    }
}

#[tokio::test]
async fn test_delete_compacts_scenario() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let fx = seed(&pool).await;

    Task::delete(&pool, fx.t2).await.unwrap();

    assert_eq!(
        layout(&pool, fx.column_a).await,
        vec![(fx.t1, 0), (fx.t3, 1)]
    );
    assert!(Task::find_by_id(&pool, fx.t2).await.unwrap().is_none());
    assert_eq!(layout(&pool, fx.column_b).await, vec![(fx.t4, 0)]);
}

#[tokio::test]
async fn test_delete_missing_task_is_not_found() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let fx = seed(&pool).await;

    let err = Task::delete(&pool, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, PositionError::ItemNotFound { kind: "task", .. }));
    assert_eq!(positions(&pool, fx.column_a).await, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_move_within_column() {
    for strategy in STRATEGIES {
        let (pool, _temp_dir) = setup_test_pool().await;
        let fx = seed(&pool).await;

        // First to last
        move_task(&pool, fx.t1, fx.column_a, fx.column_a, 0, 2, strategy)
            .await
            .unwrap();
        assert_eq!(
            layout(&pool, fx.column_a).await,
            vec![(fx.t2, 0), (fx.t3, 1), (fx.t1, 2)],
            "{strategy}"
        );

        // Last to first
        move_task(&pool, fx.t1, fx.column_a, fx.column_a, 2, 0, strategy)
            .await
            .unwrap();
        assert_eq!(
            layout(&pool, fx.column_a).await,
            vec![(fx.t1, 0), (fx.t2, 1), (fx.t3, 2)],
            "{strategy}"
        );

        // Onto its own slot
        move_task(&pool, fx.t2, fx.column_a, fx.column_a, 1, 1, strategy)
            .await
            .unwrap();
        assert_eq!(
            layout(&pool, fx.column_a).await,
            vec![(fx.t1, 0), (fx.t2, 1), (fx.t3, 2)],
            "{strategy}"
        );
    }
}

#[tokio::test]
async fn test_move_round_trip_restores_order() {
    for strategy in STRATEGIES {
        let (pool, _temp_dir) = setup_test_pool().await;
        let fx = seed(&pool).await;
        let before_a = layout(&pool, fx.column_a).await;
        let before_b = layout(&pool, fx.column_b).await;

        move_task(&pool, fx.t2, fx.column_a, fx.column_b, 1, 0, strategy)
            .await
            .unwrap();
        assert_eq!(positions(&pool, fx.column_a).await, vec![0, 1]);
        assert_eq!(positions(&pool, fx.column_b).await, vec![0, 1]);

        move_task(&pool, fx.t2, fx.column_b, fx.column_a, 0, 1, strategy)
            .await
            .unwrap();

        assert_eq!(layout(&pool, fx.column_a).await, before_a, "{strategy}");
        assert_eq!(layout(&pool, fx.column_b).await, before_b, "{strategy}");
    }
}

#[tokio::test]
async fn test_move_into_empty_column() {
    for strategy in STRATEGIES {
        let (pool, _temp_dir) = setup_test_pool().await;
        let fx = seed(&pool).await;

        move_task(&pool, fx.t4, fx.column_b, fx.column_a, 0, 3, strategy)
            .await
            .unwrap();

        assert!(layout(&pool, fx.column_b).await.is_empty());
        assert_eq!(
            layout(&pool, fx.column_a).await,
            vec![(fx.t1, 0), (fx.t2, 1), (fx.t3, 2), (fx.t4, 3)],
            "{strategy}"
        );
    }
}

#[tokio::test]
async fn test_stale_source_index() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let fx = seed(&pool).await;

    // T1 is at index 0, the caller claims 2
    let err = move_task(
        &pool,
        fx.t1,
        fx.column_a,
        fx.column_a,
        2,
        0,
        MoveStrategy::Reindex,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        PositionError::StaleSource {
            actual_index: 0,
            expected_index: 2,
            ..
        }
    ));
    assert_eq!(
        layout(&pool, fx.column_a).await,
        vec![(fx.t1, 0), (fx.t2, 1), (fx.t3, 2)]
    );

    // The literal three-step shift trusts the caller and leaves a gap
    move_task(
        &pool,
        fx.t1,
        fx.column_a,
        fx.column_a,
        2,
        0,
        MoveStrategy::ThreeStep,
    )
    .await
    .unwrap();
    let after = positions(&pool, fx.column_a).await;
    assert!(!is_dense(&after), "expected a gap, got {after:?}");
}

#[tokio::test]
async fn test_stale_source_column() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let fx = seed(&pool).await;

    let err = move_task(
        &pool,
        fx.t4,
        fx.column_a,
        fx.column_b,
        0,
        0,
        MoveStrategy::Reindex,
    )
    .await
    .unwrap_err();
    match err {
        PositionError::StaleSource {
            actual_container, ..
        } => assert_eq!(actual_container, fx.column_b),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_destination_out_of_range_rolls_back() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let fx = seed(&pool).await;

    let err = move_task(
        &pool,
        fx.t1,
        fx.column_a,
        fx.column_b,
        0,
        5,
        MoveStrategy::Reindex,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        PositionError::DestinationOutOfRange { index: 5, max: 1 }
    ));

    // Within one column the item itself does not count
    let err = move_task(
        &pool,
        fx.t1,
        fx.column_a,
        fx.column_a,
        0,
        3,
        MoveStrategy::Reindex,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        PositionError::DestinationOutOfRange { index: 3, max: 2 }
    ));

    assert_eq!(
        layout(&pool, fx.column_a).await,
        vec![(fx.t1, 0), (fx.t2, 1), (fx.t3, 2)]
    );
    assert_eq!(layout(&pool, fx.column_b).await, vec![(fx.t4, 0)]);
}

/// Every stored task column, including timestamps, ordered by id.
async fn snapshot(pool: &SqlitePool) -> Vec<(Uuid, Uuid, i64, String)> {
    sqlx::query_as::<_, (Uuid, Uuid, i64, String)>(
        "SELECT id, column_id, position, updated_at FROM tasks ORDER BY id",
    )
    .fetch_all(pool)
    .await
    .expect("Failed to snapshot tasks")
}

#[tokio::test]
async fn test_failure_after_partial_shift_rolls_back() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let fx = seed(&pool).await;

    // Both strategies shift the source column before the item changes column
    sqlx::query(
        r#"CREATE TRIGGER block_column_change
           BEFORE UPDATE OF column_id ON tasks
           WHEN NEW.column_id <> OLD.column_id
           BEGIN
               SELECT RAISE(ABORT, 'column change blocked');
           END"#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let before = snapshot(&pool).await;
    for strategy in STRATEGIES {
        let err = move_task(&pool, fx.t1, fx.column_a, fx.column_b, 0, 0, strategy)
            .await
            .unwrap_err();
        assert!(
            matches!(err, PositionError::Database(_)),
            "{strategy}: {err:?}"
        );
        assert_eq!(snapshot(&pool).await, before, "{strategy}");
    }

    assert_eq!(
        layout(&pool, fx.column_a).await,
        vec![(fx.t1, 0), (fx.t2, 1), (fx.t3, 2)]
    );
    assert_eq!(layout(&pool, fx.column_b).await, vec![(fx.t4, 0)]);

    // Moves that stay in one column are unaffected
    move_task(&pool, fx.t1, fx.column_a, fx.column_a, 0, 2, MoveStrategy::Reindex)
        .await
        .unwrap();
    assert_eq!(
        layout(&pool, fx.column_a).await,
        vec![(fx.t2, 0), (fx.t3, 1), (fx.t1, 2)]
    );
}

#[tokio::test]
async fn test_move_rejects_negative_index_and_missing_rows() {
    for strategy in STRATEGIES {
        let (pool, _temp_dir) = setup_test_pool().await;
        let fx = seed(&pool).await;

        let err = move_task(&pool, fx.t1, fx.column_a, fx.column_b, -1, 0, strategy)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PositionError::Validation(ValidationError::NegativeIndex {
                field: "sourceIndex",
                ..
            })
        ));

        let err = move_task(&pool, Uuid::new_v4(), fx.column_a, fx.column_b, 0, 0, strategy)
            .await
            .unwrap_err();
        assert!(matches!(err, PositionError::ItemNotFound { .. }), "{strategy}");

        let err = move_task(&pool, fx.t1, fx.column_a, Uuid::new_v4(), 0, 0, strategy)
            .await
            .unwrap_err();
        assert!(
            matches!(err, PositionError::ContainerNotFound { kind: "column", .. }),
            "{strategy}: {err:?}"
        );

        assert_eq!(positions(&pool, fx.column_a).await, vec![0, 1, 2]);
        let t1 = Task::find_by_id(&pool, fx.t1).await.unwrap().unwrap();
        assert_eq!(t1.column_id, fx.column_a);
    }
}

#[tokio::test]
async fn test_density_after_mixed_operations() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let fx = seed(&pool).await;
    let t5 = create_task(&pool, fx.column_b, "T5").await;

    move_task(&pool, fx.t3, fx.column_a, fx.column_b, 2, 1, MoveStrategy::Reindex)
        .await
        .unwrap();
    Task::delete(&pool, fx.t4).await.unwrap();
    move_task(&pool, t5, fx.column_b, fx.column_a, 1, 0, MoveStrategy::ThreeStep)
        .await
        .unwrap();
    create_task(&pool, fx.column_b, "T6").await;
    Task::delete(&pool, fx.t1).await.unwrap();

    for column in [fx.column_a, fx.column_b] {
        let positions = positions(&pool, column).await;
        assert!(is_dense(&positions), "{positions:?}");
    }
    assert_eq!(
        layout(&pool, fx.column_a).await,
        vec![(t5, 0), (fx.t2, 1)]
    );
}

#[tokio::test]
async fn test_bulk_reposition_applies_permutation() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let fx = seed(&pool).await;

    let updates = [
        PositionUpdate {
            id: fx.t3,
            position: 0,
        },
        PositionUpdate {
            id: fx.t1,
            position: 1,
        },
        PositionUpdate {
            id: fx.t2,
            position: 2,
        },
    ];
    Task::reorder(&pool, fx.column_a, &updates).await.unwrap();

    assert_eq!(
        layout(&pool, fx.column_a).await,
        vec![(fx.t3, 0), (fx.t1, 1), (fx.t2, 2)]
    );
}

#[tokio::test]
async fn test_bulk_reposition_rejects_non_dense_sets() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let fx = seed(&pool).await;
    let original = layout(&pool, fx.column_a).await;

    let update = |id, position| PositionUpdate { id, position };
    let invalid: Vec<Vec<PositionUpdate>> = vec![
        // Gap
        vec![update(fx.t1, 0), update(fx.t2, 1), update(fx.t3, 5)],
        // Duplicate position
        vec![update(fx.t1, 0), update(fx.t2, 0), update(fx.t3, 1)],
        // Missing member
        vec![update(fx.t1, 0), update(fx.t2, 1)],
        // Task from another column
        vec![update(fx.t1, 0), update(fx.t2, 1), update(fx.t4, 2)],
        // Same task twice
        vec![update(fx.t1, 0), update(fx.t1, 1), update(fx.t3, 2)],
    ];

    for updates in invalid {
        let err = Task::reorder(&pool, fx.column_a, &updates)
            .await
            .unwrap_err();
        assert!(
            matches!(err, PositionError::InconsistentPositions(_)),
            "{updates:?} gave {err:?}"
        );
        assert_eq!(layout(&pool, fx.column_a).await, original);
    }

    let err = Task::reorder(&pool, fx.column_a, &[update(fx.t1, -1)])
        .await
        .unwrap_err();
    assert!(matches!(err, PositionError::Validation(_)));

    let err = Task::reorder(&pool, Uuid::new_v4(), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, PositionError::ContainerNotFound { .. }));
}

#[tokio::test]
async fn test_column_positions_follow_the_same_rules() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let board = Board::create(&pool, &CreateBoard::new("Board"), Uuid::new_v4())
        .await
        .unwrap();
    let mut ids = Vec::new();
    for title in ["A", "B", "C", "D"] {
        ids.push(
            Column::create(&pool, board.id, &CreateColumn::new(title), Uuid::new_v4())
                .await
                .unwrap()
                .id,
        );
    }

    let updates: Vec<_> = ids
        .iter()
        .rev()
        .zip(0..)
        .map(|(&id, position)| PositionUpdate { id, position })
        .collect();
    Column::reorder(&pool, board.id, &updates).await.unwrap();
    Column::delete(&pool, ids[2]).await.unwrap();

    let slots = PositionManager::new(&pool)
        .slots::<Column>(board.id)
        .await
        .unwrap();
    let order: Vec<_> = slots.iter().map(|slot| slot.id).collect();
    let positions: Vec<_> = slots.iter().map(|slot| slot.position).collect();
    assert_eq!(order, vec![ids[3], ids[1], ids[0]]);
    assert_eq!(positions, vec![0, 1, 2]);
}
