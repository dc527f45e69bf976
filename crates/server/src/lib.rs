use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use db::{DBService, MoveStrategy};
use sqlx::SqlitePool;

pub mod error;
pub mod file_logging;
pub mod middleware;
pub mod routes;

/// Shared handler state.
///
/// `ready` starts out false and is flipped once the database has answered a
/// probe; API routes answer 503 until then and again while shutting down.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    move_strategy: MoveStrategy,
    ready: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(db: DBService, move_strategy: MoveStrategy) -> Self {
        Self {
            db,
            move_strategy,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db.pool
    }

    pub fn move_strategy(&self) -> MoveStrategy {
        self.move_strategy
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Probe the database and mark the state ready if it answers.
    pub async fn probe_database(&self) -> Result<(), sqlx::Error> {
        self.db.ping().await?;
        self.set_ready(true);
        tracing::info!(move_strategy = %self.move_strategy, "Database ready");
        Ok(())
    }
}
