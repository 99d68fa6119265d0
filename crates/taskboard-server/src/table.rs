//! Storage for the single `tasks` table.
//!
//! Calls are blocking; handlers run them on tokio's blocking pool. The
//! PostgreSQL client drives its own runtime internally, so a [`PgTaskTable`]
//! must never be called directly from async code.

use anyhow::Context;
use parking_lot::Mutex;
use postgres::error::SqlState;
use postgres::{NoTls, Row};
use r2d2_postgres::PostgresConnectionManager;
use taskboard_shared::{TaskDto, TaskPatch};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum TableError {
    #[error("task {0} already exists")]
    Duplicate(String),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),
}

pub trait TaskTable: Send + Sync {
    fn ping(&self) -> Result<(), TableError>;

    fn insert(&self, task: &TaskDto) -> Result<(), TableError>;

    /// Newest first.
    fn list(&self) -> Result<Vec<TaskDto>, TableError>;

    /// Merges the supplied fields; `Ok(None)` when no row has `id`.
    fn update(&self, id: &str, patch: &TaskPatch) -> Result<Option<TaskDto>, TableError>;

    /// Returns whether a row was removed.
    fn delete(&self, id: &str) -> Result<bool, TableError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id         TEXT PRIMARY KEY,
    title      TEXT NOT NULL,
    date       TEXT,
    time       TEXT,
    completed  BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

type PgPool = r2d2::Pool<PostgresConnectionManager<NoTls>>;

pub struct PgTaskTable {
    pool: PgPool,
}

impl PgTaskTable {
    #[tracing::instrument(skip(database_url))]
    pub fn connect(database_url: &str, pool_size: u32) -> anyhow::Result<Self> {
        let config: postgres::Config = database_url.parse().context("invalid DATABASE_URL")?;
        let manager = PostgresConnectionManager::new(config, NoTls);
        let pool = r2d2::Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .context("failed to build database connection pool")?;
        info!(pool_size, "database pool ready");
        Ok(Self { pool })
    }

    /// Creates the table when it is missing. Existing tables are left alone.
    pub fn ensure_schema(&self) -> Result<(), TableError> {
        let mut conn = self.pool.get()?;
        conn.batch_execute(SCHEMA)?;
        debug!("tasks table present");
        Ok(())
    }
}

impl TaskTable for PgTaskTable {
    fn ping(&self) -> Result<(), TableError> {
        let mut conn = self.pool.get()?;
        conn.batch_execute("SELECT 1")?;
        Ok(())
    }

    fn insert(&self, task: &TaskDto) -> Result<(), TableError> {
        let mut conn = self.pool.get()?;
        let result = conn.execute(
            "INSERT INTO tasks (id, title, date, time, completed) VALUES ($1, $2, $3, $4, $5)",
            &[
                &task.id,
                &task.title,
                &non_blank(&task.date),
                &non_blank(&task.time),
                &task.completed,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(err) if err.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                Err(TableError::Duplicate(task.id.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn list(&self) -> Result<Vec<TaskDto>, TableError> {
        let mut conn = self.pool.get()?;
        let rows = conn.query(
            "SELECT id, title, date, time, completed FROM tasks ORDER BY created_at DESC",
            &[],
        )?;
        rows.iter().map(row_to_task).collect()
    }

    fn update(&self, id: &str, patch: &TaskPatch) -> Result<Option<TaskDto>, TableError> {
        let mut conn = self.pool.get()?;
        let row = conn.query_opt(
            "UPDATE tasks SET \
                title = COALESCE($2, title), \
                date = COALESCE($3, date), \
                time = COALESCE($4, time), \
                completed = COALESCE($5, completed) \
             WHERE id = $1 \
             RETURNING id, title, date, time, completed",
            &[
                &id,
                &patch.title.as_deref().and_then(non_blank),
                &patch.date.as_deref().and_then(non_blank),
                &patch.time.as_deref().and_then(non_blank),
                &patch.completed,
            ],
        )?;
        row.as_ref().map(row_to_task).transpose()
    }

    fn delete(&self, id: &str) -> Result<bool, TableError> {
        let mut conn = self.pool.get()?;
        let removed = conn.execute("DELETE FROM tasks WHERE id = $1", &[&id])?;
        Ok(removed > 0)
    }
}

fn row_to_task(row: &Row) -> Result<TaskDto, TableError> {
    Ok(TaskDto {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        date: row.try_get::<_, Option<String>>("date")?.unwrap_or_default(),
        time: row.try_get::<_, Option<String>>("time")?.unwrap_or_default(),
        completed: row.try_get::<_, Option<bool>>("completed")?.unwrap_or(false),
    })
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(value) }
}

/// Process-local table; contents vanish with the server.
#[derive(Debug, Default)]
pub struct MemoryTaskTable {
    rows: Mutex<Vec<TaskDto>>,
}

impl MemoryTaskTable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskTable for MemoryTaskTable {
    fn ping(&self) -> Result<(), TableError> {
        Ok(())
    }

    fn insert(&self, task: &TaskDto) -> Result<(), TableError> {
        let mut rows = self.rows.lock();
        if rows.iter().any(|row| row.id == task.id) {
            return Err(TableError::Duplicate(task.id.clone()));
        }
        let mut stored = task.clone();
        stored.date = non_blank(&stored.date).unwrap_or_default().to_string();
        stored.time = non_blank(&stored.time).unwrap_or_default().to_string();
        rows.push(stored);
        Ok(())
    }

    fn list(&self) -> Result<Vec<TaskDto>, TableError> {
        Ok(self.rows.lock().iter().rev().cloned().collect())
    }

    fn update(&self, id: &str, patch: &TaskPatch) -> Result<Option<TaskDto>, TableError> {
        let mut rows = self.rows.lock();
        let Some(row) = rows.iter_mut().find(|row| row.id == id) else {
            return Ok(None);
        };
        if let Some(title) = patch.title.as_deref().and_then(non_blank) {
            row.title = title.to_string();
        }
        if let Some(date) = patch.date.as_deref().and_then(non_blank) {
            row.date = date.to_string();
        }
        if let Some(time) = patch.time.as_deref().and_then(non_blank) {
            row.time = time.to_string();
        }
        if let Some(completed) = patch.completed {
            row.completed = completed;
        }
        Ok(Some(row.clone()))
    }

    fn delete(&self, id: &str) -> Result<bool, TableError> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|row| row.id != id);
        Ok(rows.len() != before)
    }
}
