use std::sync::Arc;

use tokio::task;

use crate::error::{ApiError, ApiResult};
use crate::table::{TableError, TaskTable};

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    table: Arc<dyn TaskTable>,
}

impl AppState {
    pub fn new(table: Arc<dyn TaskTable>) -> Self {
        Self { table }
    }

    /// Runs `op` against the table on the blocking pool. `failed` is the
    /// message a client sees when storage errors.
    pub async fn with_table<T, F>(&self, failed: &'static str, op: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn TaskTable) -> Result<T, TableError> + Send + 'static,
    {
        let table = Arc::clone(&self.table);
        match task::spawn_blocking(move || op(table.as_ref())).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                tracing::error!(error = %err, "{failed}");
                Err(ApiError::from_table(err, failed))
            }
            Err(join) => {
                tracing::error!(error = %join, "table worker panicked");
                Err(ApiError::Internal(failed.to_string()))
            }
        }
    }
}
