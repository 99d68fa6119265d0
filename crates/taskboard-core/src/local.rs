use std::sync::Arc;

use chrono::{DateTime, Utc};
use taskboard_shared::TaskPatch;
use tracing::{debug, error, info, warn};

use crate::board::{Board, Move, Reordered};
use crate::datastore::BoardStore;
use crate::task::Task;

/// The board plus its persistence. Every transition is written back to the
/// store before returning; a failed write is logged and the in-memory board
/// stays authoritative.
pub struct LocalStore {
    board: Board,
    persistence: Arc<dyn BoardStore>,
}

impl LocalStore {
    /// Loads the saved board. A missing or unreadable record yields an empty,
    /// uninitialized board. `is_online` always reflects the caller's current
    /// reachability, not whatever was saved last.
    #[tracing::instrument(skip(persistence))]
    pub fn open(persistence: Arc<dyn BoardStore>, is_online: bool) -> Self {
        let mut board = load_or_empty(persistence.as_ref(), is_online);
        board.set_network_status(is_online);
        info!(
            tasks = board.all().len(),
            initialized = board.is_initialized(),
            "loaded local board"
        );
        Self { board, persistence }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Reads the persisted record again without touching the live board.
    pub fn saved_snapshot(&self) -> Board {
        load_or_empty(self.persistence.as_ref(), self.board.is_online())
    }

    #[tracing::instrument(skip(self, task), fields(task_id = %task.id))]
    pub fn add_local(&mut self, task: Task, now: DateTime<Utc>) -> Task {
        let added = self.board.add(task, now);
        self.commit("add");
        added
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_local(&mut self, id: &str) -> bool {
        let removed = self.board.delete(id);
        if !removed {
            debug!(task_id = id, "delete for unknown task ignored");
        }
        self.commit("delete");
        removed
    }

    #[tracing::instrument(skip(self, patch))]
    pub fn update_local(&mut self, id: &str, patch: &TaskPatch) -> Option<Task> {
        let updated = self.board.update(id, patch);
        match updated {
            Some(_) => self.commit("update"),
            None => debug!(task_id = id, "update for unknown task ignored"),
        }
        updated
    }

    #[tracing::instrument(skip(self))]
    pub fn reorder_local(&mut self, mv: Move) -> Option<Reordered> {
        let reordered = self.board.reorder(mv);
        if reordered.is_none() {
            warn!(
                view = %mv.source,
                index = mv.source_index,
                "drag source index out of range; ignoring"
            );
        }
        self.commit("reorder");
        reordered
    }

    pub fn set_network_status(&mut self, online: bool) {
        self.board.set_network_status(online);
        self.commit("network_status");
    }

    pub fn set_last_sync(&mut self, at: DateTime<Utc>) {
        self.board.set_last_sync(at);
        self.commit("last_sync");
    }

    pub fn mark_initialized(&mut self) {
        self.board.mark_initialized();
        self.commit("initialized");
    }

    #[tracing::instrument(skip(self, all, active, completed), fields(count = all.len()))]
    pub fn replace_all(
        &mut self,
        all: Vec<Task>,
        active: Vec<Task>,
        completed: Vec<Task>,
        now: DateTime<Utc>,
    ) {
        self.board.replace_all(all, active, completed, now);
        self.commit("replace_all");
    }

    fn commit(&mut self, op: &'static str) {
        if let Err(violation) = self.board.check_invariants() {
            warn!(op, %violation, "board partitions inconsistent; rebuilding from all");
            self.board.repartition();
        }

        if let Err(err) = self.persistence.save(&self.board) {
            error!(op, error = %err, "could not save board");
        }
    }
}

fn load_or_empty(persistence: &dyn BoardStore, is_online: bool) -> Board {
    match persistence.load() {
        Ok(Some(board)) => board,
        Ok(None) => Board::empty(is_online),
        Err(err) => {
            warn!(error = %err, "could not load saved board; starting empty");
            Board::empty(is_online)
        }
    }
}
