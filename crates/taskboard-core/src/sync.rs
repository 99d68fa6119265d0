//! Optimistic sync between the local board and the task API.
//!
//! Every intent mutates the local store first, synchronously. The matching
//! remote write is spawned afterwards and only when the network provider
//! reports online. A remote failure is logged and nothing is rolled back;
//! the server catches up on the next successful write or fetch touching the
//! same task.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use taskboard_shared::{TaskDto, TaskPatch, title_is_blank};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::board::{Board, Move, partition};
use crate::local::LocalStore;
use crate::network::NetworkStatus;
use crate::remote::{RemoteApi, RemoteError};
use crate::task::{NewTask, Task, View, next_task_id};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("task title is required")]
    EmptyTitle,
}

/// Where a drag started or ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragLocation {
    pub view: View,
    pub index: usize,
}

/// Outcome of a drag gesture; `destination` is `None` when it was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragResult {
    pub source: DragLocation,
    pub destination: Option<DragLocation>,
}

/// Handle on a best-effort remote write. Dropping it leaves the write
/// running in the background.
#[derive(Debug)]
pub struct RemoteWrite {
    handle: Option<JoinHandle<()>>,
}

impl RemoteWrite {
    fn skipped() -> Self {
        Self { handle: None }
    }

    /// False when the write was never attempted (offline, no-op intent).
    pub fn was_issued(&self) -> bool {
        self.handle.is_some()
    }

    /// Waits for the write to finish. The outcome is already logged.
    pub async fn settle(self) {
        if let Some(handle) = self.handle
            && let Err(err) = handle.await
        {
            error!(error = %err, "remote write task did not complete");
        }
    }
}

pub struct SyncController {
    store: Arc<Mutex<LocalStore>>,
    remote: Arc<dyn RemoteApi>,
    network: Arc<dyn NetworkStatus>,
}

impl SyncController {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteApi>,
        network: Arc<dyn NetworkStatus>,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            remote,
            network,
        }
    }

    /// Copy of the current board.
    pub fn board(&self) -> Board {
        self.store.lock().board().clone()
    }

    pub fn is_online(&self) -> bool {
        self.network.is_online()
    }

    #[tracing::instrument(skip(self, data), fields(title_len = data.title.len()))]
    pub fn add_task(&self, data: NewTask) -> Result<(Task, RemoteWrite), SyncError> {
        if title_is_blank(&data.title) {
            return Err(SyncError::EmptyTitle);
        }

        let now = Utc::now();
        let task = Task {
            id: next_task_id(now),
            title: data.title,
            date: data.date.unwrap_or_default(),
            time: data.time.unwrap_or_default(),
            completed: false,
        };
        let task = self.store.lock().add_local(task, now);
        info!(task_id = %task.id, "task added locally");

        let remote = Arc::clone(&self.remote);
        let dto = TaskDto::from(&task);
        let write = self.apply_remote("create", &task.id, async move {
            remote.create(&dto).await.map(|_| ())
        });
        Ok((task, write))
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_task(&self, id: &str) -> RemoteWrite {
        self.store.lock().delete_local(id);

        let remote = Arc::clone(&self.remote);
        let task_id = id.to_string();
        self.apply_remote("delete", id, async move { remote.delete(&task_id).await })
    }

    /// Sends `updates` to the server exactly as given, even when the id is
    /// unknown locally.
    #[tracing::instrument(skip(self, updates))]
    pub fn update_task(&self, id: &str, updates: TaskPatch) -> Result<RemoteWrite, SyncError> {
        if updates.has_blank_title() {
            return Err(SyncError::EmptyTitle);
        }

        self.store.lock().update_local(id, &updates);

        let remote = Arc::clone(&self.remote);
        let task_id = id.to_string();
        Ok(self.apply_remote("update", id, async move {
            remote.update(&task_id, &updates).await.map(|_| ())
        }))
    }

    /// Flips `completed`; unknown ids do nothing.
    #[tracing::instrument(skip(self))]
    pub fn toggle_complete(&self, id: &str) -> Result<RemoteWrite, SyncError> {
        let current = self.store.lock().board().find(id).map(|task| task.completed);
        match current {
            Some(completed) => self.update_task(id, TaskPatch::completed_only(!completed)),
            None => {
                debug!(task_id = id, "toggle for unknown task ignored");
                Ok(RemoteWrite::skipped())
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn reorder_task(&self, drag: DragResult) -> RemoteWrite {
        let Some(destination) = drag.destination else {
            debug!("drag cancelled");
            return RemoteWrite::skipped();
        };

        let mv = Move {
            source: drag.source.view,
            source_index: drag.source.index,
            destination: destination.view,
            destination_index: destination.index,
        };
        let Some(reordered) = self.store.lock().reorder_local(mv) else {
            return RemoteWrite::skipped();
        };

        if !mv.crosses_views() {
            return RemoteWrite::skipped();
        }

        let remote = Arc::clone(&self.remote);
        let task_id = reordered.task.id.clone();
        let patch = TaskPatch::completed_only(reordered.task.completed);
        self.apply_remote("reorder", &reordered.task.id, async move {
            remote.update(&task_id, &patch).await.map(|_| ())
        })
    }

    /// Replaces local tasks with the server's list when online. Whatever
    /// happens, the board ends up initialized.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_tasks(&self) {
        if !self.network.is_online() {
            debug!("offline; skipping fetch");
            self.store.lock().mark_initialized();
            return;
        }

        match self.remote.list().await {
            Ok(dtos) => {
                let all: Vec<Task> = dtos.into_iter().map(Task::from).collect();
                let (active, completed) = partition(&all);
                info!(
                    count = all.len(),
                    active = active.len(),
                    completed = completed.len(),
                    "reconciled board with server"
                );
                self.store.lock().replace_all(all, active, completed, Utc::now());
            }
            Err(err) => {
                error!(error = %err, "failed fetching tasks");
                self.store.lock().mark_initialized();
            }
        }
    }

    /// Startup: show the saved snapshot right away, then let the server's
    /// list overwrite it if online.
    #[tracing::instrument(skip(self))]
    pub async fn initialize_app(&self) {
        let snapshot = self.store.lock().saved_snapshot();
        if !snapshot.all().is_empty() {
            self.store.lock().replace_all(
                snapshot.all().to_vec(),
                snapshot.active().to_vec(),
                snapshot.completed().to_vec(),
                Utc::now(),
            );
        }

        if self.network.is_online() {
            self.fetch_tasks().await;
        } else {
            self.store.lock().mark_initialized();
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn handle_network_change(&self, online: bool) {
        self.store.lock().set_network_status(online);
        if online {
            info!("back online; reconciling with server");
            self.initialize_app().await;
        } else {
            warn!("went offline; remote writes paused");
        }
    }

    /// Applies every status change from the network provider until it goes
    /// away.
    pub async fn watch_network(self: Arc<Self>) {
        let mut changes = self.network.subscribe();
        while changes.changed().await.is_ok() {
            let online = *changes.borrow_and_update();
            self.handle_network_change(online).await;
        }
        debug!("network status channel closed");
    }

    /// Runs `call` in the background when online. Success stamps
    /// `lastSync`; failure is only logged. Task data is never touched here.
    fn apply_remote<F>(&self, op: &'static str, task_id: &str, call: F) -> RemoteWrite
    where
        F: Future<Output = Result<(), RemoteError>> + Send + 'static,
    {
        if !self.network.is_online() {
            debug!(op, task_id, "offline; remote write skipped");
            return RemoteWrite::skipped();
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!(op, task_id, "no async runtime; remote write skipped");
            return RemoteWrite::skipped();
        };

        let store = Arc::clone(&self.store);
        let task_id = task_id.to_string();
        let handle = runtime.spawn(async move {
            match call.await {
                Ok(()) => {
                    debug!(op, task_id, "remote write applied");
                    store.lock().set_last_sync(Utc::now());
                }
                Err(err) => {
                    error!(op, task_id, error = %err, "remote write failed; keeping local change");
                }
            }
        });

        RemoteWrite {
            handle: Some(handle),
        }
    }
}
