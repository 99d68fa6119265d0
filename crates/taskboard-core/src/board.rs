//! Board state and its transitions.
//!
//! `all` is the source of truth and holds the user's display order. `active`
//! and `completed` partition it by the `completed` flag; every transition
//! here keeps that partition intact. Persistence lives one layer up in
//! [`crate::local::LocalStore`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskboard_shared::TaskPatch;
use thiserror::Error;

use crate::datetime::default_task_stamp;
use crate::task::{Task, View};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    #[serde(default)]
    all: Vec<Task>,

    #[serde(default)]
    active: Vec<Task>,

    #[serde(default)]
    completed: Vec<Task>,

    #[serde(default)]
    last_sync: Option<DateTime<Utc>>,

    #[serde(default)]
    is_online: bool,

    #[serde(default)]
    initialized: bool,
}

/// A finished drag: the element at `source_index` of `source` lands at
/// `destination_index` of `destination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub source: View,
    pub source_index: usize,
    pub destination: View,
    pub destination_index: usize,
}

impl Move {
    pub fn crosses_views(&self) -> bool {
        self.source != self.destination
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reordered {
    /// The moved task as it now reads in `all`.
    pub task: Task,
    pub completion_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("task {id} appears more than once in {view}")]
    Duplicate { id: String, view: View },
    #[error("task {id} is both active and completed")]
    Overlap { id: String },
    #[error("task {id} in {view} is missing from all")]
    Missing { id: String, view: View },
    #[error("task {id} in {view} differs from its entry in all")]
    Diverged { id: String, view: View },
    #[error("task {id} sits in {view} with the wrong completion flag")]
    WrongPartition { id: String, view: View },
    #[error("task {id} is in all but in neither partition")]
    Unpartitioned { id: String },
}

impl Board {
    pub fn empty(is_online: bool) -> Self {
        Self {
            is_online,
            ..Self::default()
        }
    }

    pub fn all(&self) -> &[Task] {
        &self.all
    }

    pub fn active(&self) -> &[Task] {
        &self.active
    }

    pub fn completed(&self) -> &[Task] {
        &self.completed
    }

    pub fn view(&self, view: View) -> &[Task] {
        match view {
            View::All => &self.all,
            View::Active => &self.active,
            View::Completed => &self.completed,
        }
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    pub fn is_online(&self) -> bool {
        self.is_online
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        self.all.iter().find(|task| task.id == id)
    }

    fn view_mut(&mut self, view: View) -> &mut Vec<Task> {
        match view {
            View::All => &mut self.all,
            View::Active => &mut self.active,
            View::Completed => &mut self.completed,
        }
    }

    /// New tasks go to the front of `all` and `active`. Blank date or time
    /// are filled from `now`.
    pub fn add(&mut self, mut task: Task, now: DateTime<Utc>) -> Task {
        if task.date.trim().is_empty() || task.time.trim().is_empty() {
            let stamp = default_task_stamp(now);
            if task.date.trim().is_empty() {
                task.date = stamp.date;
            }
            if task.time.trim().is_empty() {
                task.time = stamp.time;
            }
        }
        task.completed = false;

        self.all.insert(0, task.clone());
        self.active.insert(0, task.clone());
        task
    }

    /// Returns whether anything was removed.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.all.len() + self.active.len() + self.completed.len();
        self.all.retain(|task| task.id != id);
        self.active.retain(|task| task.id != id);
        self.completed.retain(|task| task.id != id);
        before != self.all.len() + self.active.len() + self.completed.len()
    }

    /// Merges `patch` into the task and re-partitions from `all`.
    pub fn update(&mut self, id: &str, patch: &TaskPatch) -> Option<Task> {
        let task = self.all.iter_mut().find(|task| task.id == id)?;
        task.apply_patch(patch);
        let updated = task.clone();
        self.repartition();
        Some(updated)
    }

    /// Applies a drag.
    ///
    /// Within one view the element is only moved. Across views the moved
    /// task's flag becomes `true` when dropped on `completed`, `false` when
    /// dropped on `active`, and stays as it was when dropped on `all`:
    ///
    /// - onto `active`/`completed`: the task leaves whichever partition held
    ///   it, lands at `destination_index` of the target partition, and its
    ///   entry in `all` is patched in place.
    /// - onto `all`: the task is moved within `all`; partitions are kept.
    ///
    /// Returns `None` when `source_index` is out of range.
    pub fn reorder(&mut self, mv: Move) -> Option<Reordered> {
        let original = self.view(mv.source).get(mv.source_index)?.clone();

        if !mv.crosses_views() {
            let seq = self.view_mut(mv.source);
            let moved = seq.remove(mv.source_index);
            let at = mv.destination_index.min(seq.len());
            seq.insert(at, moved);
            return Some(Reordered {
                task: original,
                completion_changed: false,
            });
        }

        let mut moved = original.clone();
        moved.completed = match mv.destination {
            View::Completed => true,
            View::Active => false,
            View::All => original.completed,
        };

        match mv.destination {
            View::All => {
                self.all.retain(|task| task.id != moved.id);
                let at = mv.destination_index.min(self.all.len());
                self.all.insert(at, moved.clone());
            }
            destination => {
                self.active.retain(|task| task.id != moved.id);
                self.completed.retain(|task| task.id != moved.id);
                let seq = self.view_mut(destination);
                let at = mv.destination_index.min(seq.len());
                seq.insert(at, moved.clone());
                for entry in self.all.iter_mut().filter(|task| task.id == moved.id) {
                    *entry = moved.clone();
                }
            }
        }

        Some(Reordered {
            completion_changed: moved.completed != original.completed,
            task: moved,
        })
    }

    pub fn set_network_status(&mut self, online: bool) {
        self.is_online = online;
    }

    pub fn set_last_sync(&mut self, at: DateTime<Utc>) {
        self.last_sync = Some(at);
    }

    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub fn replace_all(
        &mut self,
        all: Vec<Task>,
        active: Vec<Task>,
        completed: Vec<Task>,
        now: DateTime<Utc>,
    ) {
        self.all = all;
        self.active = active;
        self.completed = completed;
        self.last_sync = Some(now);
        self.initialized = true;
    }

    /// Rebuilds `active` and `completed` from `all`, dropping any custom
    /// order they had. Repeated ids in `all` keep their first entry.
    pub fn repartition(&mut self) {
        let mut seen = HashSet::with_capacity(self.all.len());
        self.all.retain(|task| seen.insert(task.id.clone()));
        let (active, completed) = partition(&self.all);
        self.active = active;
        self.completed = completed;
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut all_ids = HashSet::with_capacity(self.all.len());
        for task in &self.all {
            if !all_ids.insert(task.id.as_str()) {
                return Err(InvariantViolation::Duplicate {
                    id: task.id.clone(),
                    view: View::All,
                });
            }
        }

        let mut partitioned = HashSet::with_capacity(self.all.len());
        for (view, expect_completed) in [(View::Active, false), (View::Completed, true)] {
            for task in self.view(view) {
                if !partitioned.insert(task.id.as_str()) {
                    return Err(if self.active.iter().any(|t| t.id == task.id)
                        && self.completed.iter().any(|t| t.id == task.id)
                    {
                        InvariantViolation::Overlap {
                            id: task.id.clone(),
                        }
                    } else {
                        InvariantViolation::Duplicate {
                            id: task.id.clone(),
                            view,
                        }
                    });
                }
                if task.completed != expect_completed {
                    return Err(InvariantViolation::WrongPartition {
                        id: task.id.clone(),
                        view,
                    });
                }
                match self.find(&task.id) {
                    None => {
                        return Err(InvariantViolation::Missing {
                            id: task.id.clone(),
                            view,
                        });
                    }
                    Some(entry) if entry != task => {
                        return Err(InvariantViolation::Diverged {
                            id: task.id.clone(),
                            view,
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        if let Some(task) = self.all.iter().find(|task| !partitioned.contains(task.id.as_str())) {
            return Err(InvariantViolation::Unpartitioned {
                id: task.id.clone(),
            });
        }

        Ok(())
    }
}

/// Splits tasks into `(active, completed)`, keeping their relative order.
pub fn partition(tasks: &[Task]) -> (Vec<Task>, Vec<Task>) {
    tasks.iter().cloned().partition(|task| !task.completed)
}
