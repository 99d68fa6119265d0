use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskboard_shared::{TaskDto, TaskPatch};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub date: String,

    #[serde(default)]
    pub time: String,

    #[serde(default)]
    pub completed: bool,
}

/// User input for a new task; date and time fall back to "now" when absent.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

impl Task {
    /// Merges the supplied fields of `patch`. Blank strings count as not
    /// supplied, so they never clear a stored value.
    pub fn apply_patch(&mut self, patch: &TaskPatch) {
        if let Some(title) = non_blank(patch.title.as_deref()) {
            self.title = title.to_string();
        }
        if let Some(date) = non_blank(patch.date.as_deref()) {
            self.date = date.to_string();
        }
        if let Some(time) = non_blank(patch.time.as_deref()) {
            self.time = time.to_string();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<TaskDto> for Task {
    fn from(dto: TaskDto) -> Self {
        Self {
            id: dto.id,
            title: dto.title,
            date: dto.date,
            time: dto.time,
            completed: dto.completed,
        }
    }
}

impl From<&Task> for TaskDto {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            date: task.date.clone(),
            time: task.time.clone(),
            completed: task.completed,
        }
    }
}

/// One of the three board columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    All,
    Active,
    Completed,
}

impl View {
    pub const EVERY: [View; 3] = [View::All, View::Active, View::Completed];

    pub fn as_str(self) -> &'static str {
        match self {
            View::All => "all",
            View::Active => "active",
            View::Completed => "completed",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            View::All => "All Tasks",
            View::Active => "Active",
            View::Completed => "Completed",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(View::All),
            "active" => Ok(View::Active),
            "completed" | "done" => Ok(View::Completed),
            other => Err(anyhow!(
                "unknown view: {other} (expected all, active or completed)"
            )),
        }
    }
}

static LAST_ISSUED_ID: AtomicI64 = AtomicI64::new(0);

/// Millisecond timestamp token, bumped past the last one this process handed
/// out so two tasks created in the same millisecond still get distinct ids.
pub fn next_task_id(now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis();
    let previous = match LAST_ISSUED_ID.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(millis.max(last + 1))
    }) {
        Ok(prev) | Err(prev) => prev,
    };
    millis.max(previous + 1).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{View, next_task_id};

    #[test]
    fn ids_increase_within_one_millisecond() {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
            .single()
            .expect("valid now");
        let first: i64 = next_task_id(now).parse().expect("numeric id");
        let second: i64 = next_task_id(now).parse().expect("numeric id");
        assert!(second > first);
    }

    #[test]
    fn parses_view_names() {
        assert_eq!("Active".parse::<View>().expect("view"), View::Active);
        assert_eq!("done".parse::<View>().expect("view"), View::Completed);
        assert!("later".parse::<View>().is_err());
    }
}
