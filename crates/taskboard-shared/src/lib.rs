use serde::{
  Deserialize,
  Deserializer,
  Serialize
};

pub const API_TASKS_PATH: &str =
  "/api/tasks";
pub const API_HEALTH_PATH: &str =
  "/api/health";

/// A task as it travels between the
/// board client and the API server.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskDto {
  #[serde(default)]
  pub id:        String,
  #[serde(default)]
  pub title:     String,
  #[serde(
    default,
    deserialize_with = "nullable_string"
  )]
  pub date:      String,
  #[serde(
    default,
    deserialize_with = "nullable_string"
  )]
  pub time:      String,
  #[serde(default)]
  pub completed: bool
}

/// Partial update. Absent fields are
/// left out of the JSON body entirely so
/// the server can tell "not supplied"
/// from an explicit `completed: false`.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
  Eq,
)]
pub struct TaskPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub title:     Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub date:      Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub time:      Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub completed: Option<bool>
}

impl TaskPatch {
  pub fn completed_only(
    completed: bool
  ) -> Self {
    Self {
      completed: Some(completed),
      ..Self::default()
    }
  }

  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.date.is_none()
      && self.time.is_none()
      && self.completed.is_none()
  }

  /// True when a title was supplied but
  /// is empty after trimming.
  pub fn has_blank_title(&self) -> bool {
    self
      .title
      .as_deref()
      .is_some_and(title_is_blank)
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct TaskEnvelope {
  pub message: String,
  pub task:    TaskDto
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct ApiMessage {
  pub message: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct ApiErrorBody {
  pub error: String
}

pub fn title_is_blank(
  title: &str
) -> bool {
  title.trim().is_empty()
}

fn nullable_string<'de, D>(
  deserializer: D
) -> Result<String, D::Error>
where
  D: Deserializer<'de>
{
  Ok(
    Option::<String>::deserialize(
      deserializer
    )?
    .unwrap_or_default()
  )
}
