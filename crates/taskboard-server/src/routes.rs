use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use taskboard_shared::{ApiMessage, TaskDto, TaskEnvelope, TaskPatch, title_is_blank};
use tracing::{info, instrument};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const TITLE_REQUIRED: &str = "Task title is required";

#[instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<ApiMessage>> {
    state
        .with_table("Database unreachable", |table| table.ping())
        .await
        .map_err(|err| ApiError::Unavailable(err.to_string()))?;
    Ok(Json(ApiMessage {
        message: "ok".to_string(),
    }))
}

#[instrument(skip(state))]
pub async fn list_tasks(State(state): State<AppState>) -> ApiResult<Json<Vec<TaskDto>>> {
    info!("list_tasks invoked");
    let tasks = state
        .with_table("Failed to fetch tasks", |table| table.list())
        .await?;
    info!(count = tasks.len(), "list_tasks returning rows");
    Ok(Json(tasks))
}

#[instrument(skip(state, task), fields(task_id = %task.id, title_len = task.title.len()))]
pub async fn create_task(
    State(state): State<AppState>,
    Json(mut task): Json<TaskDto>,
) -> ApiResult<(StatusCode, Json<TaskEnvelope>)> {
    info!(
        has_date = !task.date.is_empty(),
        has_time = !task.time.is_empty(),
        completed = task.completed,
        "create_task invoked"
    );
    if title_is_blank(&task.title) {
        return Err(ApiError::BadRequest(TITLE_REQUIRED.to_string()));
    }
    if task.id.trim().is_empty() {
        task.id = Utc::now().timestamp_millis().to_string();
        info!(task_id = %task.id, "assigned server id");
    }

    let row = task.clone();
    state
        .with_table("Failed to add task", move |table| table.insert(&row))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TaskEnvelope {
            message: "Task added successfully".to_string(),
            task,
        }),
    ))
}

#[instrument(skip(state, patch), fields(task_id = %id))]
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> ApiResult<Json<TaskEnvelope>> {
    info!(?patch, "update_task invoked");
    if patch.has_blank_title() {
        return Err(ApiError::BadRequest(TITLE_REQUIRED.to_string()));
    }

    let key = id.clone();
    let updated = state
        .with_table("Failed to update task", move |table| table.update(&key, &patch))
        .await?;
    let task = updated.ok_or_else(|| ApiError::NotFound(format!("Task {id} not found")))?;

    Ok(Json(TaskEnvelope {
        message: "Task updated successfully".to_string(),
        task,
    }))
}

#[instrument(skip(state), fields(task_id = %id))]
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiMessage>> {
    info!("delete_task invoked");
    let key = id.clone();
    let removed = state
        .with_table("Failed to delete task", move |table| table.delete(&key))
        .await?;
    if !removed {
        info!("delete_task found no row; treating as deleted");
    }
    Ok(Json(ApiMessage {
        message: "Task deleted successfully".to_string(),
    }))
}
