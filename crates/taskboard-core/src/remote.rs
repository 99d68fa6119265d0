use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use taskboard_shared::{
    API_HEALTH_PATH, API_TASKS_PATH, ApiErrorBody, TaskDto, TaskEnvelope, TaskPatch,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("cannot build a task URL from {0}")]
    InvalidUrl(String),
}

/// The task API as the sync controller sees it.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn create(&self, task: &TaskDto) -> Result<TaskDto, RemoteError>;

    async fn list(&self) -> Result<Vec<TaskDto>, RemoteError>;

    async fn update(&self, id: &str, patch: &TaskPatch) -> Result<TaskDto, RemoteError>;

    async fn delete(&self, id: &str) -> Result<(), RemoteError>;

    /// Cheap reachability check.
    async fn health(&self) -> Result<(), RemoteError>;
}

#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    tasks_url: Url,
    health_url: Url,
}

impl HttpRemote {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut base = Url::parse(base_url.trim())
            .with_context(|| format!("invalid API base URL: {base_url}"))?;
        if !base.path().ends_with('/') {
            let dir = format!("{}/", base.path());
            base.set_path(&dir);
        }
        let tasks_url = endpoint(&base, API_TASKS_PATH)
            .with_context(|| format!("invalid API base URL: {base_url}"))?;
        let health_url = endpoint(&base, API_HEALTH_PATH)
            .with_context(|| format!("invalid API base URL: {base_url}"))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building HTTP client for task sync")?;

        Ok(Self {
            client,
            tasks_url,
            health_url,
        })
    }

    pub fn tasks_url(&self) -> &Url {
        &self.tasks_url
    }

    fn task_url(&self, id: &str) -> Result<Url, RemoteError> {
        let mut url = self.tasks_url.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::InvalidUrl(self.tasks_url.to_string()))?
            .push(id);
        Ok(url)
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    #[tracing::instrument(skip(self, task), fields(task_id = %task.id))]
    async fn create(&self, task: &TaskDto) -> Result<TaskDto, RemoteError> {
        let url = self.tasks_url.clone();
        let response = self.client.post(url.clone()).json(task).send().await;
        let envelope: TaskEnvelope = read_json(&url, response).await?;
        Ok(envelope.task)
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self) -> Result<Vec<TaskDto>, RemoteError> {
        let url = self.tasks_url.clone();
        let response = self.client.get(url.clone()).send().await;
        let tasks: Vec<TaskDto> = read_json(&url, response).await?;
        debug!(count = tasks.len(), "fetched remote tasks");
        Ok(tasks)
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update(&self, id: &str, patch: &TaskPatch) -> Result<TaskDto, RemoteError> {
        let url = self.task_url(id)?;
        let response = self.client.put(url.clone()).json(patch).send().await;
        let envelope: TaskEnvelope = read_json(&url, response).await?;
        Ok(envelope.task)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let url = self.task_url(id)?;
        let response = self.client.delete(url.clone()).send().await;
        ensure_success(&url, response).await.map(|_| ())
    }

    async fn health(&self) -> Result<(), RemoteError> {
        let url = self.health_url.clone();
        let response = self.client.get(url.clone()).send().await;
        ensure_success(&url, response).await.map(|_| ())
    }
}

/// Resolves an absolute route path below `base`, keeping any path prefix.
fn endpoint(base: &Url, route: &str) -> anyhow::Result<Url> {
    Ok(base.join(route.trim_start_matches('/'))?)
}

async fn ensure_success(
    url: &Url,
    response: Result<Response, reqwest::Error>,
) -> Result<Response, RemoteError> {
    let response = response.map_err(|source| RemoteError::Transport {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|parsed| parsed.error)
        .unwrap_or(body);

    Err(RemoteError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        message,
    })
}

async fn read_json<T: DeserializeOwned>(
    url: &Url,
    response: Result<Response, reqwest::Error>,
) -> Result<T, RemoteError> {
    ensure_success(url, response)
        .await?
        .json::<T>()
        .await
        .map_err(|source| RemoteError::Decode {
            url: url.to_string(),
            source,
        })
}
