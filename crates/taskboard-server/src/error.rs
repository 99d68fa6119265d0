use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use taskboard_shared::ApiErrorBody;
use thiserror::Error;

use crate::table::TableError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Storage could not be reached.
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps a storage failure, naming the operation for the client.
    pub fn from_table(err: TableError, failed: &str) -> Self {
        match err {
            TableError::Duplicate(id) => Self::Conflict(format!("Task {id} already exists")),
            TableError::Pool(_) => Self::Unavailable(failed.to_string()),
            TableError::Database(_) => Self::Internal(failed.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
