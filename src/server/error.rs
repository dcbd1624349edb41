use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::LoaderError;
use crate::loader::LoadError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced to HTTP clients
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    #[inline]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Load(LoadError::NotPermitted) => StatusCode::FORBIDDEN,
            Self::Load(LoadError::Conflict) => StatusCode::CONFLICT,
            Self::Load(LoadError::InvalidOffset { .. }) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LoaderError> for ApiError {
    #[inline]
    fn from(err: LoaderError) -> Self {
        match err {
            LoaderError::Ingestion(load) => Self::Load(load),
            LoaderError::InvalidInput(message) => Self::BadRequest(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
