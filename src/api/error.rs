use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::engine::EngineError;

/// Everything a handler can fail with, rendered as `{"error", "message"}` JSON.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    Body(JsonRejection),
    Path(PathRejection),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(e) => match e {
                EngineError::NotFound(..) | EngineError::PhoneNotFound(_) => StatusCode::NOT_FOUND,
                EngineError::Conflict(_)
                | EngineError::DuplicateSurfaceName(_)
                | EngineError::DuplicatePhoneNumber(_) => StatusCode::CONFLICT,
                EngineError::Validation(_) | EngineError::LimitExceeded(_) => {
                    StatusCode::BAD_REQUEST
                }
                EngineError::WalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Body(_) | ApiError::Path(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Engine(e) => match e {
                EngineError::NotFound(..) | EngineError::PhoneNotFound(_) => "not_found",
                EngineError::Conflict(_) => "conflict",
                EngineError::DuplicateSurfaceName(_) | EngineError::DuplicatePhoneNumber(_) => {
                    "constraint_violation"
                }
                EngineError::Validation(_) => "validation",
                EngineError::LimitExceeded(_) => "limit_exceeded",
                EngineError::WalError(_) => "internal",
            },
            ApiError::Body(_) => "invalid_body",
            ApiError::Path(_) => "invalid_path",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Engine(e) => e.to_string(),
            ApiError::Body(r) => r.body_text(),
            ApiError::Path(r) => r.body_text(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::Body(r)
    }
}

impl From<PathRejection> for ApiError {
    fn from(r: PathRejection) -> Self {
        ApiError::Path(r)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self.message());
        }
        let body = ErrorBody {
            error: self.kind(),
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}
