//! Mapping of store errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::store::{ErrorCode, ErrorContext, StoreError};

#[derive(Debug)]
pub enum ApiError {
    Store(StoreError),
    /// The blocking task running the store call panicked or was cancelled.
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a ErrorContext>,
}

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::ObjectDoesNotExist | ErrorCode::TransactionDoesNotExist => StatusCode::NOT_FOUND,
        ErrorCode::ObjectAlreadyExists | ErrorCode::VersionMismatch => StatusCode::CONFLICT,
        ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
        ErrorCode::CannotReadConfigurationFile | ErrorCode::CorruptArtifact | ErrorCode::IoError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Store(e) => {
                let code = e.code();
                let status = status_for(code);
                if status.is_server_error() {
                    tracing::error!(error = %e, "Store operation failed");
                }
                let body = ErrorBody {
                    code,
                    message: e.to_string(),
                    context: e.context(),
                };
                (status, Json(body)).into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal error");
                let body = serde_json::json!({ "code": "internal_error", "message": message });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
