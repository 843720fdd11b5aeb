use crate::services::resource_service::ResourceError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use std::fmt;

/// An error as returned to HTTP callers: a status, a message and optional
/// structured details. Never carries internal error chains.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<Value>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.message,
            "status": self.status.as_u16()
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }

        (self.status, Json(body)).into_response()
    }
}

impl From<ResourceError> for AppError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::InvalidFormat { .. } => AppError::bad_request(err.to_string()),
            ResourceError::InvalidParameter { field, reason } => {
                AppError::bad_request("Invalid parameter").with_details(json!({ field: reason }))
            }
            ResourceError::NotFound(_) => AppError::not_found(err.to_string()),
            ResourceError::Extraction(_) => AppError::bad_request(err.to_string()),
            ResourceError::ExternalService { status, body } => {
                AppError::new(StatusCode::BAD_GATEWAY, "Song service call failed").with_details(
                    json!({
                        "upstream_status": status,
                        "upstream_body": body,
                    }),
                )
            }
            ResourceError::TransactionTimeout(_) => AppError::internal(err.to_string()),
            ResourceError::Sqlx(inner) => {
                tracing::error!("storage failure: {}", inner);
                AppError::internal("Internal storage error")
            }
        }
    }
}
