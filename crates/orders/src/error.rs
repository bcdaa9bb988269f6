//! Unified error handling for the orders API.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::OrderError;
use crate::store::StoreError;

/// Application-level error type for the orders API.
#[derive(Debug, Error)]
pub enum AppError {
    /// An order service operation failed.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Order(err.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Order(err) => match err {
                OrderError::MissingFields { .. } | OrderError::InvalidFields { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                OrderError::InvalidToken | OrderError::TokenExpired { .. } => StatusCode::FORBIDDEN,
                OrderError::InsufficientStock { .. } | OrderError::InvalidTransition { .. } => {
                    StatusCode::CONFLICT
                }
                OrderError::ProductNotFound { .. }
                | OrderError::VariantNotFound { .. }
                | OrderError::OrderNotFound { .. }
                | OrderError::CustomerNotFound { .. } => StatusCode::NOT_FOUND,
                OrderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Don't expose internal error details to clients
        let body = match &self {
            Self::Order(OrderError::Store(_)) => {
                let event_id = sentry::capture_error(&self);
                tracing::error!(
                    error = %self,
                    sentry_event_id = %event_id,
                    "Orders request error"
                );
                json!({
                    "error": "internal_error",
                    "message": "Internal server error",
                    "detail": {},
                })
            }
            Self::Order(err) => json!({
                "error": err.code(),
                "message": err.to_string(),
                "detail": err.detail(),
            }),
            Self::BadRequest(message) => json!({
                "error": "bad_request",
                "message": message,
                "detail": {},
            }),
        };

        (status, Json(body)).into_response()
    }
}
