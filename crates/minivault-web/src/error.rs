//! Mapping of request failures onto HTTP responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use minivault_common::MinivaultError;
use minivault_llm::LlmError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Body was not a JSON object of the expected shape.
    #[error("Invalid request body: {}", .0.body_text())]
    Body(#[from] JsonRejection),
    #[error(transparent)]
    Request(#[from] MinivaultError),
    #[error(transparent)]
    Backend(#[from] LlmError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Body(rejection)                        => rejection.status(),
            ApiError::Request(MinivaultError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Request(_)                             => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Backend(LlmError::Unavailable(_))      => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Backend(LlmError::Protocol(_))         => StatusCode::BAD_GATEWAY,
            ApiError::Backend(LlmError::Config(_))           => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
