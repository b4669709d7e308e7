//! Generation endpoints: full response and plain-text streaming.

use axum::{
    body::Body,
    extract::{Json, State},
    http::header,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use minivault_common::GenerationRequest;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

pub async fn generate(
    State(state): State<SharedState>,
    WithRejection(Json(body), _): WithRejection<Json<GenerateRequest>, ApiError>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let request = GenerationRequest::new(body.prompt, state.max_prompt_chars)?;
    let response = state.handler.generate(request).await?;
    Ok(Json(GenerateResponse { response }))
}

/// Chunks are written to the body as they arrive, with no framing. A backend
/// failure after the first chunk aborts the connection, so the client sees a
/// truncated body rather than an injected error message.
pub async fn stream(
    State(state): State<SharedState>,
    WithRejection(Json(body), _): WithRejection<Json<GenerateRequest>, ApiError>,
) -> Result<Response, ApiError> {
    let request = GenerationRequest::new(body.prompt, state.max_prompt_chars)?;
    let chunks = state.handler.stream(request).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(chunks),
    )
        .into_response())
}
