//! Acquisition request handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use shelfhound_core::{AcquisitionReply, ParsedInput};
use tracing::info;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub text: String,
    /// Where lifecycle notifications are routed, e.g. a chat id.
    pub owner: String,
}

#[derive(Debug, Deserialize)]
pub struct InterpretRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

/// POST /api/v1/requests
///
/// Interpret the text and, for a search, find, submit and track the best
/// release. Failures come back as a user-facing `message`, not an HTTP error.
pub async fn create_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRequest>,
) -> Result<Json<AcquisitionReply>, impl IntoResponse> {
    if body.text.trim().is_empty() {
        return Err(bad_request("text cannot be empty"));
    }
    if body.owner.trim().is_empty() {
        return Err(bad_request("owner cannot be empty"));
    }

    info!(owner = %body.owner, "Handling acquisition request");
    let reply = state.service().handle_text(&body.text, &body.owner).await;
    Ok(Json(reply))
}

/// POST /api/v1/interpret
///
/// Interpreter output only; no search, no side effects.
pub async fn interpret(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InterpretRequest>,
) -> Json<ParsedInput> {
    Json(state.service().interpret(&body.text))
}
