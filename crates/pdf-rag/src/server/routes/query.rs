//! Question endpoint

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::sessions::credential_from_headers;
use crate::error::Result;
use crate::server::state::AppState;
use crate::types::Answer;

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

/// POST /api/sessions/:id/query - Answer a question about the session's document
pub async fn ask_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<Answer>> {
    let handle = state.session(&id)?;
    let mut session = handle.lock().await;
    if let Some(credential) = credential_from_headers(&headers)? {
        session.set_credential(credential);
    }

    match session.ask(state.context(), &request.question).await {
        Ok(answer) => Ok(Json(answer)),
        Err(e) => {
            tracing::warn!("Question in session {} failed: {}", id, e);
            Err(e)
        }
    }
}
