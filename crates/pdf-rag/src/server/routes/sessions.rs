//! Session lifecycle endpoints

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::session::SessionStatus;
use crate::types::Message;

/// Bearer token from the request, if one was sent
pub(crate) fn credential_from_headers(headers: &HeaderMap) -> Result<Option<Credential>> {
    match headers.get(AUTHORIZATION) {
        None => Ok(None),
        Some(value) => {
            let value = value.to_str().map_err(|_| {
                Error::Authentication("Authorization header is not valid text".to_string())
            })?;
            Credential::from_authorization(value).map(Some)
        }
    }
}

/// POST /api/sessions - Start a session
pub async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<SessionStatus>)> {
    let credential = credential_from_headers(&headers)?;
    let (_, handle) = state.create_session(credential);
    let status = handle.lock().await.status(state.context());
    Ok((StatusCode::CREATED, Json(status)))
}

/// GET /api/sessions/:id - Session status
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<SessionStatus>> {
    let handle = state.session(&id)?;
    let mut session = handle.lock().await;
    if let Some(credential) = credential_from_headers(&headers)? {
        session.set_credential(credential);
    }
    Ok(Json(session.status(state.context())))
}

/// DELETE /api/sessions/:id - End a session
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.remove_session(&id)?;
    tracing::info!("Session {} ended", id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/sessions/:id/messages - Transcript
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Message>>> {
    let handle = state.session(&id)?;
    let session = handle.lock().await;
    Ok(Json(session.conversation().messages().to_vec()))
}
