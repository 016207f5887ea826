//! Document upload endpoint

use axum::{
    extract::{Multipart, Path, State},
    http::HeaderMap,
    Json,
};
use uuid::Uuid;

use super::sessions::credential_from_headers;
use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::IngestResponse;

/// POST /api/sessions/:id/document - Upload a PDF and build its index
pub async fn upload_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>> {
    let handle = state.session(&id)?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }
        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "document.pdf".to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidRequest(format!("Failed to read file: {}", e)))?;
        upload = Some((filename, data));
        break;
    }

    let (filename, data) = upload
        .ok_or_else(|| Error::InvalidRequest("Request must include a 'file' field".to_string()))?;

    let mut session = handle.lock().await;
    if let Some(credential) = credential_from_headers(&headers)? {
        session.set_credential(credential);
    }

    match session.upload(state.context(), &filename, &data).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            tracing::warn!("Upload of '{}' to session {} failed: {}", filename, id, e);
            Err(e)
        }
    }
}
