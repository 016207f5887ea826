//! API routes for the RAG server

pub mod ingest;
pub mod query;
pub mod sessions;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/sessions", post(sessions::create_session))
        .route(
            "/sessions/:id",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/sessions/:id/messages", get(sessions::list_messages))
        .route(
            "/sessions/:id/document",
            post(ingest::upload_document).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/sessions/:id/query", post(query::ask_question))
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "pdf-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Ask questions about an uploaded PDF and get answers with cited excerpts",
        "endpoints": {
            "POST /api/sessions": "Start a session (Authorization: Bearer <token> for remote models)",
            "GET /api/sessions/:id": "Session status and next step",
            "DELETE /api/sessions/:id": "End a session",
            "POST /api/sessions/:id/document": "Upload a PDF (multipart field 'file'), replacing the current one",
            "POST /api/sessions/:id/query": "Ask a question about the current document",
            "GET /api/sessions/:id/messages": "Session transcript"
        }
    }))
}
