//! Per-user session: credential, current document and transcript
//!
//! A `Session` is the request boundary. It owns everything that belongs to one
//! user and hands it to the stateless [`RagContext`] one turn at a time.

use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::pipeline::{DocumentIndex, RagContext};
use crate::types::{Answer, Conversation, DocumentSummary, IngestResponse};

pub const CREDENTIAL_REQUIRED_MESSAGE: &str = "Please enter your API token to proceed.";
pub const UPLOAD_REQUIRED_MESSAGE: &str =
    "Please upload a PDF document to start asking questions about it.";
pub const INGEST_SUCCESS_MESSAGE: &str =
    "PDF Processed! You can now ask questions about your document.";

/// What the session needs before it can answer
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub has_credential: bool,
    pub document: Option<DocumentSummary>,
    pub messages: usize,
    /// Next step for the user, if any
    pub guidance: Option<String>,
}

/// One user's state across turns
pub struct Session {
    id: Uuid,
    credential: Option<Credential>,
    document: Option<DocumentIndex>,
    conversation: Conversation,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl Session {
    pub fn new(credential: Option<Credential>) -> Self {
        Self {
            id: Uuid::new_v4(),
            credential,
            document: None,
            conversation: Conversation::new(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Replace the session's token
    pub fn set_credential(&mut self, credential: Credential) {
        self.credential = Some(credential);
    }

    pub fn document(&self) -> Option<&DocumentIndex> {
        self.document.as_ref()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    fn check_credential(&self, ctx: &RagContext) -> Result<()> {
        if ctx.requires_credential() && self.credential.is_none() {
            return Err(Error::CredentialRequired);
        }
        Ok(())
    }

    /// Ingest a new document, replacing the current one.
    ///
    /// The previous index is dropped before ingestion starts, so a failed
    /// upload leaves the session with no document at all.
    pub async fn upload(
        &mut self,
        ctx: &RagContext,
        filename: &str,
        data: &[u8],
    ) -> Result<IngestResponse> {
        self.check_credential(ctx)?;
        let start = Instant::now();

        if self.document.take().is_some() {
            tracing::debug!("Session {} discarded its previous index", self.id);
        }

        let document = ctx.ingest(filename, data, self.credential.as_ref()).await?;
        let summary = document.document.clone();
        self.document = Some(document);

        Ok(IngestResponse {
            message: INGEST_SUCCESS_MESSAGE.to_string(),
            document: summary,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Answer a question about the current document and record the turn.
    ///
    /// Nothing reaches the retriever until a credential (when needed) and a
    /// document are present.
    pub async fn ask(&mut self, ctx: &RagContext, question: &str) -> Result<Answer> {
        self.check_credential(ctx)?;

        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidRequest("Question must not be empty".to_string()));
        }

        let document = self.document.as_ref().ok_or(Error::NoDocument)?;
        let answer = ctx.answer(question, document, self.credential.as_ref()).await?;

        self.conversation.record_turn(question, &answer.text);
        Ok(answer)
    }

    /// Drop the document and transcript, keeping the credential
    pub fn reset(&mut self) {
        self.document = None;
        self.conversation.clear();
    }

    pub fn status(&self, ctx: &RagContext) -> SessionStatus {
        let guidance = if ctx.requires_credential() && self.credential.is_none() {
            Some(CREDENTIAL_REQUIRED_MESSAGE.to_string())
        } else if self.document.is_none() {
            Some(UPLOAD_REQUIRED_MESSAGE.to_string())
        } else {
            None
        };

        SessionStatus {
            session_id: self.id,
            has_credential: self.credential.is_some(),
            document: self.document.as_ref().map(|d| d.document.clone()),
            messages: self.conversation.len(),
            guidance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingBackend, InferenceEndpoint, RagConfig};
    use crate::testing::{HashEmbedder, ScriptedGenerator};
    use crate::types::Role;
    use std::sync::Arc;

    const REPORT: &str = "Quarterly report.\n\nRevenue grew to 12 million euros in the third quarter.\n\nThe total headcount is 85 people across three offices.";

    fn local_context(generator: ScriptedGenerator) -> RagContext {
        let mut config = RagConfig::default();
        config.llm.endpoint = InferenceEndpoint::Local;
        config.embeddings.backend = EmbeddingBackend::Onnx;
        RagContext::new(config, Arc::new(HashEmbedder::new(64)), Arc::new(generator))
    }

    fn remote_context(generator: ScriptedGenerator) -> RagContext {
        RagContext::new(
            RagConfig::default(),
            Arc::new(HashEmbedder::new(64)),
            Arc::new(generator),
        )
    }

    #[tokio::test]
    async fn test_question_before_upload_never_reaches_retrieval() {
        let generator = ScriptedGenerator::reply("unused");
        let prompts = generator.prompts();
        let ctx = local_context(generator);
        let mut session = Session::new(None);

        let err = session.ask(&ctx, "What is the total?").await.unwrap_err();
        assert!(matches!(err, Error::NoDocument));
        assert_eq!(err.user_message(), UPLOAD_REQUIRED_MESSAGE);
        assert!(prompts.lock().is_empty());
        assert!(session.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_remote_session_requires_credential() {
        let ctx = remote_context(ScriptedGenerator::reply("unused"));
        let mut session = Session::new(None);

        let err = session.upload(&ctx, "report.txt", REPORT.as_bytes()).await.unwrap_err();
        assert!(matches!(err, Error::CredentialRequired));
        assert_eq!(err.user_message(), CREDENTIAL_REQUIRED_MESSAGE);
        assert_eq!(
            session.status(&ctx).guidance.as_deref(),
            Some(CREDENTIAL_REQUIRED_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_rejected_token_surfaces_readable_error() {
        let ctx = remote_context(ScriptedGenerator::failing(|| {
            Error::Authentication("Invalid credentials in Authorization header".to_string())
        }));
        let mut session = Session::new(Some(Credential::new("hf_bad").unwrap()));
        session.upload(&ctx, "report.txt", REPORT.as_bytes()).await.unwrap();

        let err = session.ask(&ctx, "How many people work here?").await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        assert!(!err.user_message().contains("hf_bad"));
        assert!(session.conversation().is_empty());
    }

    #[tokio::test]
    async fn test_turns_are_recorded_in_order() {
        let ctx = local_context(ScriptedGenerator::reply("85 people."));
        let mut session = Session::new(None);

        let response = session.upload(&ctx, "report.txt", REPORT.as_bytes()).await.unwrap();
        assert_eq!(response.message, INGEST_SUCCESS_MESSAGE);
        assert!(session.status(&ctx).guidance.is_none());

        session.ask(&ctx, "How many people work here?").await.unwrap();
        session.ask(&ctx, "And revenue?").await.unwrap();

        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "How many people work here?");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[2].content, "And revenue?");
    }

    #[tokio::test]
    async fn test_failed_upload_clears_previous_document() {
        let ctx = local_context(ScriptedGenerator::reply("ok"));
        let mut session = Session::new(None);
        session.upload(&ctx, "report.txt", REPORT.as_bytes()).await.unwrap();
        assert!(session.document().is_some());

        let result = session.upload(&ctx, "empty.pdf", b"").await;
        assert!(matches!(result, Err(Error::Ingestion { .. })));
        assert!(session.document().is_none());

        let err = session.ask(&ctx, "What is the revenue?").await.unwrap_err();
        assert!(matches!(err, Error::NoDocument));
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let ctx = local_context(ScriptedGenerator::reply("ok"));
        let mut session = Session::new(None);
        session.upload(&ctx, "report.txt", REPORT.as_bytes()).await.unwrap();

        let err = session.ask(&ctx, "   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}
