//! The RAG pipeline: ingest a document, answer questions against it
//!
//! `RagContext` owns the embedder, generator and configuration. It is built
//! once at startup and shared by reference; it holds no per-session state.

use std::sync::Arc;
use std::time::Instant;

use crate::config::{EmbeddingBackend, InferenceEndpoint, RagConfig};
use crate::credential::Credential;
use crate::embeddings::{create_embedder, Embedder};
use crate::error::{Error, Result};
use crate::generation::{
    build_citations, create_generator, truncate_snippet, Generator, PromptBuilder, PromptTemplate,
};
use crate::ingestion::IngestPipeline;
use crate::retrieval::{Retriever, VectorIndex};
use crate::types::{Answer, DocumentSummary, Segment};

/// Attempts at shortening a segment that exceeds the embedder's token limit
const MAX_TRUNCATION_ATTEMPTS: usize = 4;

/// A searchable document: its summary plus the index built from it
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    pub document: DocumentSummary,
    pub index: VectorIndex,
}

impl DocumentIndex {
    /// Embedding model the index was built with
    pub fn embedding_model(&self) -> &str {
        self.index.model_id()
    }
}

/// Explicitly owned pipeline resources
pub struct RagContext {
    config: RagConfig,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    template: PromptTemplate,
}

impl RagContext {
    /// Assemble a context from ready-made components
    pub fn new(config: RagConfig, embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Self {
        Self {
            config,
            embedder,
            generator,
            template: PromptTemplate::default(),
        }
    }

    /// Build the embedder and generator named by the configuration
    pub fn from_config(config: RagConfig) -> Result<Self> {
        config.validate()?;
        let embedder = create_embedder(&config.embeddings)?;
        let generator = create_generator(&config.llm)?;
        Ok(Self::new(config, embedder, generator))
    }

    /// Replace the prompt template
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    /// Whether embedding or generation calls a remote service that needs a
    /// bearer token
    pub fn requires_credential(&self) -> bool {
        self.config.llm.endpoint == InferenceEndpoint::Remote
            || self.config.embeddings.backend == EmbeddingBackend::HuggingFace
    }

    /// Chunk, embed and index an uploaded document.
    ///
    /// Either a complete index comes back or an error does; nothing partial
    /// is ever returned.
    pub async fn ingest(
        &self,
        filename: &str,
        data: &[u8],
        credential: Option<&Credential>,
    ) -> Result<DocumentIndex> {
        let start = Instant::now();
        tracing::info!("Ingesting '{}' ({} bytes)", filename, data.len());

        let pipeline = IngestPipeline::new(
            self.config.chunking.chunk_size,
            self.config.chunking.chunk_overlap,
        );
        let owned_name = filename.to_string();
        let owned_data = data.to_vec();
        let (doc, segments) =
            run_blocking(move || pipeline.process(&owned_name, &owned_data)).await?;

        let vectors = self.embed_segments(&segments, credential).await?;
        let pairs = segments.into_iter().zip(vectors).collect();
        let index = VectorIndex::build(pairs, self.embedder.model_id())?;

        tracing::info!(
            "Indexed '{}': {} segments, {} pages in {}ms",
            filename,
            index.len(),
            doc.total_pages.unwrap_or(0),
            start.elapsed().as_millis()
        );

        Ok(DocumentIndex {
            document: DocumentSummary::new(&doc, self.embedder.model_id()),
            index,
        })
    }

    /// Embed every segment in order, shortening any that exceed the model's
    /// token limit
    async fn embed_segments(
        &self,
        segments: &[Segment],
        credential: Option<&Credential>,
    ) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.config.embeddings.batch_size.max(1);
        let mut vectors = Vec::with_capacity(segments.len());

        for batch in segments.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|s| s.text().to_string()).collect();
            tracing::debug!("Embedding batch of {} segments", texts.len());

            let embedded = match self.embedder.embed_batch(&texts, credential).await {
                Ok(embedded) => embedded,
                Err(Error::InputTooLong { .. }) => {
                    let mut embedded = Vec::with_capacity(texts.len());
                    for text in &texts {
                        embedded.push(self.embed_truncating(text, credential).await?);
                    }
                    embedded
                }
                Err(e) => return Err(e),
            };

            if embedded.len() != texts.len() {
                return Err(Error::embedding(format!(
                    "Embedder returned {} vectors for {} segments",
                    embedded.len(),
                    texts.len()
                )));
            }
            vectors.extend(embedded);
        }

        Ok(vectors)
    }

    /// Embed `text`, cutting it down proportionally while it is over the limit
    async fn embed_truncating(&self, text: &str, credential: Option<&Credential>) -> Result<Vec<f32>> {
        let mut current = text.to_string();
        for _ in 0..MAX_TRUNCATION_ATTEMPTS {
            match self.embedder.embed(&current, credential).await {
                Err(Error::InputTooLong { tokens, limit }) => {
                    let chars = current.chars().count();
                    let keep = (chars * limit / tokens.max(1)) * 9 / 10;
                    tracing::debug!(
                        "Segment of {} tokens exceeds limit {}, keeping {} of {} chars for embedding",
                        tokens,
                        limit,
                        keep,
                        chars
                    );
                    current = current.chars().take(keep.max(1)).collect();
                }
                other => return other,
            }
        }
        self.embedder.embed(&current, credential).await
    }

    /// Answer a question from the given document index.
    ///
    /// Only the question is embedded; prior turns play no part in retrieval.
    pub async fn answer(
        &self,
        question: &str,
        document: &DocumentIndex,
        credential: Option<&Credential>,
    ) -> Result<Answer> {
        let start = Instant::now();
        tracing::info!("Answering question: {}", truncate_snippet(question, 80));

        let retriever = Retriever::new(self.embedder.as_ref(), credential);
        let retrieved = retriever
            .retrieve(question, &document.index, self.config.retrieval.top_k)
            .await?;

        let prompt = PromptBuilder::assemble(question, &retrieved, &self.template);
        let generation = self
            .generator
            .generate(&prompt, &self.config.llm, credential)
            .await?;

        let truncated = generation.finish_reason.is_truncated();
        let citations = build_citations(&retrieved, &self.config.retrieval);

        tracing::info!(
            "Answered with {} sources in {}ms (finish: {:?})",
            citations.len(),
            start.elapsed().as_millis(),
            generation.finish_reason
        );

        Ok(Answer {
            text: generation.text,
            citations,
            sources: retrieved,
            truncated,
            model: self.config.llm.model.clone(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Run CPU-bound work on the blocking pool so PDF extraction never stalls
/// the async workers
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Internal(format!("Blocking task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{HashEmbedder, ScriptedGenerator};
    use crate::types::FinishReason;

    fn context(generator: ScriptedGenerator) -> RagContext {
        RagContext::new(
            RagConfig::default(),
            Arc::new(HashEmbedder::new(64)),
            Arc::new(generator),
        )
    }

    fn invoice_text() -> String {
        let mut text = String::new();
        for i in 0..40 {
            text.push_str(&format!("Line item {} costs {} euros. ", i, i * 3));
        }
        text.push_str("\n\nThe total is 2340 euros including tax.");
        text
    }

    #[tokio::test]
    async fn test_ingest_then_answer() {
        let ctx = context(ScriptedGenerator::reply("The total is 2340 euros."));
        let doc = ctx.ingest("invoice.txt", invoice_text().as_bytes(), None).await.unwrap();

        assert!(doc.index.len() >= 2);
        assert_eq!(doc.embedding_model(), "hash-embedder");

        let answer = ctx.answer("What is the total?", &doc, None).await.unwrap();
        assert_eq!(answer.text, "The total is 2340 euros.");
        assert!(!answer.truncated);
        assert_eq!(answer.citations.len(), answer.sources.len());
        assert!(answer.sources.len() <= 4);
        for (citation, hit) in answer.citations.iter().zip(answer.sources.iter()) {
            assert_eq!(citation.sequence_index, hit.segment.sequence_index());
            assert!(citation.excerpt.ends_with("..."));
        }
    }

    #[tokio::test]
    async fn test_prompt_contains_retrieved_context() {
        let generator = ScriptedGenerator::reply("ok");
        let prompts = generator.prompts();
        let ctx = context(generator);

        let doc = ctx.ingest("invoice.txt", invoice_text().as_bytes(), None).await.unwrap();
        let answer = ctx.answer("What is the total?", &doc, None).await.unwrap();

        let prompt = prompts.lock().last().cloned().unwrap();
        assert!(prompt.contains("Question:\nWhat is the total?"));
        for text in answer.sources.texts() {
            assert!(prompt.contains(text));
        }
    }

    #[tokio::test]
    async fn test_truncated_output_is_flagged_not_failed() {
        let ctx = context(ScriptedGenerator::with_finish("The total is", FinishReason::Length));
        let doc = ctx.ingest("invoice.txt", invoice_text().as_bytes(), None).await.unwrap();

        let answer = ctx.answer("What is the total?", &doc, None).await.unwrap();
        assert!(answer.truncated);
        assert_eq!(answer.text, "The total is");
    }

    #[tokio::test]
    async fn test_empty_upload_fails_ingestion() {
        let ctx = context(ScriptedGenerator::reply("unused"));
        let result = ctx.ingest("empty.pdf", b"", None).await;
        assert!(matches!(result, Err(Error::Ingestion { .. })));
    }

    #[tokio::test]
    async fn test_model_switch_requires_rebuild() {
        let ctx = context(ScriptedGenerator::reply("ok"));
        let doc = ctx.ingest("invoice.txt", invoice_text().as_bytes(), None).await.unwrap();

        let other = RagContext::new(
            RagConfig::default(),
            Arc::new(HashEmbedder::new(64).with_model_id("other-model")),
            Arc::new(ScriptedGenerator::reply("ok")),
        );
        let result = other.answer("What is the total?", &doc, None).await;
        assert!(matches!(result, Err(Error::Embedding(_))));
    }

    #[tokio::test]
    async fn test_oversized_segments_are_shortened() {
        let ctx = RagContext::new(
            RagConfig::default(),
            Arc::new(HashEmbedder::new(32).with_token_limit(50)),
            Arc::new(ScriptedGenerator::reply("ok")),
        );
        let doc = ctx.ingest("invoice.txt", invoice_text().as_bytes(), None).await.unwrap();
        assert!(doc.index.len() >= 2);
    }

    #[tokio::test]
    async fn test_blocking_stage_panic_becomes_internal_error() {
        let result: Result<()> = run_blocking(|| panic!("extractor crashed")).await;
        assert!(matches!(result, Err(Error::Internal(_))));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_ingest_leaves_single_worker_free() {
        let ctx = Arc::new(context(ScriptedGenerator::reply("ok")));
        let ticker = tokio::spawn(async {
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            true
        });

        let doc = ctx.ingest("invoice.txt", invoice_text().as_bytes(), None).await.unwrap();
        assert!(doc.index.len() >= 2);
        assert!(ticker.await.unwrap());
    }
}
