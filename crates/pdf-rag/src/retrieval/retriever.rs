//! Query-time retrieval: embed the question, search the index

use super::index::VectorIndex;
use crate::credential::Credential;
use crate::embeddings::Embedder;
use crate::error::{Error, Result};
use crate::types::RetrievalResult;

/// Stateless retriever. Each call looks only at the current question.
pub struct Retriever<'a> {
    embedder: &'a dyn Embedder,
    credential: Option<&'a Credential>,
}

impl<'a> Retriever<'a> {
    pub fn new(embedder: &'a dyn Embedder, credential: Option<&'a Credential>) -> Self {
        Self {
            embedder,
            credential,
        }
    }

    /// Top-`k` segments of `index` for `query`
    pub async fn retrieve(
        &self,
        query: &str,
        index: &VectorIndex,
        k: usize,
    ) -> Result<RetrievalResult> {
        if index.is_empty() {
            return Ok(RetrievalResult::empty());
        }
        if index.model_id() != self.embedder.model_id() {
            return Err(Error::embedding(format!(
                "Index was built with '{}' but queries use '{}'; the index must be rebuilt",
                index.model_id(),
                self.embedder.model_id()
            )));
        }

        let query_vector = self.embedder.embed(query, self.credential).await?;
        let result = index.search(&query_vector, k);

        tracing::debug!(
            "Retrieved {} of {} segments (k={}), top score {:.3}",
            result.len(),
            index.len(),
            k,
            result.hits.first().map(|h| h.score).unwrap_or(0.0)
        );

        Ok(result)
    }
}
