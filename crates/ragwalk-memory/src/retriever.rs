//! Similarity retrieval over an ingested collection.

use std::collections::HashMap;
use std::sync::Arc;

use ragwalk_llm::provider::EmbedFuture;

use crate::error::MemoryError;
use crate::vector_store::{ScoredVectorPoint, VectorFilter, VectorStore};

pub type EmbedFn = Box<dyn Fn(&str) -> EmbedFuture + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Hits scoring below this are dropped.
    pub score_threshold: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            score_threshold: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub source: String,
    pub row_page: Option<usize>,
    pub chunk_index: usize,
    pub score: f32,
}

impl RetrievedChunk {
    fn from_point(point: ScoredVectorPoint) -> Self {
        let ScoredVectorPoint { score, payload, .. } = point;
        Self {
            content: payload_str(&payload, "content"),
            source: payload_str(&payload, "source"),
            row_page: payload_usize(&payload, "row_page"),
            chunk_index: payload_usize(&payload, "chunk_index").unwrap_or(0),
            score,
        }
    }
}

fn payload_str(payload: &HashMap<String, serde_json::Value>, key: &str) -> String {
    payload
        .get(key)
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn payload_usize(payload: &HashMap<String, serde_json::Value>, key: &str) -> Option<usize> {
    payload
        .get(key)
        .and_then(serde_json::Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
}

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    collection: String,
    embed_fn: EmbedFn,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        embed_fn: EmbedFn,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            embed_fn,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Return the `top_k` chunks most similar to `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding the query or searching the collection fails.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, MemoryError> {
        self.retrieve_filtered(query, self.config.top_k, None).await
    }

    /// Like [`Self::retrieve`] with an explicit `limit` and payload filter.
    ///
    /// A collection that was never created (nothing ingested yet) yields no chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding the query or searching the collection fails.
    pub async fn retrieve_filtered(
        &self,
        query: &str,
        limit: usize,
        filter: Option<VectorFilter>,
    ) -> Result<Vec<RetrievedChunk>, MemoryError> {
        if !self.store.collection_exists(&self.collection).await? {
            tracing::warn!(collection = %self.collection, "collection not found, nothing to retrieve");
            return Ok(Vec::new());
        }
        let query_vector = (self.embed_fn)(query).await?;
        let limit = u64::try_from(limit).unwrap_or(u64::MAX);
        let hits = self
            .store
            .search(&self.collection, query_vector, limit, filter)
            .await?;

        let found = hits.len();
        let chunks: Vec<RetrievedChunk> = hits
            .into_iter()
            .filter(|h| self.config.score_threshold.is_none_or(|t| h.score >= t))
            .map(RetrievedChunk::from_point)
            .collect();

        tracing::debug!(
            collection = %self.collection,
            found,
            kept = chunks.len(),
            "retrieved chunks"
        );
        Ok(chunks)
    }
}

/// Join chunk contents with a blank line, in retrieval order.
#[must_use]
pub fn format_docs(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
