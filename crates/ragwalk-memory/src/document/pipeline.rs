use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use ragwalk_llm::LlmError;
use ragwalk_llm::provider::EmbedBatchFuture;

use super::{Chunk, Document, DocumentError, DocumentLoader, SourceUnits, TextSplitter};
use crate::vector_store::{VectorPoint, VectorStore};

pub type EmbedBatchFn = Box<dyn Fn(Vec<String>) -> EmbedBatchFuture + Send + Sync>;

/// Default number of chunk texts sent per embedding request.
pub const DEFAULT_BATCH_SIZE: usize = 64;

pub struct IngestionPipeline {
    splitter: TextSplitter,
    store: Arc<dyn VectorStore>,
    collection: String,
    embed_batch_fn: EmbedBatchFn,
    batch_size: usize,
}

impl IngestionPipeline {
    pub fn new(
        splitter: TextSplitter,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        embed_batch_fn: EmbedBatchFn,
    ) -> Self {
        Self {
            splitter,
            store,
            collection: collection.into(),
            embed_batch_fn,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[must_use]
    pub fn splitter(&self) -> &TextSplitter {
        &self.splitter
    }

    /// Split, embed and store aligned source units. Returns stored chunk count.
    ///
    /// # Errors
    ///
    /// Returns an error if the units are misaligned or embedding or storage fails.
    pub async fn ingest_units(&self, units: &SourceUnits) -> Result<usize, DocumentError> {
        let chunks = self.splitter.split_units(units)?;
        tracing::info!(units = units.len(), chunks = chunks.len(), "split source units");
        self.store_chunks(chunks).await
    }

    /// Ingest a single document: split -> embed -> store. Returns chunk count.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or storage fails.
    pub async fn ingest(&self, document: Document) -> Result<usize, DocumentError> {
        let chunks = self.splitter.split(&document);
        self.store_chunks(chunks).await
    }

    /// # Errors
    ///
    /// Returns an error if loading, embedding, or storage fails.
    pub async fn load_and_ingest(
        &self,
        loader: &(dyn DocumentLoader + '_),
        path: &std::path::Path,
    ) -> Result<usize, DocumentError> {
        let documents = loader.load(path).await?;
        self.ingest_units(&SourceUnits::from_documents(documents))
            .await
    }

    async fn store_chunks(&self, chunks: Vec<Chunk>) -> Result<usize, DocumentError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embedded = (self.embed_batch_fn)(texts).await?;
            if embedded.len() != batch.len() {
                return Err(DocumentError::Embedding(LlmError::EmbedCountMismatch {
                    expected: batch.len(),
                    actual: embedded.len(),
                }));
            }
            vectors.extend(embedded);
            tracing::debug!(embedded = vectors.len(), total = chunks.len(), "embedded batch");
        }

        let vector_size = vectors.first().map_or(0, Vec::len) as u64;
        self.store
            .ensure_collection(&self.collection, vector_size)
            .await?;

        let points: Vec<VectorPoint> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorPoint {
                id: Uuid::new_v4().to_string(),
                vector,
                payload: chunk_payload(chunk),
            })
            .collect();

        let count = points.len();
        self.store.upsert(&self.collection, points).await?;
        tracing::info!(collection = %self.collection, count, vector_size, "stored chunks");
        Ok(count)
    }
}

fn chunk_payload(chunk: &Chunk) -> std::collections::HashMap<String, serde_json::Value> {
    let mut payload = std::collections::HashMap::from([
        ("source".to_owned(), json!(chunk.metadata.source)),
        ("content_type".to_owned(), json!(chunk.metadata.content_type)),
        ("chunk_index".to_owned(), json!(chunk.chunk_index)),
        ("content".to_owned(), json!(chunk.content)),
    ]);
    if let Some(row_page) = chunk.metadata.row_page {
        payload.insert("row_page".to_owned(), json!(row_page));
    }
    payload
}
