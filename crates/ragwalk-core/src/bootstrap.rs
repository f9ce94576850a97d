//! Build providers, stores, pipeline, retriever and chain from a [`Config`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ragwalk_llm::any::AnyProvider;
use ragwalk_llm::ollama::OllamaProvider;
use ragwalk_llm::openai::OpenAiProvider;
use ragwalk_memory::document::{DirectoryLoader, IngestionPipeline, SourceUnits, TextSplitter};
use ragwalk_memory::{InMemoryVectorStore, QdrantOps, Retriever, VectorStore};

use crate::chain::RagChain;
use crate::config::{Config, ProviderKind, VectorBackend};
use crate::prompt::{PromptSource, PromptTemplate};

/// Priority: `--config` flag > `RAGWALK_CONFIG` env > `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli {
        return path;
    }
    if let Ok(path) = std::env::var("RAGWALK_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

fn http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    ragwalk_llm::http::client_with_timeout(Duration::from_secs(config.llm.timeout_secs))
        .context("failed to build HTTP client")
}

fn openai_provider(
    config: &Config,
    embedding_model: Option<String>,
) -> anyhow::Result<OpenAiProvider> {
    let api_key = config
        .secrets
        .openai_api_key
        .as_ref()
        .context("OpenAI API key not set (RAGWALK_OPENAI_API_KEY or OPENAI_API_KEY)")?
        .expose()
        .to_owned();
    Ok(OpenAiProvider::new(
        http_client(config)?,
        api_key,
        config.llm.openai.base_url.clone(),
        config.llm.openai.model.clone(),
        config.llm.max_tokens,
        embedding_model,
    )
    .with_temperature(config.llm.temperature)
    .with_max_retries(config.llm.max_retries))
}

/// Chat provider for an explicit backend, regardless of `llm.provider`.
///
/// # Errors
///
/// Returns an error if OpenAI is selected without an API key.
pub fn create_named_chat_provider(
    kind: ProviderKind,
    config: &Config,
) -> anyhow::Result<AnyProvider> {
    match kind {
        ProviderKind::OpenAi => Ok(AnyProvider::OpenAi(openai_provider(config, None)?)),
        ProviderKind::Ollama => Ok(AnyProvider::Ollama(OllamaProvider::new(
            &config.llm.ollama.base_url,
            config.llm.ollama.model.clone(),
            None,
        ))),
    }
}

/// # Errors
///
/// Returns an error if OpenAI is selected without an API key.
pub fn create_chat_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    create_named_chat_provider(config.llm.provider, config)
}

/// # Errors
///
/// Returns an error if OpenAI is selected without an API key.
pub fn create_embedding_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let model = config.embedding.effective_model().to_owned();
    let provider = match config.embedding.provider {
        ProviderKind::OpenAi => AnyProvider::OpenAi(openai_provider(config, Some(model))?),
        ProviderKind::Ollama => AnyProvider::Ollama(OllamaProvider::new(
            &config.llm.ollama.base_url,
            config.llm.ollama.model.clone(),
            Some(model),
        )),
    };
    tracing::info!(
        provider = config.embedding.provider.as_str(),
        model = config.embedding.effective_model(),
        "embedding provider ready"
    );
    Ok(provider)
}

/// # Errors
///
/// Returns an error if the Qdrant client cannot be created.
pub fn create_vector_store(config: &Config) -> anyhow::Result<Arc<dyn VectorStore>> {
    match config.vector_store.backend {
        VectorBackend::Memory => {
            tracing::info!("using in-memory vector store");
            Ok(Arc::new(InMemoryVectorStore::new()))
        }
        VectorBackend::Qdrant => {
            let ops = QdrantOps::new(&config.vector_store.qdrant_url)
                .context("failed to create Qdrant client")?;
            tracing::info!(url = %config.vector_store.qdrant_url, "using Qdrant vector store");
            Ok(Arc::new(ops))
        }
    }
}

/// Load every supported file under `data.dir` as aligned source units.
///
/// # Errors
///
/// Returns an error if the data directory is missing or a file fails to load.
pub async fn load_source_units(config: &Config) -> anyhow::Result<SourceUnits> {
    let loader = DirectoryLoader::new(config.data.max_file_size, config.csv_delimiter_byte());
    let documents = loader
        .load_dir(&config.data.dir)
        .await
        .with_context(|| format!("failed to load data from {}", config.data.dir.display()))?;
    let units = SourceUnits::from_documents(documents);
    tracing::info!(units = units.len(), "loaded source units");
    Ok(units)
}

#[must_use]
pub fn build_splitter(config: &Config) -> TextSplitter {
    TextSplitter::new(config.splitter.to_splitter_config())
}

#[must_use]
pub fn build_pipeline(
    config: &Config,
    store: Arc<dyn VectorStore>,
    embedder: &AnyProvider,
) -> IngestionPipeline {
    IngestionPipeline::new(
        build_splitter(config),
        store,
        config.vector_store.collection.clone(),
        Box::new(embedder.embed_batch_fn()),
    )
    .with_batch_size(config.embedding.batch_size)
}

#[must_use]
pub fn build_retriever(
    config: &Config,
    store: Arc<dyn VectorStore>,
    embedder: &AnyProvider,
) -> Retriever {
    Retriever::new(
        store,
        config.vector_store.collection.clone(),
        Box::new(embedder.embed_fn()),
        config.retrieval.to_retrieval_config(),
    )
}

/// # Errors
///
/// Returns an error if the configured prompt cannot be loaded.
pub async fn load_prompt(config: &Config) -> anyhow::Result<PromptTemplate> {
    let source = PromptSource::parse(&config.prompt.source);
    let client = http_client(config)?;
    source
        .load(&client)
        .await
        .with_context(|| format!("failed to load prompt from {}", config.prompt.source))
}

/// # Errors
///
/// Returns an error if the configured prompt cannot be loaded.
pub async fn build_chain(
    config: &Config,
    store: Arc<dyn VectorStore>,
    embedder: &AnyProvider,
    chat: AnyProvider,
) -> anyhow::Result<RagChain<AnyProvider>> {
    let template = load_prompt(config).await?;
    Ok(RagChain::new(
        build_retriever(config, store, embedder),
        template,
        chat,
    ))
}

/// Load, split, embed and store the data directory. Returns stored chunk count.
///
/// # Errors
///
/// Returns an error if loading, embedding or storage fails.
pub async fn ingest(
    config: &Config,
    store: Arc<dyn VectorStore>,
    embedder: &AnyProvider,
) -> anyhow::Result<usize> {
    let units = load_source_units(config).await?;
    let stored = build_pipeline(config, store, embedder)
        .ingest_units(&units)
        .await
        .context("ingestion failed")?;
    tracing::info!(stored, collection = %config.vector_store.collection, "ingestion complete");
    Ok(stored)
}

/// Drop the collection if present, then ingest from scratch.
///
/// # Errors
///
/// Returns an error if the store cannot be queried or ingestion fails.
pub async fn rebuild(
    config: &Config,
    store: Arc<dyn VectorStore>,
    embedder: &AnyProvider,
) -> anyhow::Result<usize> {
    let collection = &config.vector_store.collection;
    if store
        .collection_exists(collection)
        .await
        .context("failed to query vector store")?
    {
        store
            .delete_collection(collection)
            .await
            .with_context(|| format!("failed to drop collection {collection}"))?;
        tracing::info!(collection = %collection, "dropped existing collection");
    }
    ingest(config, store, embedder).await
}

/// Point count of `collection` when it exists and is non-empty.
async fn populated_count(
    store: &dyn VectorStore,
    collection: &str,
) -> anyhow::Result<Option<u64>> {
    if !store
        .collection_exists(collection)
        .await
        .context("failed to query vector store")?
    {
        return Ok(None);
    }
    let count = store.count(collection).await?;
    if count == 0 {
        tracing::warn!(collection = %collection, "existing collection is empty, re-ingesting");
        return Ok(None);
    }
    Ok(Some(count))
}

/// Ingest unless a persistent collection already holds data.
///
/// The in-memory store starts empty on every run, so it is always filled.
///
/// # Errors
///
/// Returns an error if the store cannot be queried or ingestion fails.
pub async fn ensure_ingested(
    config: &Config,
    store: Arc<dyn VectorStore>,
    embedder: &AnyProvider,
) -> anyhow::Result<usize> {
    let collection = &config.vector_store.collection;
    if config.vector_store.backend == VectorBackend::Qdrant
        && let Some(count) = populated_count(store.as_ref(), collection).await?
    {
        tracing::info!(collection = %collection, count, "reusing existing collection");
        return Ok(usize::try_from(count).unwrap_or(usize::MAX));
    }
    ingest(config, store, embedder).await
}
