use std::path::PathBuf;

use super::{Config, ProviderKind, VectorBackend};
use crate::secret::Secret;

fn parse_enum<T: serde::de::DeserializeOwned>(key: &str, v: &str) -> Option<T> {
    let parsed = serde_json::from_value(serde_json::Value::String(v.to_ascii_lowercase())).ok();
    if parsed.is_none() {
        tracing::warn!("ignoring invalid {key} value: {v}");
    }
    parsed
}

fn parse_num<T: std::str::FromStr>(key: &str, v: &str) -> Option<T> {
    let parsed = v.trim().parse().ok();
    if parsed.is_none() {
        tracing::warn!("ignoring invalid {key} value: {v}");
    }
    parsed
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RAGWALK_DATA_DIR") {
            self.data.dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("RAGWALK_COLLECTION") {
            self.vector_store.collection = v;
        }
        if let Ok(v) = std::env::var("RAGWALK_LLM_PROVIDER")
            && let Some(kind) = parse_enum::<ProviderKind>("RAGWALK_LLM_PROVIDER", &v)
        {
            self.llm.provider = kind;
        }
        if let Ok(v) = std::env::var("RAGWALK_EMBEDDING_PROVIDER")
            && let Some(kind) = parse_enum::<ProviderKind>("RAGWALK_EMBEDDING_PROVIDER", &v)
        {
            self.embedding.provider = kind;
        }
        if let Ok(v) = std::env::var("RAGWALK_EMBEDDING_MODEL") {
            self.embedding.model = Some(v);
        }
        if let Ok(v) = std::env::var("RAGWALK_OPENAI_MODEL") {
            self.llm.openai.model = v;
        }
        if let Ok(v) = std::env::var("RAGWALK_OPENAI_BASE_URL") {
            self.llm.openai.base_url = v;
        }
        if let Ok(v) = std::env::var("RAGWALK_OLLAMA_URL") {
            self.llm.ollama.base_url = v;
        }
        if let Ok(v) = std::env::var("RAGWALK_OLLAMA_MODEL") {
            self.llm.ollama.model = v;
        }
        if let Ok(v) = std::env::var("RAGWALK_QDRANT_URL") {
            self.vector_store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("RAGWALK_VECTOR_BACKEND")
            && let Some(backend) = parse_enum::<VectorBackend>("RAGWALK_VECTOR_BACKEND", &v)
        {
            self.vector_store.backend = backend;
        }
        if let Ok(v) = std::env::var("RAGWALK_CHUNK_SIZE")
            && let Some(n) = parse_num("RAGWALK_CHUNK_SIZE", &v)
        {
            self.splitter.chunk_size = n;
        }
        if let Ok(v) = std::env::var("RAGWALK_CHUNK_OVERLAP")
            && let Some(n) = parse_num("RAGWALK_CHUNK_OVERLAP", &v)
        {
            self.splitter.chunk_overlap = n;
        }
        if let Ok(v) = std::env::var("RAGWALK_TOP_K")
            && let Some(n) = parse_num("RAGWALK_TOP_K", &v)
        {
            self.retrieval.top_k = n;
        }
        if let Ok(v) = std::env::var("RAGWALK_MAX_RETRIES")
            && let Some(n) = parse_num("RAGWALK_MAX_RETRIES", &v)
        {
            self.llm.max_retries = n;
        }
        if let Ok(v) = std::env::var("RAGWALK_PROMPT_SOURCE") {
            self.prompt.source = v;
        }
    }

    /// Pick up the OpenAI key, preferring `RAGWALK_OPENAI_API_KEY`.
    pub(crate) fn resolve_secrets(&mut self) {
        self.secrets.openai_api_key = ["RAGWALK_OPENAI_API_KEY", "OPENAI_API_KEY"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|v| !v.trim().is_empty())
            .map(Secret::new);
    }
}
