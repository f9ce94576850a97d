//! Retrieve, format context, prompt the model.

use std::collections::HashMap;

use ragwalk_llm::{LlmError, LlmProvider, Message};
use ragwalk_memory::{MemoryError, RetrievedChunk, Retriever, format_docs};

use crate::prompt::{PromptError, PromptTemplate};

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] MemoryError),

    #[error("prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<RetrievedChunk>,
    /// The rendered prompt sent to the model.
    pub prompt: String,
}

pub struct RagChain<P: LlmProvider> {
    retriever: Retriever,
    template: PromptTemplate,
    provider: P,
}

impl<P: LlmProvider> RagChain<P> {
    pub fn new(retriever: Retriever, template: PromptTemplate, provider: P) -> Self {
        Self {
            retriever,
            template,
            provider,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Render the prompt for `question` over already retrieved chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the template needs a variable other than
    /// `question` and `context`.
    pub fn render(&self, question: &str, chunks: &[RetrievedChunk]) -> Result<String, PromptError> {
        let context = format_docs(chunks);
        let values = HashMap::from([("question", question), ("context", context.as_str())]);
        self.template.render(&values)
    }

    /// Answer `question` with retrieved context.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval, prompt rendering or the LLM call fails.
    pub async fn ask(&self, question: &str) -> Result<Answer, ChainError> {
        let sources = self.retriever.retrieve(question).await?;
        if sources.is_empty() {
            tracing::warn!("no context retrieved, prompting with empty context");
        }
        let prompt = self.render(question, &sources)?;

        tracing::info!(
            provider = self.provider.name(),
            sources = sources.len(),
            prompt_chars = prompt.len(),
            "asking with context"
        );
        let text = self.provider.chat(&[Message::user(prompt.clone())]).await?;

        Ok(Answer {
            text,
            sources,
            prompt,
        })
    }

    /// Send the bare question without retrieval, for comparison.
    ///
    /// # Errors
    ///
    /// Returns an error if the LLM call fails.
    pub async fn ask_without_context(&self, question: &str) -> Result<String, ChainError> {
        ask_bare(&self.provider, question).await
    }
}

/// Send `question` alone to `provider`, with no retrieval and no template.
///
/// # Errors
///
/// Returns an error if the LLM call fails.
pub async fn ask_bare<P: LlmProvider>(provider: &P, question: &str) -> Result<String, ChainError> {
    tracing::info!(provider = provider.name(), "asking without context");
    Ok(provider.chat(&[Message::user(question)]).await?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ragwalk_llm::mock::MockProvider;
    use ragwalk_llm::provider::EmbedFuture;
    use ragwalk_memory::vector_store::{VectorPoint, VectorStore};
    use ragwalk_memory::{InMemoryVectorStore, RetrievalConfig};
    use serde_json::json;

    use super::*;

    async fn store_with(contents: &[&str]) -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        store.ensure_collection("docs", 2).await.unwrap();
        let points = contents
            .iter()
            .enumerate()
            .map(|(i, c)| VectorPoint {
                id: format!("p{i}"),
                vector: vec![1.0, i as f32],
                payload: HashMap::from([
                    ("content".to_owned(), json!(c)),
                    ("source".to_owned(), json!("notes.txt")),
                    ("chunk_index".to_owned(), json!(i)),
                ]),
            })
            .collect();
        store.upsert("docs", points).await.unwrap();
        store
    }

    fn retriever(store: Arc<InMemoryVectorStore>) -> Retriever {
        Retriever::new(
            store,
            "docs",
            Box::new(|_q: &str| -> EmbedFuture { Box::pin(async { Ok(vec![1.0, 0.0]) }) }),
            RetrievalConfig::default(),
        )
    }

    #[tokio::test]
    async fn ask_renders_context_and_returns_sources() {
        let store = store_with(&["RAG retrieves context.", "Then it generates."]).await;
        let mock = MockProvider::with_responses(vec!["It retrieves, then generates.".into()]);
        let chain = RagChain::new(retriever(store), PromptTemplate::rag_default(), mock);

        let answer = chain.ask("What is RAG?").await.unwrap();
        assert_eq!(answer.text, "It retrieves, then generates.");
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].content, "RAG retrieves context.");
        assert!(answer.prompt.contains("Question: What is RAG? \n"));
        assert!(
            answer
                .prompt
                .contains("Context: RAG retrieves context.\n\nThen it generates. \n")
        );

        let received = chain.provider().received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].len(), 1);
        assert_eq!(received[0][0].role, ragwalk_llm::Role::User);
        assert_eq!(received[0][0].content, answer.prompt);
    }

    #[tokio::test]
    async fn empty_retrieval_still_prompts() {
        let store = store_with(&[]).await;
        let chain = RagChain::new(
            retriever(store),
            PromptTemplate::rag_default(),
            MockProvider::default(),
        );
        let answer = chain.ask("anything?").await.unwrap();
        assert!(answer.sources.is_empty());
        assert!(answer.prompt.contains("Context:  \nAnswer:"));
        assert_eq!(answer.text, "mock response");
    }

    #[tokio::test]
    async fn ask_without_context_sends_bare_question() {
        let store = store_with(&["ignored"]).await;
        let chain = RagChain::new(
            retriever(store),
            PromptTemplate::rag_default(),
            MockProvider::default(),
        );
        chain.ask_without_context("Who are you?").await.unwrap();
        let received = chain.provider().received();
        assert_eq!(received[0][0].content, "Who are you?");
    }

    #[tokio::test]
    async fn llm_failure_surfaces() {
        let store = store_with(&["x"]).await;
        let chain = RagChain::new(
            retriever(store),
            PromptTemplate::rag_default(),
            MockProvider::failing(),
        );
        assert!(matches!(chain.ask("q").await, Err(ChainError::Llm(_))));
    }

    #[tokio::test]
    async fn retrieval_failure_surfaces() {
        let store = store_with(&["x"]).await;
        let retriever = Retriever::new(
            store,
            "docs",
            Box::new(|_q: &str| -> EmbedFuture {
                Box::pin(async { Err(LlmError::Other("embedding backend down".into())) })
            }),
            RetrievalConfig::default(),
        );
        let chain = RagChain::new(retriever, PromptTemplate::rag_default(), MockProvider::default());
        assert!(matches!(chain.ask("q").await, Err(ChainError::Retrieval(_))));
        assert!(chain.provider().received().is_empty());
    }

    #[tokio::test]
    async fn never_ingested_collection_prompts_with_empty_context() {
        let chain = RagChain::new(
            retriever(Arc::new(InMemoryVectorStore::new())),
            PromptTemplate::rag_default(),
            MockProvider::default(),
        );
        let answer = chain.ask("q").await.unwrap();
        assert!(answer.sources.is_empty());
        assert!(answer.prompt.contains("Context:  \nAnswer:"));
    }

    #[tokio::test]
    async fn ask_bare_needs_only_a_provider() {
        let mock = MockProvider::with_responses(vec!["I am a model.".into()]);
        let text = ask_bare(&mock, "Who are you?").await.unwrap();
        assert_eq!(text, "I am a model.");
        let received = mock.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0], vec![Message::user("Who are you?")]);
    }

    #[tokio::test]
    async fn ask_bare_surfaces_llm_failure() {
        assert!(matches!(
            ask_bare(&MockProvider::failing(), "q").await,
            Err(ChainError::Llm(_))
        ));
    }

    #[tokio::test]
    async fn template_with_extra_variable_fails_to_render() {
        let store = store_with(&["x"]).await;
        let template = PromptTemplate::new("{question} {context} {persona}").unwrap();
        let chain = RagChain::new(retriever(store), template, MockProvider::default());
        assert!(matches!(
            chain.ask("q").await,
            Err(ChainError::Prompt(PromptError::MissingVariable(_)))
        ));
    }
}
