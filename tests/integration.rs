use std::path::{Path, PathBuf};
use std::sync::Arc;

use ragwalk_core::bootstrap::{
    build_chain, build_retriever, build_splitter, create_vector_store, ensure_ingested,
    load_source_units, rebuild,
};
use ragwalk_core::config::Config;
use ragwalk_llm::any::AnyProvider;
use ragwalk_llm::mock::MockProvider;

fn sample_data() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data")
}

fn config_for(dir: &Path) -> Config {
    let mut config = Config::load(Path::new("/nonexistent")).unwrap();
    config.data.dir = dir.to_path_buf();
    config
}

fn embedder() -> AnyProvider {
    AnyProvider::Mock(MockProvider::letter_embeddings())
}

#[tokio::test]
async fn sample_data_loads_aligned_units() {
    let config = config_for(&sample_data());
    let units = load_source_units(&config).await.unwrap();

    assert_eq!(units.texts.len(), units.metadatas.len());
    let csv_rows: Vec<_> = units
        .metadatas
        .iter()
        .filter(|m| m.source.ends_with("glossary.csv"))
        .collect();
    assert_eq!(csv_rows.len(), 6);
    assert!(
        csv_rows
            .iter()
            .enumerate()
            .all(|(i, m)| m.row_page == Some(i))
    );
    assert_eq!(units.len(), 8);
    assert!(
        units
            .texts
            .iter()
            .any(|t| t.starts_with("term: embedding\ndefinition: "))
    );
}

#[tokio::test]
async fn chunks_inherit_source_metadata() {
    let mut config = config_for(&sample_data());
    config.splitter.chunk_size = 200;
    config.splitter.chunk_overlap = 40;
    let units = load_source_units(&config).await.unwrap();
    let chunks = build_splitter(&config).split_units(&units).unwrap();

    assert!(chunks.len() > units.len());
    for chunk in &chunks {
        assert!(chunk.content.chars().count() <= 200);
        assert!(units.metadatas.contains(&chunk.metadata));
    }
    let md_chunks = chunks
        .iter()
        .filter(|c| c.metadata.source.ends_with("rag_overview.md"))
        .count();
    assert!(md_chunks > 1);
}

#[tokio::test]
async fn search_returns_top_k_sorted() {
    let mut config = config_for(&sample_data());
    config.retrieval.top_k = 3;
    let store = create_vector_store(&config).unwrap();
    let embedder = embedder();

    let stored = ensure_ingested(&config, Arc::clone(&store), &embedder)
        .await
        .unwrap();
    assert!(stored >= 8);

    let hits = build_retriever(&config, store, &embedder)
        .retrieve("what is a vector store")
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(hits.iter().all(|h| !h.content.is_empty()));
}

#[tokio::test]
async fn ask_end_to_end_with_mock_model() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("facts.csv"),
        "city,country\nparis,france\nlima,peru\n",
    )
    .unwrap();
    let mut config = config_for(dir.path());
    config.retrieval.top_k = 1;
    let store = create_vector_store(&config).unwrap();
    let embedder = embedder();
    assert_eq!(
        rebuild(&config, Arc::clone(&store), &embedder).await.unwrap(),
        2
    );

    let chat = AnyProvider::Mock(MockProvider::with_responses(vec!["Paris.".into()]));
    let chain = build_chain(&config, store, &embedder, chat).await.unwrap();
    let answer = chain.ask("city: paris").await.unwrap();

    assert_eq!(answer.text, "Paris.");
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].content, "city: paris\ncountry: france");
    assert_eq!(answer.sources[0].row_page, Some(0));
    assert!(answer.prompt.starts_with("You are an assistant for question-answering tasks."));
    assert!(answer.prompt.contains("Question: city: paris \n"));
    assert!(answer.prompt.contains("Context: city: paris\ncountry: france \n"));
}

#[tokio::test]
async fn empty_data_dir_stores_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    let store = create_vector_store(&config).unwrap();

    let stored = ensure_ingested(&config, Arc::clone(&store), &embedder())
        .await
        .unwrap();
    assert_eq!(stored, 0);
    assert!(!store.collection_exists("ragwalk").await.unwrap());
}

#[tokio::test]
async fn empty_data_dir_still_answers() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    let store = create_vector_store(&config).unwrap();
    let embedder = embedder();
    assert_eq!(
        ensure_ingested(&config, Arc::clone(&store), &embedder)
            .await
            .unwrap(),
        0
    );

    let chat = AnyProvider::Mock(MockProvider::default());
    let chain = build_chain(&config, store, &embedder, chat).await.unwrap();
    let answer = chain.ask("anything there?").await.unwrap();

    assert!(answer.sources.is_empty());
    assert_eq!(answer.text, "mock response");
}
