use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use ragwalk_core::bootstrap::{
    build_chain, build_pipeline, build_retriever, build_splitter, create_chat_provider,
    create_embedding_provider, create_named_chat_provider, create_vector_store, ensure_ingested,
    load_prompt, load_source_units, rebuild, resolve_config_path,
};
use ragwalk_core::config::{Config, ProviderKind};
use ragwalk_core::{Answer, ask_bare};
use ragwalk_llm::any::AnyProvider;
use ragwalk_llm::provider::LlmProvider;
use ragwalk_memory::document::{Chunk, SourceUnits};
use ragwalk_memory::RetrievedChunk;

const PREVIEW_CHARS: usize = 200;

#[derive(Parser)]
#[command(name = "ragwalk", version)]
#[command(about = "Retrieval-Augmented Generation, one stage at a time", long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the data directory and show what was found
    Load,
    /// Split loaded documents into chunks
    Split {
        /// Number of chunks to preview
        #[arg(short = 'n', long, default_value_t = 3)]
        preview: usize,
    },
    /// Load, split, embed and store every chunk
    Ingest,
    /// Retrieve the chunks most similar to a query
    Search {
        query: String,
        /// Number of chunks to return
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Answer a question with retrieved context
    Ask {
        question: String,
        /// Chat backend, overriding the config
        #[arg(long, value_enum)]
        llm: Option<LlmArg>,
        /// Ask the bare model without retrieval
        #[arg(long)]
        no_context: bool,
    },
    /// Run every stage in order for one question
    Walkthrough { question: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum LlmArg {
    Openai,
    Ollama,
}

impl From<LlmArg> for ProviderKind {
    fn from(arg: LlmArg) -> Self {
        match arg {
            LlmArg::Openai => Self::OpenAi,
            LlmArg::Ollama => Self::Ollama,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let config_path = resolve_config_path(cli.config);
    let mut config = Config::load(&config_path)?;
    if let Command::Search { k: Some(k), .. } = &cli.command {
        config.retrieval.top_k = *k;
    }
    config.validate()?;
    tracing::info!(config = %config_path.display(), "configuration loaded");

    match cli.command {
        Command::Load => cmd_load(&config).await,
        Command::Split { preview } => cmd_split(&config, preview).await,
        Command::Ingest => cmd_ingest(&config).await,
        Command::Search { query, .. } => cmd_search(&config, &query).await,
        Command::Ask {
            question,
            llm,
            no_context,
        } => cmd_ask(&config, &question, llm.map(Into::into), no_context).await,
        Command::Walkthrough { question } => cmd_walkthrough(&config, &question).await,
    }
}

/// Logs go to stderr so command output on stdout stays clean.
fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn cmd_load(config: &Config) -> anyhow::Result<()> {
    let units = load_source_units(config).await?;
    print_units(&units);
    Ok(())
}

async fn cmd_split(config: &Config, preview: usize) -> anyhow::Result<()> {
    let units = load_source_units(config).await?;
    let chunks = build_splitter(config).split_units(&units)?;
    print_chunks(&chunks, preview);
    Ok(())
}

async fn cmd_ingest(config: &Config) -> anyhow::Result<()> {
    let embedder = create_embedding_provider(config)?;
    let store = create_vector_store(config)?;
    let stored = rebuild(config, store, &embedder).await?;
    println!(
        "Stored {stored} chunks in collection '{}'",
        config.vector_store.collection
    );
    Ok(())
}

async fn cmd_search(config: &Config, query: &str) -> anyhow::Result<()> {
    let embedder = create_embedding_provider(config)?;
    let store = create_vector_store(config)?;
    ensure_ingested(config, Arc::clone(&store), &embedder).await?;

    let hits = build_retriever(config, store, &embedder)
        .retrieve(query)
        .await
        .context("retrieval failed")?;
    print_hits(&hits);
    Ok(())
}

async fn cmd_ask(
    config: &Config,
    question: &str,
    llm: Option<ProviderKind>,
    no_context: bool,
) -> anyhow::Result<()> {
    let chat = match llm {
        Some(kind) => create_named_chat_provider(kind, config)?,
        None => create_chat_provider(config)?,
    };

    if no_context {
        let text = ask_bare(&chat, question).await?;
        println!("{text}");
        return Ok(());
    }

    let embedder = create_embedding_provider(config)?;
    let store = create_vector_store(config)?;
    ensure_ingested(config, Arc::clone(&store), &embedder).await?;
    let chain = build_chain(config, store, &embedder, chat).await?;
    let answer = chain.ask(question).await?;
    print_answer(&answer);
    Ok(())
}

async fn cmd_walkthrough(config: &Config, question: &str) -> anyhow::Result<()> {
    println!("== 1. Load ==");
    let units = load_source_units(config).await?;
    print_units(&units);

    println!("\n== 2. Split ==");
    let chunks = build_splitter(config).split_units(&units)?;
    print_chunks(&chunks, 2);

    println!("\n== 3. Embed and store ==");
    let embedder = create_embedding_provider(config)?;
    let store = create_vector_store(config)?;
    let collection = &config.vector_store.collection;
    if store.collection_exists(collection).await? {
        store.delete_collection(collection).await?;
    }
    let stored = build_pipeline(config, Arc::clone(&store), &embedder)
        .ingest_units(&units)
        .await
        .context("ingestion failed")?;
    println!(
        "Stored {stored} chunks in '{collection}' using {} embeddings",
        config.embedding.effective_model()
    );

    println!("\n== 4. Retrieve ==");
    let retriever = build_retriever(config, Arc::clone(&store), &embedder);
    let hits = retriever.retrieve(question).await?;
    print_hits(&hits);

    println!("\n== 5. Prompt ==");
    let template = load_prompt(config).await?;
    println!("Template variables: {:?}", template.input_variables());

    println!("\n== 6. Answer ==");
    let mut answered = false;
    for kind in [ProviderKind::OpenAi, ProviderKind::Ollama] {
        let Some(chat) = available_chat_provider(kind, config).await else {
            continue;
        };
        let chain = build_chain(config, Arc::clone(&store), &embedder, chat).await?;
        match chain.ask(question).await {
            Ok(answer) => {
                println!("-- {kind} ({}) --", chain.provider().model());
                println!("{}", answer.text);
                answered = true;
            }
            Err(e) => tracing::error!(provider = %kind, "answer failed: {e:#}"),
        }
    }
    if !answered {
        anyhow::bail!("no chat backend produced an answer");
    }
    Ok(())
}

/// A chat backend that is usable right now, or `None` with a log line.
async fn available_chat_provider(kind: ProviderKind, config: &Config) -> Option<AnyProvider> {
    let provider = match create_named_chat_provider(kind, config) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(provider = %kind, "skipping: {e:#}");
            return None;
        }
    };
    if let AnyProvider::Ollama(ollama) = &provider
        && let Err(e) = ollama.health_check().await
    {
        tracing::warn!(provider = %kind, "skipping: {e}");
        return None;
    }
    tracing::info!(provider = provider.name(), "chat backend available");
    Some(provider)
}

fn print_units(units: &SourceUnits) {
    let mut per_file: BTreeMap<&str, usize> = BTreeMap::new();
    for meta in &units.metadatas {
        *per_file.entry(meta.source.as_str()).or_default() += 1;
    }
    println!("Loaded {} source units from {} files", units.len(), per_file.len());
    for (source, count) in per_file {
        println!("  {count:>5}  {source}");
    }
}

fn print_chunks(chunks: &[Chunk], preview: usize) {
    println!("Split into {} chunks", chunks.len());
    for chunk in chunks.iter().take(preview) {
        println!(
            "--- {} #{} ---\n{}",
            location(&chunk.metadata.source, chunk.metadata.row_page),
            chunk.chunk_index,
            truncate_chars(&chunk.content, PREVIEW_CHARS)
        );
    }
}

fn print_hits(hits: &[RetrievedChunk]) {
    if hits.is_empty() {
        println!("No matching chunks");
    }
    for (i, hit) in hits.iter().enumerate() {
        println!("{}", format_hit(i + 1, hit));
    }
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!("\nSources:");
        for source in &answer.sources {
            println!("  - {}", location(&source.source, source.row_page));
        }
    }
}

fn format_hit(rank: usize, hit: &RetrievedChunk) -> String {
    format!(
        "[{rank}] {:.3}  {}\n    {}",
        hit.score,
        location(&hit.source, hit.row_page),
        truncate_chars(&hit.content, PREVIEW_CHARS).replace('\n', "\n    ")
    )
}

fn location(source: &str, row_page: Option<usize>) -> String {
    match row_page {
        Some(n) => format!("{source} [{n}]"),
        None => source.to_owned(),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_owned(),
    }
}
