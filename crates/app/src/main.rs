use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use nugget_retrieval_core::{
    build_index, load_rules, read_snapshot, save_snapshot, CharacterNgramEmbedder,
    DocumentSource, Embedder, EmbeddingEndpointConfig, GeminiConfig, GeminiGenerator,
    HttpEmbedder, PageScraper, ResponseGenerator, RetrievalError, Retriever, SessionContext,
    DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL, DEFAULT_GEMINI_BASE_URL,
    DEFAULT_GEMINI_MODEL, DEFAULT_TOP_K, HISTORY_WINDOW,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type DynEmbedder = Box<dyn Embedder + Send + Sync>;

// all-minilm
const HTTP_EMBEDDING_DIMENSIONS: usize = 384;

#[derive(Parser)]
#[command(name = "nugget", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Snapshot file holding the documents and their vectors
    #[arg(long, env = "SNAPSHOT_PATH", default_value = "knowledge_base/snapshot.json")]
    snapshot: PathBuf,

    /// Embedding backend
    #[arg(long, value_enum, default_value_t = EmbedderKind::Ngram)]
    embedder: EmbedderKind,

    /// Vector dimension produced by the embedder
    #[arg(long, env = "EMBEDDING_DIMENSIONS")]
    dimensions: Option<usize>,

    /// Ollama-compatible embedding endpoint (http embedder only)
    #[arg(long, env = "EMBEDDING_ENDPOINT", default_value = "http://localhost:11434")]
    embedding_endpoint: String,

    /// Embedding model name (http embedder only)
    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Bearer token for the embedding endpoint
    #[arg(long, env = "EMBEDDING_API_KEY", hide_env_values = true)]
    embedding_api_key: Option<String>,

    /// Where the fastembed model files are cached
    #[arg(long, env = "EMBEDDING_CACHE_DIR")]
    #[cfg_attr(not(feature = "fastembed"), allow(dead_code))]
    embedding_cache_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmbedderKind {
    /// Offline hashed character trigrams
    Ngram,
    /// Remote embedding model over HTTP
    Http,
    /// Local all-MiniLM-L6-v2 (build with `--features fastembed`)
    Fastembed,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape restaurant pages and build a fresh snapshot.
    Ingest {
        /// File with one page URL per line.
        #[arg(long)]
        links_file: PathBuf,
        /// File of `class names,label` extraction rules.
        #[arg(long, default_value = "class_names.txt")]
        rules_file: PathBuf,
    },
    /// Build a snapshot from a JSON array of document strings.
    Index {
        #[arg(long)]
        documents_file: PathBuf,
    },
    /// Print the documents nearest to a query.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
    /// Interactive chat grounded in retrieved documents.
    Chat {
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        /// Generative model name
        #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
        gemini_model: String,
        /// Generative API base URL
        #[arg(long, default_value = DEFAULT_GEMINI_BASE_URL)]
        gemini_url: String,
        /// Generative API key
        #[arg(long, env = "API_KEY", hide_env_values = true)]
        api_key: String,
    },
}

impl Cli {
    fn embedder(&self) -> anyhow::Result<DynEmbedder> {
        let embedder: DynEmbedder = match self.embedder {
            EmbedderKind::Ngram => Box::new(CharacterNgramEmbedder {
                dimensions: self.dimensions.unwrap_or(DEFAULT_EMBEDDING_DIMENSIONS),
            }),
            EmbedderKind::Http => Box::new(HttpEmbedder::new(EmbeddingEndpointConfig {
                endpoint: self.embedding_endpoint.clone(),
                model: self.embedding_model.clone(),
                dimensions: self.dimensions.unwrap_or(HTTP_EMBEDDING_DIMENSIONS),
                api_key: self.embedding_api_key.clone(),
            })?),
            EmbedderKind::Fastembed => self.local_embedder()?,
        };
        Ok(embedder)
    }

    #[cfg(feature = "fastembed")]
    fn local_embedder(&self) -> anyhow::Result<DynEmbedder> {
        use nugget_retrieval_core::{FastEmbedEmbedder, FASTEMBED_DIMENSIONS};

        if let Some(dimensions) = self.dimensions.filter(|d| *d != FASTEMBED_DIMENSIONS) {
            anyhow::bail!(
                "the fastembed model produces {FASTEMBED_DIMENSIONS}-dimensional vectors, not {dimensions}"
            );
        }
        let embedder = FastEmbedEmbedder::with_cache_dir(self.embedding_cache_dir.clone())?;
        Ok(Box::new(embedder))
    }

    #[cfg(not(feature = "fastembed"))]
    fn local_embedder(&self) -> anyhow::Result<DynEmbedder> {
        anyhow::bail!("this build has no local embedder; rebuild nugget with `--features fastembed`")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let embedder = cli.embedder()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        model = embedder.model(),
        dimensions = embedder.dimensions(),
        "nugget boot"
    );

    match &cli.command {
        Command::Ingest {
            links_file,
            rules_file,
        } => {
            let links = read_links(links_file)?;
            let rules = load_rules(rules_file)?;
            let scraper = PageScraper::new(rules)?;
            let report = scraper.collect(&links).await;

            if !report.skipped.is_empty() {
                warn!(skipped = report.skipped.len(), "pages skipped during scrape");
                for skipped in &report.skipped {
                    warn!(url = %skipped.url, reason = %skipped.reason, "skipped page");
                }
            }

            write_snapshot(report.documents, &embedder, &cli.snapshot)?;
        }
        Command::Index { documents_file } => {
            let raw = std::fs::read_to_string(documents_file)
                .with_context(|| format!("reading {}", documents_file.display()))?;
            let documents: Vec<String> = serde_json::from_str(&raw).with_context(|| {
                format!("{} is not a JSON array of strings", documents_file.display())
            })?;

            write_snapshot(documents, &embedder, &cli.snapshot)?;
        }
        Command::Search { query, top_k } => {
            let retriever = open_retriever(&cli.snapshot, embedder)?;
            let hits = retriever
                .retrieve_scored(query, *top_k)
                .map_err(explain_retrieval_error)?;

            println!("query: {query}");
            for hit in hits {
                println!("[{}] distance={:.4}", hit.position, hit.distance);
                println!("{}", hit.text.trim_end());
            }
        }
        Command::Chat {
            top_k,
            gemini_model,
            gemini_url,
            api_key,
        } => {
            let retriever = open_retriever(&cli.snapshot, embedder)?;
            let generator = GeminiGenerator::new(GeminiConfig {
                base_url: gemini_url.clone(),
                model: gemini_model.clone(),
                api_key: api_key.clone(),
            })?;

            run_chat(&retriever, &generator, *top_k).await?;
        }
    }

    Ok(())
}

fn read_links(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading links from {}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn write_snapshot(
    documents: Vec<String>,
    embedder: &DynEmbedder,
    path: &Path,
) -> anyhow::Result<()> {
    if documents.is_empty() {
        warn!("no documents to index; the snapshot will refuse retrieval");
    }

    let (corpus, index) = build_index(documents, embedder)?;
    let snapshot = save_snapshot(&corpus, &index, embedder.model(), path)?;

    println!(
        "{} documents indexed into {} at {}",
        snapshot.documents.len(),
        path.display(),
        snapshot.created_at.to_rfc3339()
    );
    Ok(())
}

fn open_retriever(path: &Path, embedder: DynEmbedder) -> anyhow::Result<Retriever<DynEmbedder>> {
    let snapshot = read_snapshot(path)
        .map_err(explain_retrieval_error)
        .with_context(|| format!("loading snapshot {}", path.display()))?;

    if snapshot.model != embedder.model() {
        warn!(
            snapshot_model = %snapshot.model,
            configured_model = embedder.model(),
            "snapshot was built with a different embedding model"
        );
    }

    info!(
        snapshot_id = %snapshot.snapshot_id,
        documents = snapshot.documents.len(),
        created_at = %snapshot.created_at.to_rfc3339(),
        "snapshot loaded"
    );

    let (corpus, index) = snapshot.into_parts()?;
    Retriever::new(corpus, index, embedder).map_err(explain_retrieval_error)
}

async fn run_chat<G: ResponseGenerator>(
    retriever: &Retriever<DynEmbedder>,
    generator: &G,
    top_k: usize,
) -> anyhow::Result<()> {
    let mut session = SessionContext::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query == "/quit" || query == "/exit" {
            break;
        }
        if query == "/history" {
            for (index, turn) in session.turns().iter().enumerate() {
                println!("Chat {}: {} => {}", index + 1, turn.query, turn.response);
            }
            continue;
        }

        let documents = match retriever.retrieve(query, top_k) {
            Ok(documents) => documents,
            Err(error) => {
                error!(error = %error, "retrieval failed");
                println!("nugget> {}", explain_retrieval_error(error));
                continue;
            }
        };

        let response = match generator
            .generate(&documents, query, session.recent(HISTORY_WINDOW))
            .await
        {
            Ok(response) => response,
            Err(error) => {
                error!(error = %error, "generation failed");
                println!("nugget> The answer service is unavailable right now, please retry.");
                continue;
            }
        };

        println!("nugget> {response}");
        session.record(query, response);
    }

    Ok(())
}

fn explain_retrieval_error(error: RetrievalError) -> anyhow::Error {
    match error {
        RetrievalError::EmptyCorpus
        | RetrievalError::SnapshotCorrupt(_)
        | RetrievalError::CorpusMisaligned { .. }
        | RetrievalError::DimensionMismatch { .. } => {
            anyhow::anyhow!("{error}; rebuild the snapshot with `nugget ingest` or `nugget index`")
        }
        RetrievalError::Embedding(_) => {
            anyhow::anyhow!("{error}; check the embedding service and retry")
        }
        other => anyhow::Error::new(other),
    }
}
