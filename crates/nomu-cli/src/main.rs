mod display;
mod load;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use nomu_ai::llm::DEFAULT_BASE_URL;
use nomu_ai::{Counsel, OpenAiClient, Session, StepOutcome};
use nomu_core::{Answer, CounselConfig, IssueVocabulary};
use nomu_store::{EvidenceStore, LanceStore, MemoryStore, QueryEmbedder, XrefCache, read_jsonl};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nomu", version, about = "Korean labor-law consultation over a statute corpus")]
struct Cli {
    #[command(flatten)]
    model: ModelArgs,

    #[command(flatten)]
    sources: SourceArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ModelArgs {
    /// API key for the OpenAI-compatible endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    base_url: String,

    #[arg(long, env = "NOMU_CHAT_MODEL", default_value = "gpt-4o-mini", global = true)]
    chat_model: String,

    #[arg(long, env = "NOMU_EMBEDDING_MODEL", default_value = "text-embedding-3-large", global = true)]
    embedding_model: String,
}

#[derive(Args)]
struct SourceArgs {
    /// LanceDB directory holding `statute_articles`
    #[arg(long, env = "NOMU_DB", default_value = "data/nomu.lancedb", global = true)]
    db: PathBuf,

    /// Search a JSONL corpus in memory instead of LanceDB
    #[arg(long, env = "NOMU_CORPUS", global = true)]
    corpus: Option<PathBuf>,

    /// Legal-term cross-reference cache (JSON)
    #[arg(long, env = "NOMU_XREF", global = true)]
    xref: Option<PathBuf>,

    /// Issue vocabulary override (JSON)
    #[arg(long, env = "NOMU_VOCABULARY", global = true)]
    vocabulary: Option<PathBuf>,

    /// Pipeline tuning override (JSON)
    #[arg(long, env = "NOMU_CONFIG", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run an interactive consultation
    Consult {
        /// Situation text; read from stdin when omitted
        situation: Option<String>,

        /// Print the conclusion as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify a situation without opening a consultation
    Classify { situation: String },

    /// Embed a corpus and (re)create the statute table
    Load {
        /// JSONL corpus to embed
        #[arg(long, conflicts_with = "parquet", required_unless_present = "parquet")]
        jsonl: Option<PathBuf>,

        /// Pre-embedded Parquet export to import as is
        #[arg(long)]
        parquet: Option<PathBuf>,
    },

    /// Show store, vocabulary, and cross-reference summaries
    Info,
}

impl ModelArgs {
    fn client(&self) -> anyhow::Result<Arc<OpenAiClient>> {
        let api_key = self
            .api_key
            .clone()
            .context("no API key (set OPENAI_API_KEY or pass --api-key)")?;
        Ok(Arc::new(OpenAiClient::new(
            api_key,
            &self.base_url,
            self.chat_model.clone(),
            self.embedding_model.clone(),
        )))
    }
}

impl SourceArgs {
    fn vocabulary(&self) -> anyhow::Result<IssueVocabulary> {
        match &self.vocabulary {
            Some(path) => IssueVocabulary::from_file(path)
                .with_context(|| format!("loading vocabulary {}", path.display())),
            None => Ok(IssueVocabulary::default()),
        }
    }

    fn xref(&self) -> anyhow::Result<XrefCache> {
        match &self.xref {
            Some(path) => XrefCache::from_file(path)
                .with_context(|| format!("loading cross-references {}", path.display())),
            None => Ok(XrefCache::empty()),
        }
    }

    fn config(&self) -> anyhow::Result<CounselConfig> {
        match &self.config {
            Some(path) => CounselConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display())),
            None => Ok(CounselConfig::default()),
        }
    }

    async fn store(&self, embedder: Arc<dyn QueryEmbedder>) -> anyhow::Result<Arc<dyn EvidenceStore>> {
        if let Some(path) = &self.corpus {
            let store = MemoryStore::from_jsonl(path)
                .with_context(|| format!("loading corpus {}", path.display()))?;
            tracing::info!(records = store.len(), "in-memory corpus loaded");
            return Ok(Arc::new(store));
        }
        let lance = LanceStore::open(&self.db, embedder)
            .await
            .with_context(|| format!("opening {}", self.db.display()))?;
        let rows = lance
            .statute_articles_count()
            .await
            .context("statute table missing; run `nomu load` first")?;
        if rows == 0 {
            bail!("statute table is empty; run `nomu load` first");
        }
        tracing::info!(rows, "LanceDB statute table opened");
        Ok(Arc::new(lance))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    tracing::info!("nomu v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    match cli.command {
        Command::Consult { situation, json } => consult(&cli.model, &cli.sources, situation, json).await,
        Command::Classify { situation } => classify(&cli.model, &cli.sources, &situation).await,
        Command::Load { jsonl, parquet } => load_corpus(&cli.model, &cli.sources, jsonl, parquet).await,
        Command::Info => info(&cli.sources).await,
    }
}

async fn counsel(model: &ModelArgs, sources: &SourceArgs) -> anyhow::Result<Counsel> {
    let client = model.client()?;
    let config = sources.config()?;
    config.validate().context("invalid pipeline config")?;
    let store = sources.store(client.clone()).await?;
    Ok(Counsel::new(
        store,
        client,
        Arc::new(sources.vocabulary()?),
        Arc::new(sources.xref()?),
        config,
    ))
}

async fn consult(
    model: &ModelArgs,
    sources: &SourceArgs,
    situation: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let mut session = Session::new(Arc::new(counsel(model, sources).await?));
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let situation = match situation {
        Some(text) => text,
        None => {
            eprintln!("상황을 설명해 주세요:");
            read_line(&mut input).await?
        }
    };

    let mut outcome = session.submit_situation(&situation).await?;
    loop {
        match outcome {
            StepOutcome::NoIssue => {
                println!("노동법 쟁점을 찾지 못했습니다. 상황을 조금 더 구체적으로 적어 주세요.");
                return Ok(());
            }
            StepOutcome::Checklist { round, items } => {
                let Some(issue) = session.state().selected_issue.clone() else {
                    bail!("checklist opened without an issue");
                };
                let rendered = display::render_checklist(&issue, round, &items);
                if json {
                    eprint!("{rendered}");
                } else {
                    print!("{rendered}");
                }
                let mut answers = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    eprint!("  [{}] {} (네/아니요/모르겠음 또는 직접 입력): ", i + 1, item.short_label);
                    answers.push(Answer::parse(&read_line(&mut input).await?));
                }
                session.answer_all(answers)?;
                outcome = session.advance().await?;
            }
            StepOutcome::Concluded(result) => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                } else {
                    display::print_conclusion(&result);
                }
                return Ok(());
            }
        }
    }
}

async fn read_line(input: &mut Lines<BufReader<Stdin>>) -> anyhow::Result<String> {
    match input.next_line().await.context("reading stdin")? {
        Some(line) => Ok(line),
        None => bail!("stdin closed before the consultation finished"),
    }
}

async fn classify(model: &ModelArgs, sources: &SourceArgs, situation: &str) -> anyhow::Result<()> {
    let counsel = counsel(model, sources).await?;
    let classification = counsel.classify_issue(situation).await;
    display::print_classification(&classification);
    Ok(())
}

async fn load_corpus(
    model: &ModelArgs,
    sources: &SourceArgs,
    jsonl: Option<PathBuf>,
    parquet: Option<PathBuf>,
) -> anyhow::Result<()> {
    let client = model.client()?;
    let lance = LanceStore::open(&sources.db, client.clone())
        .await
        .with_context(|| format!("opening {}", sources.db.display()))?;

    if let Some(path) = parquet {
        lance
            .create_statute_articles(&path)
            .await
            .with_context(|| format!("importing {}", path.display()))?;
        println!("Imported {} rows from {}", lance.statute_articles_count().await?, path.display());
        return Ok(());
    }

    let Some(path) = jsonl else {
        bail!("pass --jsonl or --parquet");
    };
    let records = read_jsonl(&path).with_context(|| format!("reading {}", path.display()))?;
    eprintln!("Embedding {} passages with {}...", records.len(), model.embedding_model);
    let stats = load::run_load_pipeline(&lance, &client, &records).await?;
    println!(
        "Loaded {} rows ({}-dim embeddings) in {:.1}s",
        stats.total_rows, stats.embedding_dim, stats.elapsed_secs
    );
    Ok(())
}

async fn info(sources: &SourceArgs) -> anyhow::Result<()> {
    println!("=== nomu ===");
    println!();

    println!("Store");
    match &sources.corpus {
        Some(path) => {
            let records = read_jsonl(path).with_context(|| format!("reading {}", path.display()))?;
            println!("  {:<14} {}", "corpus", path.display());
            println!("  {:<14} {}", "records", records.len());
        }
        None => {
            let lance = LanceStore::open(&sources.db, Arc::new(NoEmbedder))
                .await
                .with_context(|| format!("opening {}", sources.db.display()))?;
            println!("  {:<14} {}", "db", sources.db.display());
            println!("  {:<14} {}", "tables", lance.table_names().await?.join(", "));
            match lance.statute_articles_count().await {
                Ok(rows) => println!("  {:<14} {}", "statute rows", rows),
                Err(_) => println!("  {:<14} (not loaded)", "statute rows"),
            }
        }
    }
    println!();

    let vocabulary = sources.vocabulary()?.summary();
    println!("Vocabulary");
    println!("  {:<14} {}", "labels", vocabulary.labels);
    println!("  {:<14} {}", "synonyms", vocabulary.synonyms);
    println!("  {:<14} {}", "categorized", vocabulary.labels_with_categories);
    println!();

    let xref = sources.xref()?.summary();
    println!("Cross-references");
    println!("  {:<14} {}", "terms", xref.terms);
    println!("  {:<14} {}", "articles", xref.articles);
    println!("  {:<14} {}", "issue sources", xref.issues_with_sources);
    println!("  {:<14} {}", "everyday", xref.everyday_phrases);
    println!("  {:<14} {}", "precedents", xref.precedents);
    Ok(())
}

/// Embedder for commands that never search.
struct NoEmbedder;

#[async_trait::async_trait]
impl QueryEmbedder for NoEmbedder {
    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, nomu_store::StoreError> {
        Err(nomu_store::StoreError::Embedding("no embedder configured".into()))
    }
}
