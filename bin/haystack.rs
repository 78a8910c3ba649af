use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use haystack::indexing::{build_stages, ingest_documents, BuildStages};
use haystack::{DocStore, Document, EngineConfig, QueryEngine};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "haystack")]
#[command(about = "Barrel-sharded full-text search engine", long_about = None)]
struct Args {
    /// Directory holding the document store, lexicon and barrels
    #[arg(long, env = "HAYSTACK_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Number of barrels; must match between build and query time
    #[arg(long, env = "HAYSTACK_BARRELS", global = true)]
    barrels: Option<u32>,

    /// JSON configuration file
    #[arg(long, env = "HAYSTACK_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load documents (one JSON object per line) into the document store
    Ingest {
        #[arg(long)]
        input: PathBuf,
    },
    /// Build the lexicon, forward index and barrels; all stages when none is given
    Index(IndexArgs),
    /// Add documents through the live engine, then flush them into the barrels
    Add {
        #[arg(long)]
        input: PathBuf,
    },
    /// Ranked search
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Prefix completions
    Autocomplete {
        prefix: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print one stored document as JSON
    Get { id: u32 },
}

#[derive(ClapArgs)]
struct IndexArgs {
    #[arg(long)]
    lexicon: bool,
    #[arg(long)]
    forward: bool,
    #[arg(long)]
    reverse: bool,
}

impl IndexArgs {
    fn stages(&self) -> BuildStages {
        if !self.lexicon && !self.forward && !self.reverse {
            return BuildStages::all();
        }
        BuildStages {
            lexicon: self.lexicon,
            forward: self.forward,
            inverted: self.reverse,
        }
    }
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading config {:?}", path))?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(barrels) = args.barrels {
        config.num_barrels = barrels;
    }
    Ok(config)
}

fn read_jsonl(path: &Path) -> Result<Vec<Document>> {
    let reader = BufReader::new(File::open(path).with_context(|| format!("opening {:?}", path))?);
    let mut docs = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Document>(&line) {
            Ok(doc) => docs.push(doc),
            Err(e) => warn!("{}:{}: skipping unparsable document: {}", path.display(), n + 1, e),
        }
    }
    Ok(docs)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!(
        "haystack v{} - data dir {:?}, {} barrels",
        haystack::VERSION,
        config.data_dir,
        config.barrel_count()
    );

    match &args.command {
        Command::Ingest { input } => {
            let docs = read_jsonl(input)?;
            std::fs::create_dir_all(&config.data_dir)?;
            let store = DocStore::open(config.data_index_base())?;
            let stats = ingest_documents(&store, docs, config.site_id)?;
            println!("stored {} documents, skipped {}", stats.stored, stats.skipped);
        }
        Command::Index(index) => {
            let report = build_stages(&config, index.stages())?;
            println!(
                "indexed {} documents: {} words, {} postings in {:?}",
                report.documents, report.words, report.inverted.postings, report.elapsed
            );
        }
        Command::Add { input } => {
            let docs = read_jsonl(input)?;
            let engine = QueryEngine::open(config)?;
            for chunk in docs.chunks(haystack::engine::MAX_BATCH_SIZE) {
                let report = engine.add_documents(chunk.to_vec())?;
                for failure in &report.failed {
                    warn!("document {} rejected: {}", failure.doc_id, failure.error);
                }
                println!("added {}, failed {}", report.success_count(), report.failure_count());
            }
            let flushed = engine.flush_delta_to_disk()?;
            println!(
                "flushed {} postings into {} barrels",
                flushed.postings_flushed, flushed.barrels_written
            );
        }
        Command::Search { query, limit } => {
            let engine = QueryEngine::open(config)?;
            for doc_id in engine.search(query, *limit)? {
                match engine.get_document(doc_id)? {
                    Some(doc) => println!("{}\t{}\t{}", doc_id, doc.score, doc.title),
                    None => println!("{}", doc_id),
                }
            }
        }
        Command::Autocomplete { prefix, limit } => {
            let engine = QueryEngine::open(config)?;
            for suggestion in engine.autocomplete(prefix, *limit)? {
                println!("{}", suggestion);
            }
        }
        Command::Get { id } => {
            let engine = QueryEngine::open(config)?;
            match engine.get_document(*id)? {
                Some(doc) => println!("{}", serde_json::to_string_pretty(&doc)?),
                None => bail!("document {} not found", id),
            }
        }
    }

    Ok(())
}
