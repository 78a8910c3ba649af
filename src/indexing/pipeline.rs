//! End-to-end offline build: ingest, vocabulary, forward index, barrels.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::forward::{ForwardIndexBuilder, ForwardStats};
use super::inverted::{InvertedIndexBuilder, InvertedStats};
use super::vocabulary::build_vocabulary;
use crate::autocomplete::Autocomplete;
use crate::config::EngineConfig;
use crate::lexicon::Lexicon;
use crate::models::{Document, SiteId};
use crate::persistence::{DocStore, IsamStore};
use crate::tokenizer::Tokenizer;
use crate::Result;

const INGEST_BATCH: usize = 10_000;

#[derive(Clone, Debug, Default)]
pub struct IngestStats {
    pub stored: usize,
    pub skipped: usize,
}

/// Bulk-load documents into the document store.
///
/// Documents with site 0 are assigned `site`. Documents failing validation
/// or belonging to another site are skipped with a warning.
pub fn ingest_documents<I>(store: &DocStore, docs: I, site: SiteId) -> Result<IngestStats>
where
    I: IntoIterator<Item = Document>,
{
    let mut stats = IngestStats::default();
    let mut batch = Vec::with_capacity(INGEST_BATCH);

    for mut doc in docs {
        if doc.site_id == 0 {
            doc.site_id = site;
        }
        if let Err(e) = doc.validate() {
            warn!("Skipping document {}: {}", doc.id, e);
            stats.skipped += 1;
            continue;
        }
        if doc.site_id != site {
            warn!(
                "Skipping document {}: site {} is not the indexed site {}",
                doc.id, doc.site_id, site
            );
            stats.skipped += 1;
            continue;
        }
        batch.push(doc);
        if batch.len() >= INGEST_BATCH {
            stats.stored += store.put_batch(&batch)?;
            batch.clear();
            info!("Ingested {} documents", stats.stored);
        }
    }
    if !batch.is_empty() {
        stats.stored += store.put_batch(&batch)?;
    }

    info!(
        "Ingest complete: {} stored, {} skipped",
        stats.stored, stats.skipped
    );
    Ok(stats)
}

#[derive(Clone, Debug, Default)]
pub struct BuildReport {
    pub documents: usize,
    pub words: usize,
    pub vocabulary: usize,
    pub forward: ForwardStats,
    pub inverted: InvertedStats,
    pub elapsed: Duration,
}

fn load_lexicon(config: &EngineConfig) -> Result<Lexicon> {
    Lexicon::load(config.lexicon_path(), Tokenizer::new(&config.tokenizer))
}

/// Vocabulary pass: writes `lexicon.txt` and `vocab.txt`.
pub fn build_lexicon(config: &EngineConfig) -> Result<(usize, Lexicon)> {
    let docs = DocStore::open(config.data_index_base())?;
    let lexicon = Lexicon::new(Tokenizer::new(&config.tokenizer));
    let mut trie = Autocomplete::new();
    let visited = build_vocabulary(&docs, &lexicon, &mut trie, &config.scoring)?;
    lexicon.save(config.lexicon_path())?;
    trie.save(config.vocab_path())?;
    Ok((visited, lexicon))
}

/// Forward pass over the stored documents, replacing any earlier forward index.
pub fn build_forward(config: &EngineConfig, lexicon: &Lexicon) -> Result<ForwardStats> {
    let docs = DocStore::open(config.data_index_base())?;
    let base = config.forward_index_base();
    for ext in ["idx", "dat"] {
        let path = base.with_extension(ext);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
    }
    let forward = IsamStore::open(&base)?;
    let stats = ForwardIndexBuilder::new(lexicon).build(&docs, &forward)?;
    // The forward pass may assign ids the vocabulary pass did not
    lexicon.save(config.lexicon_path())?;
    Ok(stats)
}

/// Barrel pass over an existing forward index.
pub fn build_inverted(config: &EngineConfig) -> Result<InvertedStats> {
    let forward = IsamStore::open(config.forward_index_base())?;
    InvertedIndexBuilder::new(config).build(&forward)
}

/// Which passes `build_stages` runs
#[derive(Clone, Copy, Debug)]
pub struct BuildStages {
    pub lexicon: bool,
    pub forward: bool,
    pub inverted: bool,
}

impl BuildStages {
    pub fn all() -> Self {
        Self {
            lexicon: true,
            forward: true,
            inverted: true,
        }
    }
}

/// Run the selected passes in order. Later passes load what earlier runs saved.
pub fn build_stages(config: &EngineConfig, stages: BuildStages) -> Result<BuildReport> {
    let start = Instant::now();
    let mut report = BuildReport::default();

    let lexicon = if stages.lexicon {
        let (visited, lexicon) = build_lexicon(config)?;
        report.documents = visited;
        lexicon
    } else {
        load_lexicon(config)?
    };

    if stages.forward {
        report.forward = build_forward(config, &lexicon)?;
        report.documents = report.documents.max(report.forward.documents);
    }
    if stages.inverted {
        report.inverted = build_inverted(config)?;
    }

    report.words = lexicon.len();
    report.vocabulary = Autocomplete::load(config.vocab_path())?.len();
    report.elapsed = start.elapsed();
    info!(
        "Build finished in {:?}: {} documents, {} words",
        report.elapsed, report.documents, report.words
    );
    Ok(report)
}

/// Full offline build
pub fn build_all(config: &EngineConfig) -> Result<BuildReport> {
    build_stages(config, BuildStages::all())
}
