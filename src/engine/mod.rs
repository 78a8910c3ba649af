//! Runtime query engine.
//!
//! Serves ranked search over the on-disk barrels merged with the in-memory
//! delta index, accepts new documents, and periodically folds the delta
//! back into the barrels.

mod cache;
mod delta;
mod flush;
mod scoring;

pub use cache::QueryCache;
pub use delta::DeltaIndex;
pub use flush::{spawn_flusher, FlushReport, FlusherHandle};
pub use scoring::{accumulate, idf, overlay_delta, rank, rerank_bonus, ScoredDoc, MIN_IDF};

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::autocomplete::Autocomplete;
use crate::config::EngineConfig;
use crate::error::HaystackError;
use crate::indexing::BarrelSet;
use crate::lexicon::Lexicon;
use crate::metrics::EngineMetrics;
use crate::models::{AddFailure, AddReport, Document, DocumentId, Posting, WordId};
use crate::persistence::DocStore;
use crate::tokenizer::Tokenizer;
use crate::Result;

pub const MAX_SEARCH_LIMIT: usize = 1000;
pub const MAX_AUTOCOMPLETE_LIMIT: usize = 100;
pub const MAX_BATCH_SIZE: usize = 1000;

/// Owns every piece of mutable search state. Share it behind an `Arc`.
pub struct QueryEngine {
    config: EngineConfig,
    lexicon: Arc<Lexicon>,
    doc_store: DocStore,
    barrels: BarrelSet,
    delta: DeltaIndex,
    cache: QueryCache,
    trie: RwLock<Autocomplete>,
    metrics: EngineMetrics,
    /// One flush at a time
    flush_lock: Mutex<()>,
    corpus_docs: AtomicU64,
    pool: rayon::ThreadPool,
}

impl QueryEngine {
    /// Open the engine over the artifacts in `config.data_dir`.
    ///
    /// Missing lexicon, vocabulary or barrel files are treated as empty.
    pub fn open(config: EngineConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let tokenizer = Tokenizer::new(&config.tokenizer);
        let lexicon = Arc::new(Lexicon::load(config.lexicon_path(), tokenizer)?);
        let trie = Autocomplete::load(config.vocab_path())?;
        let doc_store = DocStore::open(config.data_index_base())?;
        let barrels = BarrelSet::new(&config);
        let metrics = EngineMetrics::new()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.query_threads.max(1))
            .thread_name(|i| format!("haystack-query-{}", i))
            .build()
            .map_err(|e| HaystackError::Internal(format!("query pool: {}", e)))?;

        let corpus = doc_store.len();
        metrics.set_corpus_documents(corpus);
        info!(
            "Query engine ready: {} documents, {} words, {} barrels at {:?}",
            corpus,
            lexicon.len(),
            barrels.count(),
            config.data_dir
        );

        Ok(Self {
            cache: QueryCache::new(config.cache_capacity),
            lexicon,
            doc_store,
            barrels,
            delta: DeltaIndex::new(),
            trie: RwLock::new(trie),
            metrics,
            flush_lock: Mutex::new(()),
            corpus_docs: AtomicU64::new(corpus),
            pool,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn lexicon(&self) -> &Arc<Lexicon> {
        &self.lexicon
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn delta(&self) -> &DeltaIndex {
        &self.delta
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Corpus size used by the rarity weight
    pub fn corpus_size(&self) -> u64 {
        self.config
            .corpus_size_estimate
            .max(self.corpus_docs.load(Ordering::Relaxed))
    }

    /// Store a document and make it searchable through the delta index.
    ///
    /// Re-adding an id replaces the stored document and its delta postings.
    /// Site 0 means the configured site; any other site is rejected.
    pub fn add_document(&self, mut doc: Document) -> Result<()> {
        if doc.site_id == 0 {
            doc.site_id = self.config.site_id;
        }
        if let Err(e) = doc.validate().and_then(|_| self.check_site(&doc)) {
            self.metrics.record_add(false);
            return Err(e);
        }

        let existed = match self.doc_store.put_document(&doc) {
            Ok(existed) => existed,
            Err(e) => {
                self.metrics.record_add(false);
                return Err(e);
            }
        };

        let title_tokens = self.lexicon.tokenize(&doc.title);
        let body_tokens = self.lexicon.tokenize(&doc.plain_body());
        let scoring = &self.config.scoring;

        let mut scores: HashMap<WordId, i32> = HashMap::new();
        for (tokens, weight) in [
            (&title_tokens, scoring.delta_title_weight),
            (&body_tokens, scoring.delta_body_weight),
        ] {
            for token in tokens {
                let word_id = self.lexicon.add_word(token);
                if word_id != 0 {
                    let score = scores.entry(word_id).or_insert(0);
                    *score = score.saturating_add(weight);
                }
            }
        }
        for (word_id, score) in &scores {
            self.delta.upsert(*word_id, Posting::new(doc.id, *score));
        }

        {
            let mut trie = self.trie.write();
            for token in title_tokens.iter().chain(body_tokens.iter()) {
                trie.add_word(token, 1);
            }
            for tag in &doc.tags {
                self.lexicon.add_word(tag);
                trie.add_word(tag, scoring.tag_vocab_weight);
            }
        }

        if !existed {
            let corpus = self.corpus_docs.fetch_add(1, Ordering::Relaxed) + 1;
            self.metrics.set_corpus_documents(corpus);
        }
        self.cache.invalidate();
        self.metrics.record_add(true);
        self.metrics.set_delta_words(self.delta.word_count());
        debug!(
            "Added document {} ({} words, replaced: {})",
            doc.id,
            scores.len(),
            existed
        );
        Ok(())
    }

    fn check_site(&self, doc: &Document) -> Result<()> {
        if doc.site_id != self.config.site_id {
            return Err(HaystackError::invalid(format!(
                "document {} belongs to site {}, engine serves site {}",
                doc.id, doc.site_id, self.config.site_id
            )));
        }
        Ok(())
    }

    /// Add up to [`MAX_BATCH_SIZE`] documents, each one independently.
    pub fn add_documents(&self, docs: Vec<Document>) -> Result<AddReport> {
        if docs.is_empty() {
            return Err(HaystackError::invalid("batch must contain at least one document"));
        }
        if docs.len() > MAX_BATCH_SIZE {
            return Err(HaystackError::invalid(format!(
                "batch of {} documents exceeds the limit of {}",
                docs.len(),
                MAX_BATCH_SIZE
            )));
        }

        let mut report = AddReport::default();
        for doc in docs {
            let doc_id = doc.id;
            match self.add_document(doc) {
                Ok(()) => report.added.push(doc_id),
                Err(e) => {
                    if !e.is_validation() {
                        error!("Failed to add document {}: {}", doc_id, e);
                    }
                    report.failed.push(AddFailure {
                        doc_id,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Ranked document ids for `query`, at most `limit` of them.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<DocumentId>> {
        if query.trim().is_empty() {
            return Err(HaystackError::invalid("query must not be empty"));
        }
        if limit == 0 || limit > MAX_SEARCH_LIMIT {
            return Err(HaystackError::invalid(format!(
                "limit must be between 1 and {}",
                MAX_SEARCH_LIMIT
            )));
        }

        let start = Instant::now();
        let tokens = self.distinct_tokens(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let key = tokens.join(" ");

        if let Some(cached) = self.cache.get(&key) {
            self.metrics
                .record_search(start.elapsed().as_secs_f64(), true);
            debug!("Cache hit for {:?}", key);
            return Ok(cached.iter().take(limit).copied().collect());
        }

        let generation = self.cache.generation();
        let ranked = self.evaluate(&tokens)?;
        let ranked = Arc::new(ranked);
        self.cache.insert(key.clone(), ranked.clone(), generation);

        let elapsed = start.elapsed();
        self.metrics.record_search(elapsed.as_secs_f64(), false);
        debug!(
            "Query {:?}: {} candidates in {:?}",
            key,
            ranked.len(),
            elapsed
        );
        Ok(ranked.iter().take(limit).copied().collect())
    }

    /// Distinct normalized tokens, first-occurrence order.
    ///
    /// Joined, they form the cache key; the reranker compares titles in the same form.
    fn distinct_tokens(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.lexicon
            .tokenize(text)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }

    /// Full ranked list for the given tokens, bypassing the cache
    fn evaluate(&self, tokens: &[String]) -> Result<Vec<DocumentId>> {
        let contributions: Vec<Vec<(DocumentId, f64)>> = self.pool.install(|| {
            tokens
                .par_iter()
                .map(|token| self.token_contribution(token))
                .collect::<Result<Vec<_>>>()
        })?;

        // Merged in token order so float sums do not depend on thread timing
        let mut scores: HashMap<DocumentId, f64> = HashMap::new();
        for contribution in &contributions {
            accumulate(&mut scores, contribution);
        }

        let mut ranked = rank(scores);
        let depth = self.config.rerank_depth.min(ranked.len());
        for candidate in ranked.iter_mut().take(depth) {
            match self
                .doc_store
                .get_document(self.config.site_id, candidate.doc_id)
            {
                Ok(Some(doc)) => {
                    let title_tokens = self.distinct_tokens(&doc.title);
                    let bonus = rerank_bonus(&doc, &title_tokens, tokens, &self.config.scoring);
                    candidate.score = (candidate.score.0 + bonus).into();
                }
                Ok(None) => {}
                Err(HaystackError::Serialization(e)) => {
                    warn!("Document {} failed to decode: {}", candidate.doc_id, e);
                }
                Err(e) => return Err(e),
            }
        }
        ranked[..depth].sort();

        Ok(ranked.into_iter().map(|d| d.doc_id).collect())
    }

    /// IDF-weighted postings of one token from disk and delta
    fn token_contribution(&self, token: &str) -> Result<Vec<(DocumentId, f64)>> {
        let word_id = self.lexicon.get_word_id(token);
        if word_id == 0 {
            return Ok(Vec::new());
        }
        let disk = self.barrels.postings(word_id)?;
        let delta = self.delta.postings(word_id);
        let weight = idf(self.corpus_size(), disk.len(), delta.len());
        Ok(overlay_delta(disk, &delta)
            .into_iter()
            .map(|p| (p.doc_id, p.score as f64 * weight))
            .collect())
    }

    /// Completions of `prefix`, best first
    pub fn autocomplete(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        if limit == 0 || limit > MAX_AUTOCOMPLETE_LIMIT {
            return Err(HaystackError::invalid(format!(
                "limit must be between 1 and {}",
                MAX_AUTOCOMPLETE_LIMIT
            )));
        }
        if prefix.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.trie.read().query(prefix, limit))
    }

    pub fn get_document(&self, doc_id: DocumentId) -> Result<Option<Document>> {
        if doc_id == 0 {
            return Err(HaystackError::invalid(
                "document id is required and must be positive",
            ));
        }
        self.doc_store.get_document(self.config.site_id, doc_id)
    }
}
