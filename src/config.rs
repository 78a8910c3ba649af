use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{HaystackError, Result};

/// Tokenizer configuration
///
/// The defaults reproduce the indexing pipeline exactly: whitespace split,
/// punctuation trim, lowercase, nothing else.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub remove_stopwords: bool,
    pub stem: bool,
    pub min_token_length: usize,
    pub max_token_length: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            remove_stopwords: false,
            stem: false,
            min_token_length: 1,
            max_token_length: usize::MAX,
        }
    }
}

/// Weights used by the inverted index builder, the delta index and the re-ranker
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Added per occurrence carrying the title bit
    pub title_bonus: i32,
    /// Added per occurrence carrying the body bit
    pub body_base: i32,
    /// Added per occurrence carrying the tag bit
    pub tag_bonus: i32,
    /// Per-occurrence weight of title tokens in runtime-added documents
    pub delta_title_weight: i32,
    /// Per-occurrence weight of body tokens in runtime-added documents
    pub delta_body_weight: i32,
    pub exact_title_bonus: f64,
    pub title_tokens_bonus: f64,
    pub popularity_weight: f64,
    /// Autocomplete weight given to tags
    pub tag_vocab_weight: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            title_bonus: 10,
            body_base: 1,
            tag_bonus: 15,
            delta_title_weight: 10,
            delta_body_weight: 1,
            exact_title_bonus: 1000.0,
            title_tokens_bonus: 100.0,
            popularity_weight: 5.0,
            tag_vocab_weight: 5,
        }
    }
}

/// Engine configuration shared by the build pipeline and the query engine
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    /// Must match between index build time and query time
    pub num_barrels: u32,
    pub site_id: u16,
    pub cache_capacity: usize,
    pub rerank_depth: usize,
    pub corpus_size_estimate: u64,
    pub flush_interval_secs: u64,
    /// Keep parsed barrels in memory between queries
    pub cache_barrels: bool,
    pub query_threads: usize,
    pub scoring: ScoringConfig,
    pub tokenizer: TokenizerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./stackexchange-data"),
            num_barrels: 4,
            site_id: 1,
            cache_capacity: 1000,
            rerank_depth: 100,
            corpus_size_estimate: 1_000_000,
            // 2 hours
            flush_interval_secs: 2 * 60 * 60,
            cache_barrels: true,
            query_threads: num_cpus::get(),
            scoring: ScoringConfig::default(),
            tokenizer: TokenizerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration rooted at `data_dir`
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Load a JSON configuration file; absent fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| HaystackError::invalid(format!("bad config file: {}", e)))
    }

    pub fn with_barrels(mut self, num_barrels: u32) -> Self {
        self.num_barrels = num_barrels;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_site(mut self, site_id: u16) -> Self {
        self.site_id = site_id;
        self
    }

    pub fn with_query_threads(mut self, threads: usize) -> Self {
        self.query_threads = threads;
        self
    }

    pub fn with_flush_interval_secs(mut self, secs: u64) -> Self {
        self.flush_interval_secs = secs;
        self
    }

    /// Barrel count with the `>= 1` clamp applied
    pub fn barrel_count(&self) -> u32 {
        self.num_barrels.max(1)
    }

    pub fn data_index_base(&self) -> PathBuf {
        self.data_dir.join("data_index")
    }

    pub fn forward_index_base(&self) -> PathBuf {
        self.data_dir.join("forward_index")
    }

    pub fn lexicon_path(&self) -> PathBuf {
        self.data_dir.join("lexicon.txt")
    }

    pub fn vocab_path(&self) -> PathBuf {
        self.data_dir.join("vocab.txt")
    }

    pub fn barrel_path(&self, barrel: u32) -> PathBuf {
        self.data_dir.join(format!("barrel_{}.dat", barrel))
    }
}
