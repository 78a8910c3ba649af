pub mod autocomplete;
pub mod config;
pub mod engine;
pub mod error;
pub mod indexing;
pub mod lexicon;
pub mod metrics;
pub mod models;
pub mod persistence;
pub mod tokenizer;

pub use autocomplete::Autocomplete;
pub use config::{EngineConfig, ScoringConfig, TokenizerConfig};
pub use engine::{spawn_flusher, FlushReport, FlusherHandle, QueryEngine};
pub use error::{HaystackError, Result};
pub use lexicon::Lexicon;
pub use metrics::EngineMetrics;
pub use models::*;
pub use persistence::{DocStore, IsamStore};
pub use tokenizer::Tokenizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
