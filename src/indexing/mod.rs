//! Offline build pipeline: documents -> vocabulary -> forward index -> barrels.

mod barrel;
mod field;
mod forward;
mod inverted;
mod pipeline;
mod vocabulary;

pub use barrel::{
    format_line, merge_replacing, parse_line, read_barrel, scan_word, write_barrel,
    BarrelContents, BarrelSet,
};
pub use field::{occurrence_score, FieldMask};
pub use forward::{decode_forward, encode_forward, ForwardEntry, ForwardIndexBuilder, ForwardStats};
pub use inverted::{score_document, InvertedIndexBuilder, InvertedStats};
pub use pipeline::{
    build_all, build_forward, build_inverted, build_lexicon, build_stages, ingest_documents,
    BuildReport, BuildStages, IngestStats,
};
pub use vocabulary::build_vocabulary;
