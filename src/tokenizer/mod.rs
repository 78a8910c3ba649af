mod stopwords;
#[allow(clippy::module_inception)]
mod tokenizer;

pub use stopwords::StopWordFilter;
pub use tokenizer::{normalize, Tokenizer, TRIM_CHARS};
