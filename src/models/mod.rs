pub mod batch;
pub mod document;
pub mod key;
pub mod posting;

pub use batch::{AddFailure, AddReport};
pub use document::{strip_html, Document, DocumentId, PostType};
pub use key::{CompoundKey, KeyKind, SiteId};
pub use posting::{sort_by_score, Posting, WordId};
