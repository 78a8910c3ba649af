use serde::{Deserialize, Serialize};

use super::document::DocumentId;

/// A document that could not be added, with the reason
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddFailure {
    pub doc_id: DocumentId,
    pub error: String,
}

/// Per-document outcome of a batch add; partial success is normal
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AddReport {
    pub added: Vec<DocumentId>,
    pub failed: Vec<AddFailure>,
}

impl AddReport {
    pub fn success_count(&self) -> usize {
        self.added.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn total(&self) -> usize {
        self.added.len() + self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}
