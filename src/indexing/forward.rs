//! Forward index: per document, the ordered `(word id, field mask)` occurrences.
//!
//! Records are stored as UTF-8 text `"<wordId>,<mask> <wordId>,<mask> ..."`
//! under the same key as the source document.

use tracing::{debug, info};

use super::field::FieldMask;
use crate::lexicon::Lexicon;
use crate::models::{Document, WordId};
use crate::persistence::{DocStore, IsamStore};
use crate::Result;

/// Records buffered before each batch insert
const BATCH_SIZE: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForwardEntry {
    pub word_id: WordId,
    pub mask: FieldMask,
}

impl ForwardEntry {
    pub fn new(word_id: WordId, mask: FieldMask) -> Self {
        Self { word_id, mask }
    }
}

pub fn encode_forward(entries: &[ForwardEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{},{}", e.word_id, e.mask.bits()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a forward record; malformed segments and unknown mask bits are dropped.
pub fn decode_forward(data: &str) -> Vec<ForwardEntry> {
    data.split_whitespace()
        .filter_map(|segment| {
            let (word, mask) = segment.split_once(',')?;
            let word_id = word.parse::<WordId>().ok()?;
            let mask = FieldMask::from_bits(mask.parse::<u8>().ok()?)?;
            Some(ForwardEntry::new(word_id, mask))
        })
        .collect()
}

#[derive(Clone, Debug, Default)]
pub struct ForwardStats {
    pub documents: usize,
    pub records_written: usize,
    pub occurrences: usize,
}

/// Turns stored documents into forward-index records
pub struct ForwardIndexBuilder<'a> {
    lexicon: &'a Lexicon,
}

impl<'a> ForwardIndexBuilder<'a> {
    pub fn new(lexicon: &'a Lexicon) -> Self {
        Self { lexicon }
    }

    /// Occurrences for one document. Title tokens only count for questions.
    pub fn entries_for(&self, doc: &Document) -> Vec<ForwardEntry> {
        let mut entries = Vec::new();

        if doc.is_question() && !doc.title.is_empty() {
            for token in self.lexicon.tokenize(&doc.title) {
                self.push(&mut entries, &token, FieldMask::TITLE);
            }
        }

        let body = doc.plain_body();
        if !body.is_empty() {
            for token in self.lexicon.tokenize(&body) {
                self.push(&mut entries, &token, FieldMask::BODY);
            }
        }

        for tag in &doc.tags {
            self.push(&mut entries, tag, FieldMask::TAG);
        }

        entries
    }

    fn push(&self, entries: &mut Vec<ForwardEntry>, token: &str, mask: FieldMask) {
        let word_id = self.lexicon.add_word(token);
        if word_id != 0 {
            entries.push(ForwardEntry::new(word_id, mask));
        }
    }

    /// Scan every document in `docs` and write its forward record into `output`.
    pub fn build(&self, docs: &DocStore, output: &IsamStore) -> Result<ForwardStats> {
        let mut stats = ForwardStats::default();
        let mut batch: Vec<(i64, Vec<u8>)> = Vec::with_capacity(BATCH_SIZE);

        docs.scan_documents(|key, doc| {
            let entries = self.entries_for(&doc);
            stats.documents += 1;
            stats.occurrences += entries.len();
            if entries.is_empty() {
                debug!("Document {} has no indexable tokens", key);
                return Ok(());
            }
            batch.push((key.to_storage_key(), encode_forward(&entries).into_bytes()));

            if batch.len() >= BATCH_SIZE {
                stats.records_written += output.insert_batch(&batch)?;
                batch.clear();
                info!("Forward index: {} documents processed", stats.documents);
            }
            Ok(())
        })?;

        if !batch.is_empty() {
            stats.records_written += output.insert_batch(&batch)?;
        }

        info!(
            "Forward index complete: {} documents, {} records, {} occurrences",
            stats.documents, stats.records_written, stats.occurrences
        );
        Ok(stats)
    }
}
