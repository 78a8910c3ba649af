//! In-memory postings for documents added since the last flush.

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::models::{sort_by_score, DocumentId, Posting, WordId};

/// Concurrent word id -> postings map.
///
/// Each list has its own lock. A writer holds one list lock at a time, so
/// adding a document touches its words one after another.
#[derive(Default)]
pub struct DeltaIndex {
    lists: DashMap<WordId, Mutex<Vec<Posting>>>,
}

impl DeltaIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the posting of `posting.doc_id` for `word_id`, replacing any earlier one.
    pub fn upsert(&self, word_id: WordId, posting: Posting) {
        if let Some(list) = self.lists.get(&word_id) {
            replace_posting(&mut list.lock(), posting);
            return;
        }
        let list = self.lists.entry(word_id).or_default();
        replace_posting(&mut list.lock(), posting);
    }

    /// Copy of the postings for `word_id`, score descending
    pub fn postings(&self, word_id: WordId) -> Vec<Posting> {
        match self.lists.get(&word_id) {
            Some(list) => {
                let mut postings = list.lock().clone();
                sort_by_score(&mut postings);
                postings
            }
            None => Vec::new(),
        }
    }

    /// Copy of every non-empty list, words ascending
    pub fn snapshot(&self) -> Vec<(WordId, Vec<Posting>)> {
        let mut entries: Vec<(WordId, Vec<Posting>)> = self
            .lists
            .iter()
            .filter_map(|entry| {
                let postings = entry.value().lock().clone();
                (!postings.is_empty()).then(|| (*entry.key(), postings))
            })
            .collect();
        entries.sort_by_key(|(word_id, _)| *word_id);
        entries
    }

    /// Drop postings that were written to disk.
    ///
    /// A posting is only removed if it still equals the flushed one; a
    /// document re-added with a different score after the snapshot stays.
    /// Returns the number of postings removed.
    pub fn remove_flushed(&self, word_id: WordId, flushed: &[Posting]) -> usize {
        let removed = match self.lists.get(&word_id) {
            Some(list) => {
                let mut postings = list.lock();
                let before = postings.len();
                postings.retain(|p| !flushed.contains(p));
                before - postings.len()
            }
            None => return 0,
        };
        self.lists.remove_if(&word_id, |_, list| list.lock().is_empty());
        removed
    }

    /// Posting of one document for one word, if present
    pub fn posting_for(&self, word_id: WordId, doc_id: DocumentId) -> Option<Posting> {
        let list = self.lists.get(&word_id)?;
        let postings = list.lock();
        postings.iter().find(|p| p.doc_id == doc_id).copied()
    }

    /// Number of words with pending postings
    pub fn word_count(&self) -> usize {
        self.lists.len()
    }

    pub fn posting_count(&self) -> usize {
        self.lists
            .iter()
            .map(|entry| {
                let len = entry.value().lock().len();
                len
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.posting_count() == 0
    }

    pub fn clear(&self) {
        self.lists.clear();
    }
}

fn replace_posting(postings: &mut Vec<Posting>, posting: Posting) {
    match postings.iter_mut().find(|p| p.doc_id == posting.doc_id) {
        Some(existing) => existing.score = posting.score,
        None => postings.push(posting),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_upsert_replaces_same_document() {
        let delta = DeltaIndex::new();
        delta.upsert(1, Posting::new(10, 5));
        delta.upsert(1, Posting::new(11, 7));
        delta.upsert(1, Posting::new(10, 3));

        assert_eq!(delta.postings(1), vec![Posting::new(11, 7), Posting::new(10, 3)]);
        assert_eq!(delta.posting_for(1, 10), Some(Posting::new(10, 3)));
        assert_eq!(delta.word_count(), 1);
        assert_eq!(delta.posting_count(), 2);
    }

    #[test]
    fn test_remove_flushed_keeps_newer_postings() {
        let delta = DeltaIndex::new();
        delta.upsert(2, Posting::new(1, 4));
        delta.upsert(2, Posting::new(2, 6));
        let snapshot = delta.snapshot();
        assert_eq!(snapshot.len(), 1);

        // Re-added after the snapshot with a new score
        delta.upsert(2, Posting::new(2, 9));

        let removed = delta.remove_flushed(2, &snapshot[0].1);
        assert_eq!(removed, 1);
        assert_eq!(delta.postings(2), vec![Posting::new(2, 9)]);

        delta.remove_flushed(2, &[Posting::new(2, 9)]);
        assert!(delta.is_empty());
        assert_eq!(delta.word_count(), 0);
    }

    #[test]
    fn test_snapshot_sorted_by_word() {
        let delta = DeltaIndex::new();
        for word in [9, 3, 5] {
            delta.upsert(word, Posting::new(1, 1));
        }
        let words: Vec<WordId> = delta.snapshot().into_iter().map(|(w, _)| w).collect();
        assert_eq!(words, vec![3, 5, 9]);
    }

    #[test]
    fn test_concurrent_upserts() {
        let delta = Arc::new(DeltaIndex::new());
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let delta = delta.clone();
                thread::spawn(move || {
                    for doc in 0..100u32 {
                        delta.upsert(doc % 10, Posting::new(t * 1000 + doc, 1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(delta.word_count(), 10);
        assert_eq!(delta.posting_count(), 800);
    }
}
