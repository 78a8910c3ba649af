use serde::{Deserialize, Serialize};

use super::document::DocumentId;

/// Dense lexicon identifier; 0 means "not found"
pub type WordId = u32;

/// One document's relevance contribution to a word
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocumentId,
    pub score: i32,
}

impl Posting {
    pub fn new(doc_id: DocumentId, score: i32) -> Self {
        Self { doc_id, score }
    }
}

/// Sort postings by score descending; ties keep their relative order.
pub fn sort_by_score(postings: &mut [Posting]) {
    postings.sort_by(|a, b| b.score.cmp(&a.score));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_by_score_is_stable() {
        let mut postings = vec![
            Posting::new(1, 3),
            Posting::new(2, 9),
            Posting::new(3, 3),
            Posting::new(4, 5),
        ];
        sort_by_score(&mut postings);
        let ids: Vec<u32> = postings.iter().map(|p| p.doc_id).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);
    }
}
