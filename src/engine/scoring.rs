//! Ranking helpers for the query engine

use std::cmp::Ordering;
use std::collections::HashMap;

use ordered_float::OrderedFloat;

use crate::config::ScoringConfig;
use crate::models::{Document, DocumentId, Posting};

/// Smallest weight a word can get, however common it is
pub const MIN_IDF: f64 = 0.01;

/// Rarity weight of a word.
///
/// `log10(corpus / (disk + delta + 1))`, floored at [`MIN_IDF`].
pub fn idf(corpus_size: u64, disk_count: usize, delta_count: usize) -> f64 {
    let matches = (disk_count + delta_count + 1) as f64;
    let corpus = corpus_size.max(1) as f64;
    (corpus / matches).log10().max(MIN_IDF)
}

/// Disk postings with delta postings layered on top.
///
/// A delta posting replaces the disk posting of the same document.
pub fn overlay_delta(disk: Vec<Posting>, delta: &[Posting]) -> Vec<Posting> {
    if delta.is_empty() {
        return disk;
    }
    let mut merged: Vec<Posting> = disk
        .into_iter()
        .filter(|p| !delta.iter().any(|d| d.doc_id == p.doc_id))
        .collect();
    merged.extend_from_slice(delta);
    merged
}

/// Add one token's weighted postings into the per-document accumulator
pub fn accumulate(scores: &mut HashMap<DocumentId, f64>, contribution: &[(DocumentId, f64)]) {
    for (doc_id, score) in contribution {
        *scores.entry(*doc_id).or_insert(0.0) += score;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoredDoc {
    pub doc_id: DocumentId,
    pub score: OrderedFloat<f64>,
}

impl ScoredDoc {
    pub fn new(doc_id: DocumentId, score: f64) -> Self {
        Self {
            doc_id,
            score: OrderedFloat(score),
        }
    }
}

impl Ord for ScoredDoc {
    /// Higher score first, then lower document id
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

impl PartialOrd for ScoredDoc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// All candidates, best first
pub fn rank(scores: HashMap<DocumentId, f64>) -> Vec<ScoredDoc> {
    let mut ranked: Vec<ScoredDoc> = scores
        .into_iter()
        .map(|(doc_id, score)| ScoredDoc::new(doc_id, score))
        .collect();
    ranked.sort();
    ranked
}

/// Bonus from the full document: exact title, title containing every token, popularity.
///
/// `title_tokens` and `tokens` are the distinct normalized tokens of the title
/// and the query; the title matches exactly when the two lists are equal.
pub fn rerank_bonus(
    doc: &Document,
    title_tokens: &[String],
    tokens: &[String],
    scoring: &ScoringConfig,
) -> f64 {
    let title = doc.title.trim().to_lowercase();
    let mut bonus = 0.0;

    if !title_tokens.is_empty() && title_tokens == tokens {
        bonus += scoring.exact_title_bonus;
    }
    if !title.is_empty() && !tokens.is_empty() && tokens.iter().all(|t| title.contains(t.as_str())) {
        bonus += scoring.title_tokens_bonus;
    }
    bonus += (doc.score.max(0) as f64 + 1.0).log10() * scoring.popularity_weight;
    bonus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idf_rarer_is_higher() {
        let rare = idf(1_000_000, 1, 0);
        let common = idf(1_000_000, 10_000, 5);
        assert!(rare > common);
        assert!((idf(1000, 9, 0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_idf_floor() {
        assert_eq!(idf(10, 500, 0), MIN_IDF);
        assert_eq!(idf(0, 0, 0), MIN_IDF);
    }

    #[test]
    fn test_overlay_delta_shadows_disk() {
        let disk = vec![Posting::new(1, 20), Posting::new(2, 5)];
        let delta = vec![Posting::new(2, 11), Posting::new(3, 1)];
        let merged = overlay_delta(disk, &delta);
        assert_eq!(
            merged,
            vec![Posting::new(1, 20), Posting::new(2, 11), Posting::new(3, 1)]
        );
    }

    #[test]
    fn test_rank_orders_by_score_then_id() {
        let mut scores = HashMap::new();
        accumulate(&mut scores, &[(4, 1.0), (2, 3.0), (9, 3.0)]);
        accumulate(&mut scores, &[(4, 5.0)]);
        let ranked: Vec<DocumentId> = rank(scores).into_iter().map(|d| d.doc_id).collect();
        assert_eq!(ranked, vec![4, 2, 9]);
    }

    #[test]
    fn test_rerank_bonus() {
        let scoring = ScoringConfig::default();
        let words = |list: &[&str]| list.iter().map(|w| w.to_string()).collect::<Vec<_>>();
        let tokens = words(&["ubuntu", "install"]);

        let exact = Document::question(1, 1, "Ubuntu Install", "").with_score(9);
        let bonus = rerank_bonus(&exact, &tokens, &tokens, &scoring);
        assert!((bonus - (1000.0 + 100.0 + 5.0)).abs() < 1e-9);

        // Same words, different order: every token present but not an exact title
        let reordered = Document::question(1, 4, "Install Ubuntu", "");
        let title_tokens = words(&["install", "ubuntu"]);
        assert_eq!(rerank_bonus(&reordered, &title_tokens, &tokens, &scoring), 100.0);

        let partial = Document::question(1, 2, "Install guide", "");
        let title_tokens = words(&["install", "guide"]);
        assert_eq!(rerank_bonus(&partial, &title_tokens, &tokens, &scoring), 0.0);

        let negative = Document::question(1, 3, "", "").with_score(-4);
        assert_eq!(rerank_bonus(&negative, &[], &tokens, &scoring), 0.0);
    }
}
