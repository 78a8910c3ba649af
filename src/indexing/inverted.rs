use std::collections::HashMap;

use tracing::{info, warn};

use super::barrel::{write_barrel, BarrelContents};
use super::field::occurrence_score;
use super::forward::{decode_forward, ForwardEntry};
use crate::config::{EngineConfig, ScoringConfig};
use crate::models::{sort_by_score, CompoundKey, Posting, WordId};
use crate::persistence::IsamStore;
use crate::Result;

/// Per-word score of one document: the sum of its occurrence scores.
pub fn score_document(entries: &[ForwardEntry], scoring: &ScoringConfig) -> HashMap<WordId, i32> {
    let mut scores: HashMap<WordId, i32> = HashMap::new();
    for entry in entries {
        let score = scores.entry(entry.word_id).or_insert(0);
        *score = score.saturating_add(occurrence_score(entry.mask, scoring));
    }
    scores
}

#[derive(Clone, Debug, Default)]
pub struct InvertedStats {
    pub documents: usize,
    pub words: usize,
    pub postings: usize,
    pub barrels: u32,
}

/// Builds every barrel from the forward index in one pass
pub struct InvertedIndexBuilder<'a> {
    config: &'a EngineConfig,
}

impl<'a> InvertedIndexBuilder<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Scan `forward` and write `barrel_0.dat` .. `barrel_{n-1}.dat`.
    ///
    /// Every barrel file is written, empty ones included, so a fresh build
    /// always replaces whatever an earlier build left behind.
    pub fn build(&self, forward: &IsamStore) -> Result<InvertedStats> {
        let count = self.config.barrel_count();
        let mut barrels: Vec<BarrelContents> = (0..count).map(|_| BarrelContents::new()).collect();
        let mut stats = InvertedStats {
            barrels: count,
            ..Default::default()
        };

        forward.reset_cursor();
        while let Some((raw_key, bytes)) = forward.next()? {
            let doc_id = CompoundKey::from_storage_key(raw_key).primary_id;
            let text = match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    warn!("Forward record {} is not UTF-8, skipping", doc_id);
                    continue;
                }
            };
            let scores = score_document(&decode_forward(&text), &self.config.scoring);
            for (word_id, score) in scores {
                barrels[(word_id % count) as usize]
                    .entry(word_id)
                    .or_default()
                    .push(Posting::new(doc_id, score));
                stats.postings += 1;
            }
            stats.documents += 1;
        }

        for (i, contents) in barrels.iter_mut().enumerate() {
            for postings in contents.values_mut() {
                sort_by_score(postings);
            }
            stats.words += contents.len();
            write_barrel(&self.config.barrel_path(i as u32), contents)?;
            info!("Barrel {}: {} words", i, contents.len());
        }

        info!(
            "Inverted index complete: {} documents, {} words, {} postings across {} barrels",
            stats.documents, stats.words, stats.postings, count
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::barrel::read_barrel;
    use crate::indexing::field::FieldMask;
    use crate::indexing::forward::encode_forward;
    use tempfile::TempDir;

    #[test]
    fn test_score_document_sums_once_per_word() {
        let scoring = ScoringConfig::default();
        let entries = vec![
            ForwardEntry::new(4, FieldMask::TITLE),
            ForwardEntry::new(4, FieldMask::BODY),
            ForwardEntry::new(4, FieldMask::BODY),
            ForwardEntry::new(6, FieldMask::TAG),
        ];
        let scores = score_document(&entries, &scoring);
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[&4], 12);
        assert_eq!(scores[&6], 15);
    }

    #[test]
    fn test_build_writes_all_barrels() {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig::new(tmp.path()).with_barrels(3);
        let forward = IsamStore::open(config.forward_index_base()).unwrap();

        let doc_a = vec![
            ForwardEntry::new(3, FieldMask::TITLE),
            ForwardEntry::new(3, FieldMask::BODY),
            ForwardEntry::new(3, FieldMask::BODY),
        ];
        let doc_b = vec![ForwardEntry::new(3, FieldMask::BODY)];
        forward
            .insert(
                CompoundKey::post(1, 100).to_storage_key(),
                encode_forward(&doc_a).as_bytes(),
            )
            .unwrap();
        forward
            .insert(
                CompoundKey::post(1, 200).to_storage_key(),
                encode_forward(&doc_b).as_bytes(),
            )
            .unwrap();

        let stats = InvertedIndexBuilder::new(&config).build(&forward).unwrap();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.words, 1);
        assert_eq!(stats.postings, 2);

        for i in 0..3 {
            assert!(config.barrel_path(i).exists());
        }
        let barrel = read_barrel(&config.barrel_path(0)).unwrap();
        assert_eq!(barrel[&3], vec![Posting::new(100, 12), Posting::new(200, 1)]);
        assert!(read_barrel(&config.barrel_path(1)).unwrap().is_empty());
    }
}
