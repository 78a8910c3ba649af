use tracing::info;

use crate::autocomplete::Autocomplete;
use crate::config::ScoringConfig;
use crate::lexicon::Lexicon;
use crate::persistence::DocStore;
use crate::Result;

/// First build pass: assign word ids and fill the autocomplete trie.
///
/// Title tokens of questions and body tokens get weight 1 per occurrence,
/// every tag gets `tag_vocab_weight`. Returns the number of documents seen.
pub fn build_vocabulary(
    docs: &DocStore,
    lexicon: &Lexicon,
    trie: &mut Autocomplete,
    scoring: &ScoringConfig,
) -> Result<usize> {
    let visited = docs.scan_documents(|_, doc| {
        let mut tokens = Vec::new();
        if doc.is_question() {
            tokens.extend(lexicon.tokenize(&doc.title));
        }
        tokens.extend(lexicon.tokenize(&doc.plain_body()));
        for token in tokens {
            if lexicon.add_word(&token) != 0 {
                trie.add_word(&token, 1);
            }
        }
        for tag in &doc.tags {
            if lexicon.add_word(tag) != 0 {
                trie.add_word(tag, scoring.tag_vocab_weight);
            }
        }
        Ok(())
    })?;

    info!(
        "Vocabulary complete: {} documents, {} words, {} autocomplete entries",
        visited,
        lexicon.len(),
        trie.len()
    );
    Ok(visited)
}
