use std::collections::HashSet;

use stop_words::{get, LANGUAGE};

/// Case-insensitive stop-word set
#[derive(Clone, Debug)]
pub struct StopWordFilter {
    words: HashSet<String>,
}

impl StopWordFilter {
    /// Default English list
    pub fn english() -> Self {
        Self {
            words: get(LANGUAGE::English)
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect(),
        }
    }

    /// Custom list replacing the default one
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        self.words.contains(&word.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for StopWordFilter {
    fn default() -> Self {
        Self::english()
    }
}
