use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashMap;

use super::stopwords::StopWordFilter;
use crate::config::TokenizerConfig;

/// Characters stripped from both ends of every token (whitespace included).
pub const TRIM_CHARS: &[char] = &[
    '.', ',', '(', ')', '"', '\'', '?', ':', ';', '[', ']', '&', '^', '%', '$', ' ', '\n', '\r',
    '\t',
];

/// Lowercase a raw token and strip leading/trailing punctuation.
pub fn normalize(token: &str) -> String {
    token.trim_matches(TRIM_CHARS).to_lowercase()
}

/// Whitespace tokenizer with punctuation normalization.
///
/// Stop-word removal and stemming are off unless the configuration enables them.
pub struct Tokenizer {
    config: TokenizerConfig,
    stemmer: Option<Stemmer>,
    stopwords: Option<StopWordFilter>,
}

impl Tokenizer {
    /// Create a new tokenizer from configuration
    pub fn new(config: &TokenizerConfig) -> Self {
        let stemmer = if config.stem {
            Some(Stemmer::create(Algorithm::English))
        } else {
            None
        };

        let stopwords = if config.remove_stopwords {
            Some(StopWordFilter::english())
        } else {
            None
        };

        Self {
            config: config.clone(),
            stemmer,
            stopwords,
        }
    }

    /// Replace the stop-word list (implies stop-word removal)
    pub fn with_stopwords(mut self, filter: StopWordFilter) -> Self {
        self.config.remove_stopwords = true;
        self.stopwords = Some(filter);
        self
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    /// Normalize one token, applying the optional filters; `None` if it is dropped.
    pub fn normalize_token(&self, raw: &str) -> Option<String> {
        let token = normalize(raw);
        if token.is_empty() {
            return None;
        }
        let chars = token.chars().count();
        if chars < self.config.min_token_length || chars > self.config.max_token_length {
            return None;
        }
        if let Some(stopwords) = &self.stopwords {
            if stopwords.is_stop_word(&token) {
                return None;
            }
        }
        match &self.stemmer {
            Some(stemmer) => Some(stemmer.stem(&token).into_owned()),
            None => Some(token),
        }
    }

    /// Tokenize text into an ordered vector of normalized terms
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace()
            .filter_map(|raw| self.normalize_token(raw))
            .collect()
    }

    /// Compute term frequencies for a tokenized text
    pub fn compute_term_frequencies(&self, text: &str) -> HashMap<String, u32> {
        let mut freq = HashMap::new();
        for token in self.tokenize(text) {
            *freq.entry(token).or_insert(0) += 1;
        }
        freq
    }

    /// Distinct tokens in first-occurrence order
    pub fn unique_terms(&self, text: &str) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.tokenize(text)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(&TokenizerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("(Hello!)"), "hello!");
        assert_eq!(normalize("\"Ubuntu's\""), "ubuntu's");
        assert_eq!(normalize("...;"), "");
        assert_eq!(normalize("C++"), "c++");
    }

    #[test]
    fn test_basic_tokenization() {
        let tokenizer = Tokenizer::default();
        let tokens = tokenizer.tokenize("How to install Ubuntu?  It's   (easy).");
        assert_eq!(
            tokens,
            vec!["how", "to", "install", "ubuntu", "it's", "easy"]
        );
    }

    #[test]
    fn test_empty_tokens_filtered() {
        let tokenizer = Tokenizer::default();
        assert!(tokenizer.tokenize(" ... , ; ").is_empty());
        assert!(tokenizer.tokenize("").is_empty());
    }

    #[test]
    fn test_default_keeps_stopwords() {
        let tokenizer = Tokenizer::default();
        let tokens = tokenizer.tokenize("the system");
        assert_eq!(tokens, vec!["the", "system"]);
    }

    #[test]
    fn test_stopword_removal() {
        let config = TokenizerConfig {
            remove_stopwords: true,
            ..Default::default()
        };
        let tokenizer = Tokenizer::new(&config);
        let tokens = tokenizer.tokenize("This is a document about the system");

        assert!(!tokens.contains(&"this".to_string()));
        assert!(!tokens.contains(&"the".to_string()));
        assert!(tokens.contains(&"document".to_string()));
    }

    #[test]
    fn test_custom_stopwords() {
        let tokenizer = Tokenizer::default().with_stopwords(StopWordFilter::from_words(["ubuntu"]));
        assert_eq!(tokenizer.tokenize("Ubuntu rocks"), vec!["rocks"]);
    }

    #[test]
    fn test_stemming() {
        let config = TokenizerConfig {
            stem: true,
            ..Default::default()
        };
        let tokenizer = Tokenizer::new(&config);
        let tokens = tokenizer.tokenize("running runs");
        assert!(tokens.iter().all(|t| t.starts_with("run")));
    }

    #[test]
    fn test_min_max_token_length() {
        let config = TokenizerConfig {
            min_token_length: 3,
            max_token_length: 5,
            ..Default::default()
        };
        let tokenizer = Tokenizer::new(&config);
        let tokens = tokenizer.tokenize("a ab abc abcd abcde abcdef");
        assert_eq!(tokens, vec!["abc", "abcd", "abcde"]);
    }

    #[test]
    fn test_term_frequencies_and_unique_terms() {
        let tokenizer = Tokenizer::default();
        let freq = tokenizer.compute_term_frequencies("apple Apple banana");
        assert_eq!(freq.get("apple"), Some(&2));
        assert_eq!(freq.get("banana"), Some(&1));

        assert_eq!(
            tokenizer.unique_terms("b a b c a"),
            vec!["b", "a", "c"]
        );
    }
}
