//! Bidirectional word <-> id mapping.
//!
//! Ids are dense and assigned in insertion order starting at 1; id 0 means
//! "not found" and never maps to a word. The file form is one word per line,
//! the 1-based line number being the id.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::models::WordId;
use crate::tokenizer::{normalize, Tokenizer};
use crate::Result;

#[derive(Default)]
struct LexiconInner {
    word_to_id: HashMap<String, WordId>,
    /// Index 0 is the reserved empty slot
    id_to_word: Vec<String>,
}

impl LexiconInner {
    fn new() -> Self {
        Self {
            word_to_id: HashMap::new(),
            id_to_word: vec![String::new()],
        }
    }

    fn push(&mut self, word: String) -> WordId {
        let id = self.id_to_word.len() as WordId;
        self.word_to_id.entry(word.clone()).or_insert(id);
        self.id_to_word.push(word);
        id
    }
}

/// Thread-safe lexicon shared by the build pipeline and the query engine
pub struct Lexicon {
    tokenizer: Tokenizer,
    inner: RwLock<LexiconInner>,
}

impl Lexicon {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self {
            tokenizer,
            inner: RwLock::new(LexiconInner::new()),
        }
    }

    /// Id of `word` after normalization, assigning the next id if it is new.
    ///
    /// Returns 0 when the word normalizes to nothing.
    pub fn add_word(&self, word: &str) -> WordId {
        let word = normalize(word);
        if word.is_empty() {
            return 0;
        }
        if let Some(id) = self.inner.read().word_to_id.get(&word) {
            return *id;
        }
        let mut inner = self.inner.write();
        if let Some(id) = inner.word_to_id.get(&word) {
            return *id;
        }
        inner.push(word)
    }

    /// Word for `id`, or an empty string for 0 and unknown ids
    pub fn get_word(&self, id: WordId) -> String {
        if id == 0 {
            return String::new();
        }
        self.inner
            .read()
            .id_to_word
            .get(id as usize)
            .cloned()
            .unwrap_or_default()
    }

    /// Id of `word` after normalization, or 0
    pub fn get_word_id(&self, word: &str) -> WordId {
        let word = normalize(word);
        self.inner
            .read()
            .word_to_id
            .get(&word)
            .copied()
            .unwrap_or(0)
    }

    pub fn normalize(&self, token: &str) -> String {
        normalize(token)
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.tokenizer.tokenize(text)
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Number of known words
    pub fn len(&self) -> usize {
        self.inner.read().id_to_word.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the word list atomically (`<path>.tmp` then rename).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = path.with_extension("tmp");
        {
            let inner = self.inner.read();
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            for word in inner.id_to_word.iter().skip(1) {
                writeln!(writer, "{}", word)?;
            }
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load a word list; the line number is the id. A missing file loads nothing.
    pub fn load<P: AsRef<Path>>(path: P, tokenizer: Tokenizer) -> Result<Self> {
        let lexicon = Self::new(tokenizer);
        let path = path.as_ref();
        if !path.exists() {
            warn!("Lexicon file {:?} not found, starting empty", path);
            return Ok(lexicon);
        }

        let reader = BufReader::new(File::open(path)?);
        {
            let mut inner = lexicon.inner.write();
            for line in reader.lines() {
                let line = line?;
                let word = line.trim_end_matches('\r').to_string();
                if inner.word_to_id.contains_key(&word) {
                    warn!("Duplicate lexicon entry {:?} at id {}", word, inner.id_to_word.len());
                }
                inner.push(word);
            }
        }
        info!("Loaded lexicon from {:?}: {} words", path, lexicon.len());
        Ok(lexicon)
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new(Tokenizer::default())
    }
}
