//! Weighted prefix trie for query completion.
//!
//! Nodes live in one arena vector and children are kept in sorted maps, so
//! enumeration is deterministic and uses an explicit stack instead of recursion.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::tokenizer::normalize;
use crate::Result;

const ROOT: usize = 0;

#[derive(Debug, Default)]
struct TrieNode {
    children: BTreeMap<char, usize>,
    /// Accumulated weight; a node is terminal iff this is non-zero
    weight: u64,
}

/// Prefix trie over normalized words
#[derive(Debug)]
pub struct Autocomplete {
    nodes: Vec<TrieNode>,
    words: usize,
}

impl Autocomplete {
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
            words: 0,
        }
    }

    /// Add `weight` to `word`, inserting it if needed. Empty words and zero weights are ignored.
    pub fn add_word(&mut self, word: &str, weight: u32) {
        let word = normalize(word);
        if word.is_empty() || weight == 0 {
            return;
        }
        let mut current = ROOT;
        for c in word.chars() {
            current = match self.nodes[current].children.get(&c) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[current].children.insert(c, child);
                    child
                }
            };
        }
        let node = &mut self.nodes[current];
        if node.weight == 0 {
            self.words += 1;
        }
        node.weight += weight as u64;
    }

    /// Weight of an exact word, 0 if absent
    pub fn weight(&self, word: &str) -> u64 {
        self.find(&normalize(word))
            .map(|n| self.nodes[n].weight)
            .unwrap_or(0)
    }

    /// Top `limit` completions of `prefix` by weight descending, ties alphabetical.
    pub fn query(&self, prefix: &str, limit: usize) -> Vec<String> {
        let prefix = prefix.trim().to_lowercase();
        if limit == 0 {
            return Vec::new();
        }
        let Some(start) = self.find(&prefix) else {
            return Vec::new();
        };
        let mut found = self.collect(start, &prefix);
        found.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        found.into_iter().take(limit).map(|(w, _)| w).collect()
    }

    /// Number of distinct words
    pub fn len(&self) -> usize {
        self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words == 0
    }

    /// Write `word|weight` lines atomically.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            for (word, weight) in self.collect(ROOT, "") {
                writeln!(writer, "{}|{}", word, weight)?;
            }
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Rebuild from a `word|weight` file; malformed lines are skipped.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut trie = Self::new();
        let path = path.as_ref();
        if !path.exists() {
            warn!("Vocabulary file {:?} not found, autocomplete starts empty", path);
            return Ok(trie);
        }
        let reader = BufReader::new(File::open(path)?);
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let parsed = line
                .rsplit_once('|')
                .and_then(|(word, weight)| weight.trim().parse::<u32>().ok().map(|w| (word, w)));
            match parsed {
                Some((word, weight)) => trie.add_word(word, weight),
                None => warn!("Skipping malformed vocabulary line {}: {:?}", line_no + 1, line),
            }
        }
        info!("Loaded vocabulary from {:?}: {} words", path, trie.len());
        Ok(trie)
    }

    fn find(&self, prefix: &str) -> Option<usize> {
        let mut current = ROOT;
        for c in prefix.chars() {
            current = *self.nodes[current].children.get(&c)?;
        }
        Some(current)
    }

    /// Every terminal word under `start`, iterative depth-first over one shared path buffer.
    fn collect(&self, start: usize, prefix: &str) -> Vec<(String, u64)> {
        let mut out = Vec::new();
        let mut path: Vec<char> = prefix.chars().collect();
        let mut stack: Vec<(usize, usize, Option<char>)> = vec![(start, path.len(), None)];
        while let Some((node, depth, edge)) = stack.pop() {
            path.truncate(depth);
            if let Some(c) = edge {
                path.push(c);
            }
            let node = &self.nodes[node];
            if node.weight > 0 {
                out.push((path.iter().collect(), node.weight));
            }
            for (c, child) in node.children.iter().rev() {
                stack.push((*child, path.len(), Some(*c)));
            }
        }
        out
    }
}

impl Default for Autocomplete {
    fn default() -> Self {
        Self::new()
    }
}
