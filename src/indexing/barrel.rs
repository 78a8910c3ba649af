//! Barrel files: the inverted index sharded by `word_id % num_barrels`.
//!
//! Each barrel is UTF-8 text, one line per word:
//!
//! ```text
//! <wordId>|<docId>:<score>,<docId>:<score>,...
//! ```
//!
//! Postings on a line are sorted by score descending. Lines are sorted by
//! word id when written by this crate, but readers accept any order.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::models::{sort_by_score, Posting, WordId};
use crate::Result;

/// Parsed barrel: word id to postings, words ascending
pub type BarrelContents = BTreeMap<WordId, Vec<Posting>>;

pub fn format_line(word_id: WordId, postings: &[Posting]) -> String {
    let mut line = format!("{}|", word_id);
    for (i, p) in postings.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        line.push_str(&format!("{}:{}", p.doc_id, p.score));
    }
    line
}

/// Parse one barrel line.
///
/// Returns `None` when the word id is unreadable. Posting segments that do
/// not parse are skipped, the rest of the line is kept.
pub fn parse_line(line: &str) -> Option<(WordId, Vec<Posting>)> {
    let (word, rest) = line.trim_end().split_once('|')?;
    let word_id = word.trim().parse::<WordId>().ok()?;
    let postings = rest
        .split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|segment| {
            let (doc, score) = segment.split_once(':')?;
            Some(Posting::new(doc.parse().ok()?, score.parse().ok()?))
        })
        .collect();
    Some((word_id, postings))
}

/// Sum scores of repeated documents, then sort by score descending.
fn normalize_postings(postings: &mut Vec<Posting>) {
    let mut seen: std::collections::HashMap<u32, usize> = std::collections::HashMap::new();
    let mut merged: Vec<Posting> = Vec::with_capacity(postings.len());
    for p in postings.drain(..) {
        match seen.get(&p.doc_id) {
            Some(&pos) => merged[pos].score = merged[pos].score.saturating_add(p.score),
            None => {
                seen.insert(p.doc_id, merged.len());
                merged.push(p);
            }
        }
    }
    sort_by_score(&mut merged);
    *postings = merged;
}

/// Load a whole barrel. A missing file is an empty barrel.
pub fn read_barrel(path: &Path) -> Result<BarrelContents> {
    let mut contents = BarrelContents::new();
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(contents),
        Err(e) => return Err(e.into()),
    };

    let mut duplicated = false;
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Some((word_id, postings)) => {
                let slot = contents.entry(word_id).or_default();
                duplicated |= !slot.is_empty();
                slot.extend(postings);
            }
            None => warn!("{}:{}: skipping malformed barrel line", path.display(), n + 1),
        }
    }

    for postings in contents.values_mut() {
        normalize_postings(postings);
    }
    if duplicated {
        debug!("{}: merged repeated word lines", path.display());
    }
    Ok(contents)
}

/// Write `contents` to `path` atomically (`<path>.tmp`, fsync, rename).
pub fn write_barrel(path: &Path, contents: &BarrelContents) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        for (word_id, postings) in contents {
            writeln!(writer, "{}", format_line(*word_id, postings))?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Stream a barrel looking for a single word's postings.
pub fn scan_word(path: &Path, word_id: WordId) -> Result<Vec<Posting>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let prefix = format!("{}|", word_id);
    let mut found = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if !line.starts_with(&prefix) {
            continue;
        }
        if let Some((_, postings)) = parse_line(&line) {
            found.extend(postings);
        }
    }
    normalize_postings(&mut found);
    Ok(found)
}

/// Fold newer postings for `word_id` into `contents`.
///
/// A newer posting replaces the existing one for the same document; the
/// list is re-sorted afterwards.
pub fn merge_replacing(contents: &mut BarrelContents, word_id: WordId, newer: &[Posting]) {
    let postings = contents.entry(word_id).or_default();
    for update in newer {
        match postings.iter_mut().find(|p| p.doc_id == update.doc_id) {
            Some(existing) => existing.score = update.score,
            None => postings.push(*update),
        }
    }
    sort_by_score(postings);
}

/// All barrels of one index directory.
///
/// When barrel caching is on, each barrel is parsed once and then served
/// from an in-memory snapshot that is swapped whenever the barrel is rewritten.
pub struct BarrelSet {
    paths: Vec<PathBuf>,
    snapshots: Vec<ArcSwapOption<BarrelContents>>,
    /// Serializes loads and rewrites of one barrel
    locks: Vec<Mutex<()>>,
    cache_barrels: bool,
}

impl BarrelSet {
    pub fn new(config: &EngineConfig) -> Self {
        let count = config.barrel_count();
        Self {
            paths: (0..count).map(|i| config.barrel_path(i)).collect(),
            snapshots: (0..count).map(|_| ArcSwapOption::empty()).collect(),
            locks: (0..count).map(|_| Mutex::new(())).collect(),
            cache_barrels: config.cache_barrels,
        }
    }

    pub fn count(&self) -> u32 {
        self.paths.len() as u32
    }

    pub fn barrel_for(&self, word_id: WordId) -> u32 {
        word_id % self.count()
    }

    pub fn path(&self, barrel: u32) -> &Path {
        &self.paths[barrel as usize]
    }

    /// On-disk postings for one word, score descending
    pub fn postings(&self, word_id: WordId) -> Result<Vec<Posting>> {
        let barrel = self.barrel_for(word_id);
        if !self.cache_barrels {
            return scan_word(self.path(barrel), word_id);
        }
        let contents = self.snapshot(barrel)?;
        Ok(contents.get(&word_id).cloned().unwrap_or_default())
    }

    /// Current parsed contents of a barrel, loading it on first use
    pub fn snapshot(&self, barrel: u32) -> Result<Arc<BarrelContents>> {
        let slot = &self.snapshots[barrel as usize];
        if let Some(contents) = slot.load_full() {
            return Ok(contents);
        }
        let _guard = self.locks[barrel as usize].lock();
        if let Some(contents) = slot.load_full() {
            return Ok(contents);
        }
        let contents = Arc::new(read_barrel(self.path(barrel))?);
        debug!(
            "Loaded barrel {} ({} words) from {}",
            barrel,
            contents.len(),
            self.path(barrel).display()
        );
        if self.cache_barrels {
            slot.store(Some(contents.clone()));
        }
        Ok(contents)
    }

    /// Merge newer postings into one barrel and rewrite it atomically.
    ///
    /// On failure the file and the in-memory snapshot are left untouched.
    pub fn merge_into(&self, barrel: u32, updates: &[(WordId, Vec<Posting>)]) -> Result<usize> {
        let _guard = self.locks[barrel as usize].lock();
        let path = self.path(barrel);
        let mut contents = match self.snapshots[barrel as usize].load_full() {
            Some(current) => (*current).clone(),
            None => read_barrel(path)?,
        };
        let mut merged = 0;
        for (word_id, postings) in updates {
            merge_replacing(&mut contents, *word_id, postings);
            merged += postings.len();
        }
        write_barrel(path, &contents)?;
        if self.cache_barrels {
            self.snapshots[barrel as usize].store(Some(Arc::new(contents)));
        }
        Ok(merged)
    }

    /// Forget cached snapshots; the next lookup re-reads from disk
    pub fn invalidate(&self) {
        for slot in &self.snapshots {
            slot.store(None);
        }
    }
}
