//! Folding the delta index into the barrel files.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use tracing::{error, info};

use super::QueryEngine;
use crate::error::HaystackError;
use crate::models::{Posting, WordId};
use crate::Result;

/// Outcome of one flush
#[derive(Clone, Debug, Default)]
pub struct FlushReport {
    pub barrels_written: usize,
    pub postings_flushed: usize,
    pub failed_barrels: Vec<u32>,
}

impl FlushReport {
    pub fn is_noop(&self) -> bool {
        self.barrels_written == 0 && self.failed_barrels.is_empty()
    }
}

impl QueryEngine {
    /// Merge every pending delta posting into its barrel.
    ///
    /// Barrels are rewritten one at a time. A barrel's delta postings are
    /// dropped right after its rewrite succeeds; a barrel that fails keeps
    /// them for the next flush, and the first such error is returned once
    /// every barrel has been attempted. Flushing an empty delta does nothing.
    pub fn flush_delta_to_disk(&self) -> Result<FlushReport> {
        let _flushing = self.flush_lock.lock();
        let start = Instant::now();
        let mut report = FlushReport::default();

        let snapshot = self.delta.snapshot();
        if snapshot.is_empty() {
            return Ok(report);
        }

        // Barrels may reference ids assigned since the last save
        self.lexicon.save(self.config.lexicon_path())?;
        self.trie.read().save(self.config.vocab_path())?;

        let mut by_barrel: BTreeMap<u32, Vec<(WordId, Vec<Posting>)>> = BTreeMap::new();
        for (word_id, postings) in snapshot {
            by_barrel
                .entry(self.barrels.barrel_for(word_id))
                .or_default()
                .push((word_id, postings));
        }

        let mut first_error: Option<HaystackError> = None;
        for (barrel, updates) in by_barrel {
            match self.barrels.merge_into(barrel, &updates) {
                Ok(merged) => {
                    for (word_id, postings) in &updates {
                        self.delta.remove_flushed(*word_id, postings);
                    }
                    report.barrels_written += 1;
                    report.postings_flushed += merged;
                    info!(
                        "Flushed {} postings for {} words into barrel {}",
                        merged,
                        updates.len(),
                        barrel
                    );
                }
                Err(e) => {
                    error!("Flush of barrel {} failed, keeping its delta: {}", barrel, e);
                    report.failed_barrels.push(barrel);
                    first_error.get_or_insert(e);
                }
            }
        }

        self.cache.invalidate();
        self.metrics
            .record_flush(start.elapsed().as_secs_f64(), report.failed_barrels.len());
        self.metrics.set_delta_words(self.delta.word_count());

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(
                    "Flush complete: {} barrels, {} postings in {:?}",
                    report.barrels_written,
                    report.postings_flushed,
                    start.elapsed()
                );
                Ok(report)
            }
        }
    }
}

/// Running background flusher
pub struct FlusherHandle {
    stop: Sender<bool>,
    join: Option<thread::JoinHandle<()>>,
}

impl FlusherHandle {
    /// Stop the flusher, optionally running one last flush first
    pub fn shutdown(mut self, final_flush: bool) -> Result<()> {
        let _ = self.stop.send(final_flush);
        match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| HaystackError::Internal("flusher thread panicked".to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for FlusherHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = self.stop.send(false);
            let _ = join.join();
        }
    }
}

impl QueryEngine {
    /// Start the background flusher at the configured `flush_interval_secs`.
    pub fn start_flusher(self: &Arc<Self>) -> Result<FlusherHandle> {
        let interval = Duration::from_secs(self.config.flush_interval_secs.max(1));
        spawn_flusher(Arc::clone(self), interval)
    }
}

/// Flush `engine` every `interval` on a dedicated thread.
///
/// Failures are logged and retried at the next tick.
pub fn spawn_flusher(engine: Arc<QueryEngine>, interval: Duration) -> Result<FlusherHandle> {
    let (stop, rx) = channel::bounded::<bool>(1);
    let join = thread::Builder::new()
        .name("haystack-flusher".to_string())
        .spawn(move || loop {
            match rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(e) = engine.flush_delta_to_disk() {
                        error!("Scheduled flush failed, retrying next interval: {}", e);
                    }
                }
                Ok(final_flush) => {
                    if final_flush {
                        if let Err(e) = engine.flush_delta_to_disk() {
                            error!("Final flush failed: {}", e);
                        }
                    }
                    info!("Flusher stopped");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        })?;

    info!("Flusher started, interval {:?}", interval);
    Ok(FlusherHandle {
        stop,
        join: Some(join),
    })
}
