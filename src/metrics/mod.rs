use prometheus::{Counter, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::Result;

/// Prometheus metrics for the query engine
#[derive(Clone)]
pub struct EngineMetrics {
    // Counters
    pub documents_added: Counter,
    pub documents_rejected: Counter,
    pub searches_total: Counter,
    pub cache_hits: Counter,
    pub cache_misses: Counter,
    pub flushes_total: Counter,
    pub flush_failures: Counter,

    // Gauges
    pub delta_words: Gauge,
    pub corpus_documents: Gauge,

    // Histograms
    pub search_latency: Histogram,
    pub flush_latency: Histogram,

    registry: Arc<Registry>,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<Counter> {
    let counter = Counter::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge> {
    let gauge = Gauge::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

impl EngineMetrics {
    /// Create a fresh registry with every engine metric registered
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let documents_added = counter(
            &registry,
            "haystack_documents_added_total",
            "Documents accepted by add_document",
        )?;
        let documents_rejected = counter(
            &registry,
            "haystack_documents_rejected_total",
            "Documents rejected by validation or storage errors",
        )?;
        let searches_total = counter(&registry, "haystack_searches_total", "Search requests served")?;
        let cache_hits = counter(&registry, "haystack_cache_hits_total", "Query cache hits")?;
        let cache_misses = counter(&registry, "haystack_cache_misses_total", "Query cache misses")?;
        let flushes_total = counter(
            &registry,
            "haystack_flushes_total",
            "Delta flushes that wrote at least one barrel",
        )?;
        let flush_failures = counter(
            &registry,
            "haystack_flush_failures_total",
            "Barrel rewrites that failed during a flush",
        )?;

        let delta_words = gauge(
            &registry,
            "haystack_delta_words",
            "Words with unflushed postings in the delta index",
        )?;
        let corpus_documents = gauge(
            &registry,
            "haystack_corpus_documents",
            "Documents in the document store",
        )?;

        let search_latency = Histogram::with_opts(
            HistogramOpts::new("haystack_search_latency_seconds", "Search latency")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(search_latency.clone()))?;

        let flush_latency = Histogram::with_opts(
            HistogramOpts::new("haystack_flush_latency_seconds", "Delta flush latency")
                .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
        )?;
        registry.register(Box::new(flush_latency.clone()))?;

        Ok(Self {
            documents_added,
            documents_rejected,
            searches_total,
            cache_hits,
            cache_misses,
            flushes_total,
            flush_failures,
            delta_words,
            corpus_documents,
            search_latency,
            flush_latency,
            registry: Arc::new(registry),
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Record one served search
    pub fn record_search(&self, duration_secs: f64, cache_hit: bool) {
        self.searches_total.inc();
        if cache_hit {
            self.cache_hits.inc();
        } else {
            self.cache_misses.inc();
        }
        self.search_latency.observe(duration_secs);
    }

    pub fn record_add(&self, accepted: bool) {
        if accepted {
            self.documents_added.inc();
        } else {
            self.documents_rejected.inc();
        }
    }

    pub fn record_flush(&self, duration_secs: f64, failed_barrels: usize) {
        self.flushes_total.inc();
        self.flush_failures.inc_by(failed_barrels as f64);
        self.flush_latency.observe(duration_secs);
    }

    pub fn set_delta_words(&self, words: usize) {
        self.delta_words.set(words as f64);
    }

    pub fn set_corpus_documents(&self, count: u64) {
        self.corpus_documents.set(count as f64);
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn gather_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| crate::HaystackError::Internal(format!("metrics text: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_gather() {
        let metrics = EngineMetrics::new().unwrap();
        metrics.record_search(0.002, false);
        metrics.record_search(0.001, true);
        metrics.record_add(true);
        metrics.record_add(false);
        metrics.record_flush(0.5, 1);
        metrics.set_delta_words(7);

        assert_eq!(metrics.searches_total.get(), 2.0);
        assert_eq!(metrics.cache_hits.get(), 1.0);
        assert_eq!(metrics.cache_misses.get(), 1.0);
        assert_eq!(metrics.flush_failures.get(), 1.0);

        let text = metrics.gather_text().unwrap();
        assert!(text.contains("haystack_searches_total 2"));
        assert!(text.contains("haystack_delta_words 7"));
        assert!(text.contains("haystack_documents_rejected_total 1"));
    }

    #[test]
    fn test_independent_registries() {
        let a = EngineMetrics::new().unwrap();
        let b = EngineMetrics::new().unwrap();
        a.record_add(true);
        assert_eq!(b.documents_added.get(), 0.0);
    }
}
