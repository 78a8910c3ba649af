use std::time::Instant;

use tempfile::TempDir;

use haystack::indexing::{build_all, ingest_documents};
use haystack::{DocStore, Document, EngineConfig, QueryEngine};

const WORDS: [&str; 12] = [
    "rust", "kernel", "docker", "ubuntu", "network", "python", "compile", "error", "install",
    "driver", "memory", "thread",
];

fn create_doc(id: u32) -> Document {
    let title = format!(
        "{} {}",
        WORDS[id as usize % WORDS.len()],
        WORDS[(id as usize / 3) % WORDS.len()]
    );
    let body = format!(
        "question {} about {} and {}",
        id,
        WORDS[(id as usize * 7) % WORDS.len()],
        WORDS[(id as usize * 5) % WORDS.len()]
    );
    Document::question(0, id, &title, &body).with_score((id % 50) as i32)
}

#[test]
fn test_build_and_query_throughput() {
    let tmp = TempDir::new().unwrap();
    let config = EngineConfig::new(tmp.path()).with_barrels(4);
    let num_docs = 2_000u32;

    let start = Instant::now();
    {
        let store = DocStore::open(config.data_index_base()).unwrap();
        ingest_documents(&store, (1..=num_docs).map(create_doc), config.site_id).unwrap();
    }
    let report = build_all(&config).unwrap();
    let build_secs = start.elapsed().as_secs_f64();

    let engine = QueryEngine::open(config).unwrap();
    let queries = ["rust kernel", "docker error", "install driver", "memory thread"];
    let start = Instant::now();
    let rounds = 50;
    for _ in 0..rounds {
        for query in &queries {
            engine.search(query, 20).unwrap();
        }
    }
    let query_secs = start.elapsed().as_secs_f64();

    println!("\n=== Build Metrics ===");
    println!("Documents: {}", report.documents);
    println!("Words: {}", report.words);
    println!("Postings: {}", report.inverted.postings);
    println!("Build time: {:.2}s", build_secs);
    println!("\n=== Query Metrics ===");
    println!(
        "Avg latency (cache warm): {:.3}ms",
        query_secs * 1000.0 / (rounds * queries.len()) as f64
    );

    assert_eq!(report.documents, num_docs as usize);
    assert!(engine.search("rust", 1000).unwrap().len() > 100);
}

#[test]
fn test_live_add_throughput() {
    let tmp = TempDir::new().unwrap();
    let engine = QueryEngine::open(EngineConfig::new(tmp.path())).unwrap();
    let num_docs = 500u32;

    let start = Instant::now();
    for chunk in (1..=num_docs).collect::<Vec<_>>().chunks(100) {
        let docs = chunk.iter().map(|id| create_doc(*id)).collect();
        let report = engine.add_documents(docs).unwrap();
        assert!(report.is_complete_success());
    }
    let add_secs = start.elapsed().as_secs_f64();

    let start = Instant::now();
    let flushed = engine.flush_delta_to_disk().unwrap();
    let flush_secs = start.elapsed().as_secs_f64();

    println!("\n=== Live Add Metrics ===");
    println!("Adds/sec: {:.2}", num_docs as f64 / add_secs);
    println!("Flush: {} postings in {:.3}s", flushed.postings_flushed, flush_secs);

    assert!(engine.delta().is_empty());
    assert_eq!(engine.search("question", 1000).unwrap().len(), num_docs as usize);
}
