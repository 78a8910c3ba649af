use std::sync::Arc;
use std::thread;

use tempfile::TempDir;

use haystack::indexing::{build_all, ingest_documents};
use haystack::{DocStore, Document, EngineConfig, HaystackError, QueryEngine};

fn create_test_config(tmp: &TempDir) -> EngineConfig {
    EngineConfig::new(tmp.path())
        .with_barrels(3)
        .with_query_threads(4)
        .with_cache_capacity(16)
}

fn setup_engine() -> (TempDir, QueryEngine) {
    let tmp = TempDir::new().unwrap();
    let engine = QueryEngine::open(create_test_config(&tmp)).unwrap();
    (tmp, engine)
}

#[test]
fn test_added_document_found_before_and_after_flush() {
    let (_tmp, engine) = setup_engine();
    engine
        .add_document(Document::question(0, 42, "Nginx reverse proxy", "proxy_pass setup"))
        .unwrap();

    assert_eq!(engine.search("nginx", 10).unwrap(), vec![42]);
    assert_eq!(engine.search("reverse proxy", 10).unwrap(), vec![42]);

    engine.flush_delta_to_disk().unwrap();
    assert!(engine.delta().is_empty());
    assert_eq!(engine.search("nginx", 10).unwrap(), vec![42]);
}

#[test]
fn test_flushed_documents_survive_restart() {
    let tmp = TempDir::new().unwrap();
    {
        let engine = QueryEngine::open(create_test_config(&tmp)).unwrap();
        engine
            .add_document(Document::question(0, 1, "Postgres vacuum", "autovacuum tuning"))
            .unwrap();
        engine
            .add_document(Document::question(0, 2, "Postgres replication", "streaming"))
            .unwrap();
        engine.flush_delta_to_disk().unwrap();
    }

    let engine = QueryEngine::open(create_test_config(&tmp)).unwrap();
    assert!(engine.delta().is_empty());
    let mut results = engine.search("postgres", 10).unwrap();
    results.sort_unstable();
    assert_eq!(results, vec![1, 2]);
    assert_eq!(engine.search("autovacuum", 10).unwrap(), vec![1]);
    assert!(engine
        .autocomplete("repl", 5)
        .unwrap()
        .contains(&"replication".to_string()));
}

#[test]
fn test_unflushed_documents_are_lost_from_index_but_stored() {
    let tmp = TempDir::new().unwrap();
    {
        let engine = QueryEngine::open(create_test_config(&tmp)).unwrap();
        engine
            .add_document(Document::question(0, 9, "ephemeral", ""))
            .unwrap();
    }
    let engine = QueryEngine::open(create_test_config(&tmp)).unwrap();
    assert!(engine.search("ephemeral", 10).unwrap().is_empty());
    assert!(engine.get_document(9).unwrap().is_some());
}

#[test]
fn test_identical_searches_are_stable_and_add_invalidates() {
    let (_tmp, engine) = setup_engine();
    for id in 1..=5 {
        engine
            .add_document(Document::question(0, id, "", &"redis ".repeat(id as usize)))
            .unwrap();
    }

    let first = engine.search("redis", 10).unwrap();
    let second = engine.search("redis", 10).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, vec![5, 4, 3, 2, 1]);
    assert_eq!(engine.metrics().cache_hits.get(), 1.0);

    engine
        .add_document(Document::question(0, 6, "redis", "redis cluster"))
        .unwrap();
    let third = engine.search("redis", 10).unwrap();
    assert_eq!(third[0], 6);
    assert_eq!(engine.metrics().cache_misses.get(), 2.0);
}

#[test]
fn test_delta_shadows_disk_posting() {
    let tmp = TempDir::new().unwrap();
    let config = create_test_config(&tmp);
    {
        let store = DocStore::open(config.data_index_base()).unwrap();
        ingest_documents(
            &store,
            vec![
                Document::question(0, 1, "terraform", "terraform terraform"),
                Document::question(0, 2, "", "terraform terraform terraform terraform"),
            ],
            config.site_id,
        )
        .unwrap();
    }
    build_all(&config).unwrap();
    let engine = QueryEngine::open(config).unwrap();
    assert_eq!(engine.search("terraform", 10).unwrap(), vec![1, 2]);

    // Rewritten without the word in the title: disk score 12 is replaced by 1
    engine
        .add_document(Document::question(0, 1, "infrastructure", "terraform"))
        .unwrap();
    assert_eq!(engine.search("terraform", 10).unwrap(), vec![2, 1]);

    engine.flush_delta_to_disk().unwrap();
    assert_eq!(engine.search("terraform", 10).unwrap(), vec![2, 1]);
}

#[test]
fn test_batch_partial_failure() {
    let (_tmp, engine) = setup_engine();
    let report = engine
        .add_documents(vec![
            Document::question(0, 1, "first", ""),
            Document::question(0, 0, "missing id", ""),
            Document::question(0, 2, "second", ""),
            Document::question(0, 3, "   ", "  "),
        ])
        .unwrap();

    assert_eq!(report.success_count(), 2);
    assert_eq!(report.failure_count(), 2);
    assert!(!report.is_complete_success());
    assert_eq!(engine.search("second", 10).unwrap(), vec![2]);
}

#[test]
fn test_validation_errors() {
    let (_tmp, engine) = setup_engine();
    match engine.search(" \t ", 10) {
        Err(HaystackError::InvalidRequest(_)) => {}
        other => panic!("expected InvalidRequest, got {:?}", other),
    }
    assert!(engine.search("x", 0).is_err());
    assert!(engine.add_documents(Vec::new()).is_err());
    assert!(engine
        .add_document(Document::question(0, 0, "x", ""))
        .unwrap_err()
        .is_validation());
}

#[test]
fn test_concurrent_adds_and_searches() {
    let (_tmp, engine) = setup_engine();
    let engine = Arc::new(engine);

    let writers: Vec<_> = (0..4u32)
        .map(|t| {
            let engine = engine.clone();
            thread::spawn(move || {
                for i in 0..50u32 {
                    let id = t * 1000 + i + 1;
                    let doc = Document::question(0, id, "shared topic", &format!("writer{}", t));
                    engine.add_document(doc).unwrap();
                }
            })
        })
        .collect();
    let readers: Vec<_> = (0..2)
        .map(|_| {
            let engine = engine.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    engine.search("shared topic", 1000).unwrap();
                }
            })
        })
        .collect();
    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    assert_eq!(engine.search("shared", 1000).unwrap().len(), 200);
    assert_eq!(engine.search("writer2", 1000).unwrap().len(), 50);

    engine.flush_delta_to_disk().unwrap();
    assert!(engine.delta().is_empty());
    assert_eq!(engine.search("shared", 1000).unwrap().len(), 200);
}
