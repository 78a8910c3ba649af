use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tempfile::TempDir;

use haystack::indexing::{build_all, ingest_documents};
use haystack::{DocStore, Document, EngineConfig, QueryEngine};

const WORDS: [&str; 16] = [
    "rust", "programming", "language", "kernel", "docker", "ubuntu", "network", "python",
    "compile", "error", "install", "driver", "memory", "thread", "cache", "index",
];

struct BenchEnv {
    _tmp: TempDir,
    engine: QueryEngine,
}

fn make_doc(id: u32) -> Document {
    let pick = |salt: usize| WORDS[(id as usize * salt + salt) % WORDS.len()];
    Document::question(
        0,
        id,
        &format!("{} {}", pick(3), pick(5)),
        &format!("{} {} {} doc {}", pick(7), pick(11), pick(13), id),
    )
    .with_score((id % 100) as i32)
}

fn build_env(doc_count: u32, cache_capacity: usize) -> BenchEnv {
    let tmp = TempDir::new().unwrap();
    let config = EngineConfig::new(tmp.path())
        .with_barrels(4)
        .with_cache_capacity(cache_capacity);
    {
        let store = DocStore::open(config.data_index_base()).unwrap();
        ingest_documents(&store, (1..=doc_count).map(make_doc), config.site_id).unwrap();
    }
    build_all(&config).unwrap();
    let engine = QueryEngine::open(config).unwrap();
    BenchEnv { _tmp: tmp, engine }
}

fn bench_search_uncached(c: &mut Criterion) {
    let counts = [1_000u32, 5_000, 10_000];
    let envs: Vec<(u32, BenchEnv)> = counts.iter().map(|&n| (n, build_env(n, 0))).collect();

    let mut group = c.benchmark_group("search_uncached");
    for (count, env) in envs.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), env, |b, env| {
            b.iter(|| {
                black_box(env.engine.search("rust programming", 10).unwrap());
            });
        });
    }
    group.finish();
}

fn bench_search_cached(c: &mut Criterion) {
    let env = build_env(5_000, 1000);
    env.engine.search("rust programming", 10).unwrap();
    c.bench_function("search_cached", |b| {
        b.iter(|| {
            black_box(env.engine.search("rust programming", 10).unwrap());
        });
    });
}

fn bench_autocomplete(c: &mut Criterion) {
    let env = build_env(5_000, 0);
    c.bench_function("autocomplete", |b| {
        b.iter(|| {
            black_box(env.engine.autocomplete("pro", 10).unwrap());
        });
    });
}

fn bench_add_document(c: &mut Criterion) {
    let env = build_env(1_000, 1000);
    let mut next_id = 1_000_000u32;
    c.bench_function("add_document", |b| {
        b.iter(|| {
            next_id += 1;
            env.engine.add_document(make_doc(next_id)).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_search_uncached,
    bench_search_cached,
    bench_autocomplete,
    bench_add_document
);
criterion_main!(benches);
