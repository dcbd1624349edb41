#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end ingestion: corpus on disk -> walker -> dedup -> batch loader -> LanceDB

use corpus_loader::config::{Config, StoreConfig};
use corpus_loader::corpus::{SourceGroup, prepare_corpus};
use corpus_loader::database::{RecordSearch, VectorStore};
use corpus_loader::embeddings::Embedder;
use corpus_loader::loader::{BatchLoader, ProgressTracker, RunOutcome};
use corpus_loader::search::SearchService;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const DIMENSION: u32 = 3;

fn write_json(path: &Path, value: &serde_json::Value) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("should create parent folder");
    }
    fs::write(path, value.to_string()).expect("should write source file");
}

/// Two yearly folders (one missing), one flat folder, one corrupt file and
/// one text shared across groups
fn write_corpus(root: &Path) {
    write_json(
        &root.join("legcoqna/128embeddings/2001/q1.json"),
        &json!({
            "title": "Housing",
            "question": [[1.0, 0.0, 0.0], [0.9, 0.1, 0.0]],
            "question_text": ["public housing supply", "waiting time for flats"],
            "reply": [[0.0, 1.0, 0.0]],
            "reply_text": ["the government is increasing supply"]
        }),
    );
    write_json(
        &root.join("legcoqna/128embeddings/2003/q2.json"),
        &json!({
            "title": "Transport",
            "content": [[0.0, 0.0, 1.0], [0.1, 0.0, 0.9]],
            "content_text": "railway extension"
        }),
    );
    fs::write(root.join("legcoqna/128embeddings/2003/broken.json"), "{ not json")
        .expect("should write corrupt file");
    write_json(
        &root.join("sfcqna/128embeddings/faq.json"),
        &json!({
            "title": "Licensing",
            "question": [[0.0, 1.0, 0.0]],
            "question_text": ["public housing supply"],
            "reply": [[0.5, 0.5, 0.0]],
            "reply_text": ["apply through the online portal"]
        }),
    );
}

fn sources() -> Vec<SourceGroup> {
    vec![
        SourceGroup::yearly("legcoqna", "legcoqna/128embeddings", 2001, 2004),
        SourceGroup::flat("sfcqna", "sfcqna/128embeddings"),
    ]
}

fn store_config(base: &Path) -> Config {
    Config {
        base_dir: base.to_path_buf(),
        store: StoreConfig {
            dimension: DIMENSION,
            ..StoreConfig::default()
        },
        ..Config::default()
    }
}

struct FixedEmbedder(Vec<f32>);

impl Embedder for FixedEmbedder {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}

#[test]
fn corpus_preparation() {
    let corpus = TempDir::new().expect("should create corpus dir");
    write_corpus(corpus.path());

    let prepared = prepare_corpus(corpus.path(), &sources());

    assert_eq!(prepared.stats.files_parsed, 3);
    assert_eq!(prepared.stats.files_skipped, 1);
    assert_eq!(prepared.stats.folders_skipped, 1, "2002 folder is missing");
    assert_eq!(prepared.duplicates_removed, 2);

    let ids: Vec<&str> = prepared.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["legcoqna0", "legcoqna1", "legcoqna2", "legcoqna3", "sfcqna6"]
    );
    let texts: Vec<&str> = prepared.records.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "public housing supply",
            "waiting time for flats",
            "the government is increasing supply",
            "railway extension",
            "apply through the online portal",
        ]
    );
}

#[tokio::test]
async fn load_then_search() {
    let corpus = TempDir::new().expect("should create corpus dir");
    write_corpus(corpus.path());
    let store_dir = TempDir::new().expect("should create store dir");
    let config = store_config(store_dir.path());

    let prepared = prepare_corpus(corpus.path(), &sources());
    let total = prepared.records.len();

    let store = Arc::new(
        VectorStore::new(&config)
            .await
            .expect("should create vector store"),
    );
    let tracker = Arc::new(ProgressTracker::new());
    let loader = BatchLoader::new(
        Arc::<VectorStore>::clone(&store),
        Arc::clone(&tracker),
        &config.ingestion,
    )
    .with_chunk_size(2);

    let outcome = loader
        .load(&prepared.records, 0)
        .await
        .expect("run should be accepted");
    assert_eq!(outcome, RunOutcome::Completed { inserted: total });

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.percent, 100);
    assert!(!snapshot.inserting);
    assert_eq!(snapshot.error, "");

    assert_eq!(
        store.count_records(None).await.expect("should count"),
        total as u64
    );

    let service = SearchService::new(
        Arc::new(FixedEmbedder(vec![0.0, 0.0, 1.0])),
        Arc::<VectorStore>::clone(&store),
        config.store.search_limit,
    );
    let results = service
        .search("trains", Some(2))
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].vector_id, "legcoqna3");
    assert_eq!(results[0].title, "Transport");
    assert_eq!(results[0].vector_text, "railway extension");
    assert!(results[0].score > results[1].score);
}

#[tokio::test]
async fn resumed_run_completes_the_table() {
    let corpus = TempDir::new().expect("should create corpus dir");
    write_corpus(corpus.path());
    let store_dir = TempDir::new().expect("should create store dir");
    let config = store_config(store_dir.path());

    let mut records = prepare_corpus(corpus.path(), &sources()).records;
    // A record of the wrong dimension makes the second chunk fail
    let valid_third = records[2].clone();
    records[2].vector = vec![1.0];

    let store = Arc::new(
        VectorStore::new(&config)
            .await
            .expect("should create vector store"),
    );
    let tracker = Arc::new(ProgressTracker::new());
    let loader = BatchLoader::new(
        Arc::<VectorStore>::clone(&store),
        Arc::clone(&tracker),
        &config.ingestion,
    )
    .with_chunk_size(2);

    let outcome = loader
        .load(&records, 0)
        .await
        .expect("run should be accepted");
    assert!(matches!(outcome, RunOutcome::Failed { offset: 2, .. }));
    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.percent, 0);
    assert!(!snapshot.error.is_empty());
    assert_eq!(store.count_records(None).await.expect("should count"), 2);

    records[2] = valid_third;
    let resume_offset = snapshot.resume_offset.expect("should record offset");
    let outcome = loader
        .load(&records, resume_offset)
        .await
        .expect("resume should be accepted");

    assert_eq!(outcome, RunOutcome::Completed { inserted: 3 });
    assert_eq!(tracker.snapshot().percent, 100);
    assert_eq!(store.count_records(None).await.expect("should count"), 5);

    let hits = store
        .search(&[0.0, 1.0, 0.0], 1)
        .await
        .expect("should search");
    assert_eq!(hits[0].vector_id, "legcoqna2");
}
