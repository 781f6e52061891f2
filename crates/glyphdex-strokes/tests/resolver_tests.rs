//! End-to-end tests for the resolution pipeline, driven by mock sources.

use async_trait::async_trait;
use glyphdex_strokes::source::{SourceError, StrokeSource};
use glyphdex_strokes::{PartitionedDirSource, StrokeResolver};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Answers with a fixed record for one key, misses everything else.
struct StaticSource {
    key: &'static str,
    record: Value,
    calls: Arc<AtomicUsize>,
}

impl StaticSource {
    fn new(key: &'static str, record: Value) -> Self {
        Self {
            key,
            record,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl StrokeSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, key: &str) -> Result<Option<Value>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if key == self.key {
            Ok(Some(self.record.clone()))
        } else {
            Ok(None)
        }
    }
}

/// Fails every fetch, counting attempts. Stands in for an unreachable mirror.
struct FailingSource {
    calls: Arc<AtomicUsize>,
}

impl FailingSource {
    fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl StrokeSource for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    async fn fetch(&self, _key: &str) -> Result<Option<Value>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SourceError::Status(503))
    }
}

fn water_record() -> Value {
    json!({
        "character": "水",
        "strokes": ["M 10 10 L 90 90", "M 90 10 L 10 90"],
        "medians": [[[10, 10], [90, 90]], [[90, 10], [10, 90]]],
    })
}

#[tokio::test]
async fn local_hit_never_touches_the_network() {
    let local = StaticSource::new("水", water_record());
    let remote = FailingSource::new();
    let remote_calls = Arc::clone(&remote.calls);

    let resolver = StrokeResolver::from_sources(vec![Box::new(local)], vec![Box::new(remote)]);
    let record = resolver.resolve("水").await;

    assert!(!record.is_synthetic);
    assert_eq!(record.key, "水");
    assert_eq!(remote_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn remote_backstops_local_misses() {
    let remote = StaticSource::new("火", water_record_for("火"));
    let resolver = StrokeResolver::from_sources(vec![], vec![Box::new(remote)]);

    let record = resolver.resolve("火").await;
    assert!(!record.is_synthetic);
    assert_eq!(record.key, "火");
}

#[tokio::test]
async fn all_sources_failing_yields_synthetic() {
    let resolver = StrokeResolver::from_sources(
        vec![Box::new(FailingSource::new())],
        vec![Box::new(FailingSource::new()), Box::new(FailingSource::new())],
    );

    let record = resolver.resolve("龘").await;
    assert!(record.is_synthetic);
    assert_eq!(record.key, "龘");
    assert!(!record.segments.is_empty());
    assert_eq!(record.segments.len(), record.point_series.len());
}

#[tokio::test]
async fn second_resolve_is_a_pure_cache_hit() {
    let source = StaticSource::new("水", water_record());
    let calls = Arc::clone(&source.calls);
    let resolver = StrokeResolver::from_sources(vec![Box::new(source)], vec![]);

    let first = resolver.resolve("水").await;
    let second = resolver.resolve("水").await;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(resolver.cached_records(), 1);
}

#[tokio::test]
async fn synthetic_results_are_cached_too() {
    let source = FailingSource::new();
    let calls = Arc::clone(&source.calls);
    let resolver = StrokeResolver::from_sources(vec![Box::new(source)], vec![]);

    resolver.resolve("missing").await;
    resolver.resolve("missing").await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn requested_key_overrides_embedded_key_spelling() {
    // A map-style index entry without its own key field gets the requested
    // key stamped on, even through normalization.
    let raw = json!({
        "strokes": ["M 1 1 L 2 2"],
    });
    let source = StaticSource::new("且", raw);
    let resolver = StrokeResolver::from_sources(vec![Box::new(source)], vec![]);

    let record = resolver.resolve("且").await;
    assert_eq!(record.key, "且");
    assert!(!record.is_synthetic);
}

#[tokio::test]
async fn percent_encoded_keys_are_decoded_before_lookup() {
    let source = StaticSource::new("水", water_record());
    let resolver = StrokeResolver::from_sources(vec![Box::new(source)], vec![]);

    let record = resolver.resolve("%E6%B0%B4").await;
    assert_eq!(record.key, "水");
    assert!(!record.is_synthetic);
}

#[tokio::test]
async fn invalid_candidate_falls_through_to_next_source() {
    // First source returns a record whose key contradicts the request; the
    // pipeline must reject it and keep going.
    let bad = StaticSource::new("水", json!({
        "character": "火",
        "strokes": ["M 0 0 L 1 1"],
        "medians": [[[0, 0], [1, 1]]],
    }));
    let good = StaticSource::new("水", water_record());
    let resolver =
        StrokeResolver::from_sources(vec![Box::new(bad), Box::new(good)], vec![]);

    let record = resolver.resolve("水").await;
    assert!(!record.is_synthetic);
    assert_eq!(record.point_series[0], vec![[10.0, 10.0], [90.0, 90.0]]);
}

#[tokio::test]
async fn partitioned_dir_source_reads_per_key_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("山.json"),
        serde_json::to_string(&water_record_for("山")).unwrap(),
    )
    .unwrap();

    let source = PartitionedDirSource::new(vec![
        dir.path().join("does-not-exist"),
        dir.path().to_path_buf(),
    ]);
    let resolver = StrokeResolver::from_sources(vec![Box::new(source)], vec![]);

    let record = resolver.resolve("山").await;
    assert!(!record.is_synthetic);
    assert_eq!(record.key, "山");

    assert!(resolver.has_record("山").await);
    assert!(!resolver.has_record("海").await);
}

#[tokio::test]
async fn slow_mirror_times_out_and_the_chain_moves_on() {
    use glyphdex_strokes::RemoteMirrorSource;
    use std::time::Duration;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = listener.local_addr().expect("should have an address");
    tokio::spawn(async move {
        // Accept connections and hold them open without ever answering.
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let timeout = Duration::from_millis(50);
    let mirror = RemoteMirrorSource::new(
        "slow-mirror",
        &format!("http://{addr}/data/{{key}}.json"),
        timeout,
    );
    match mirror.fetch("水").await {
        Err(SourceError::Timeout(after)) => assert_eq!(after, timeout),
        other => panic!("expected timeout, got {other:?}"),
    }

    // Through the pipeline, the hung mirror is just another source with no
    // answer: the chain falls through to the synthetic generator.
    let resolver = StrokeResolver::from_sources(
        vec![],
        vec![Box::new(RemoteMirrorSource::new(
            "slow-mirror",
            &format!("http://{addr}/data/{{key}}.json"),
            timeout,
        ))],
    );
    let record = resolver.resolve("水").await;
    assert!(record.is_synthetic);
}

fn water_record_for(key: &str) -> Value {
    json!({
        "character": key,
        "strokes": ["M 10 10 L 90 90", "M 90 10 L 10 90"],
        "medians": [[[10, 10], [90, 90]], [[90, 10], [10, 90]]],
    })
}
