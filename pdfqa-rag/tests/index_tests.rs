//! Property and integration tests for the vector index and its snapshots.

use std::sync::Arc;

use pdfqa_rag::index::cosine_similarity;
use pdfqa_rag::{
    Chunk, IndexEntry, IndexSnapshot, IndexState, RagError, SnapshotStore, VectorIndex,
};
use proptest::prelude::*;

fn entry(document: &str, sequence: usize, embedding: Vec<f32>) -> IndexEntry {
    IndexEntry {
        chunk: Chunk {
            document: document.to_string(),
            sequence,
            text: format!("{document} chunk {sequence}"),
        },
        embedding,
    }
}

fn arb_vector(dims: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0, dims)
}

/// Between one and 40 entries of the same dimensionality, plus a query vector.
fn arb_entries_and_query() -> impl Strategy<Value = (Vec<IndexEntry>, Vec<f32>)> {
    (1usize..8).prop_flat_map(|dims| {
        (
            proptest::collection::vec(arb_vector(dims), 1..40).prop_map(|vectors| {
                vectors.into_iter().enumerate().map(|(i, v)| entry("doc", i, v)).collect()
            }),
            arb_vector(dims),
        )
    })
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn results_are_sorted_and_bounded_by_k(
        (entries, query) in arb_entries_and_query(),
        k in 0usize..50,
    ) {
        let total = entries.len();
        let snapshot = IndexSnapshot::empty().with_entries(entries).unwrap();
        let results = snapshot.query(&query, k).unwrap();

        prop_assert_eq!(results.len(), k.min(total));
        for pair in results.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
            if pair[0].score == pair[1].score {
                prop_assert!(pair[0].chunk.sequence < pair[1].chunk.sequence);
            }
        }
    }

    #[test]
    fn scores_are_cosine_similarities(
        (entries, query) in arb_entries_and_query(),
    ) {
        let snapshot = IndexSnapshot::empty().with_entries(entries.clone()).unwrap();
        let results = snapshot.query(&query, entries.len()).unwrap();

        for result in results {
            let source = &entries[result.chunk.sequence];
            prop_assert_eq!(result.score, cosine_similarity(&source.embedding, &query));
            prop_assert!((-1.0001..=1.0001).contains(&result.score));
        }
    }

    #[test]
    fn top_result_has_the_maximum_score(
        (entries, query) in arb_entries_and_query(),
    ) {
        let best = entries
            .iter()
            .map(|e| cosine_similarity(&e.embedding, &query))
            .fold(f32::NEG_INFINITY, f32::max);
        let snapshot = IndexSnapshot::empty().with_entries(entries).unwrap();
        let top = &snapshot.query(&query, 1).unwrap()[0];
        prop_assert_eq!(top.score, best);
    }

    #[test]
    fn inserted_entries_are_visible_exactly_once(
        batches in proptest::collection::vec(1usize..6, 1..6),
    ) {
        let index = VectorIndex::new();
        let mut expected = 0;
        block_on(async {
            for (b, size) in batches.iter().enumerate() {
                let document = format!("doc-{b}");
                let entries = (0..*size).map(|i| entry(&document, i, vec![1.0, i as f32])).collect();
                let total = index.insert(entries).await.unwrap();
                expected += size;
                assert_eq!(total, expected);
            }
        });

        let snapshot = block_on(index.snapshot());
        let mut ids: Vec<String> = snapshot.entries().map(|e| e.chunk.id()).collect();
        prop_assert_eq!(ids.len(), expected);
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), expected);
        prop_assert_eq!(snapshot.document_count(), batches.len());
    }
}

#[tokio::test]
async fn persisted_snapshot_answers_queries_identically() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path()).with_embedding_model("test-model");

    let index = VectorIndex::new();
    index
        .insert(vec![
            entry("a.txt", 0, vec![1.0, 0.0, 0.0]),
            entry("a.txt", 1, vec![0.5, 0.5, 0.0]),
        ])
        .await
        .unwrap();
    index.insert(vec![entry("b.txt", 0, vec![0.0, 0.0, 1.0])]).await.unwrap();
    index.persist(&store).await.unwrap();

    let reloaded = VectorIndex::load(&store).await.unwrap();
    assert_eq!(reloaded.state().await, IndexState::Ready);
    assert_eq!(reloaded.len().await, 3);
    assert_eq!(reloaded.snapshot().await.dimensions(), Some(3));

    for query in [[1.0, 0.0, 0.0], [0.2, 0.3, 0.9], [0.0, 1.0, 0.0]] {
        let before = index.query(&query, 3).await.unwrap();
        let after = reloaded.query(&query, 3).await.unwrap();
        assert_eq!(before, after);
    }
}

#[tokio::test]
async fn missing_snapshot_loads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("never-written"));

    let index = VectorIndex::load(&store).await.unwrap();
    assert_eq!(index.state().await, IndexState::Empty);
    assert!(matches!(index.query(&[1.0], 1).await, Err(RagError::EmptyIndex)));
}

#[tokio::test]
async fn unrelated_files_do_not_make_the_index_ready() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "left over").unwrap();
    std::fs::create_dir(dir.path().join("chroma")).unwrap();

    let index = VectorIndex::load(&SnapshotStore::new(dir.path())).await.unwrap();
    assert_eq!(index.state().await, IndexState::Empty);
}

#[tokio::test]
async fn empty_state_round_trips_after_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    store.save(&IndexSnapshot::empty()).await.unwrap();

    let loaded = store.load().await.unwrap().expect("snapshot was written");
    assert_eq!(loaded.state(), IndexState::Empty);
    assert!(loaded.is_empty());
    assert_eq!(loaded.dimensions(), None);
}

#[tokio::test]
async fn corrupt_snapshot_is_a_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.json"), "{ not json").unwrap();

    let err = VectorIndex::load(&SnapshotStore::new(dir.path())).await.unwrap_err();
    assert!(matches!(err, RagError::Persistence(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_never_lose_entries() {
    let index = Arc::new(VectorIndex::new());

    let tasks: Vec<_> = (0..8)
        .map(|w| {
            let index = Arc::clone(&index);
            tokio::spawn(async move {
                let document = format!("writer-{w}");
                let entries = (0..10).map(|i| entry(&document, i, vec![1.0, w as f32])).collect();
                index.insert(entries).await.unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let snapshot = index.snapshot().await;
    assert_eq!(snapshot.len(), 80);
    assert_eq!(snapshot.document_count(), 8);

    // Each insert lands as one contiguous run.
    let documents: Vec<&str> = snapshot.entries().map(|e| e.chunk.document.as_str()).collect();
    for run in documents.chunks(10) {
        assert!(run.iter().all(|d| *d == run[0]));
    }
}
