/// Integration tests for the persistent embedding cache
///
/// Verifies the cache written during artifact loading is reused across processes,
/// rebuilt when the reference corpus changes size, and recovered when corrupt.
mod common;

use common::{Fixture, ABSENTEE_TEXT, RESOLVED_CSV};
use complaint_intel::ml::{
    dataset::COMPLAINT_TEXT,
    embedding_cache::{CacheOutcome, EMBEDDINGS_FILE, METADATA_FILE, TEXTS_FILE},
    EmbeddingCache, EmbeddingModel, ModelType, ReferenceDataset, StaticEmbeddingModel,
    TextNormalizer,
};
use ndarray::Array2;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Embedding model wrapper counting batch encode calls
struct CountingModel {
    inner: StaticEmbeddingModel,
    calls: AtomicUsize,
}

impl CountingModel {
    fn load(fixture: &Fixture) -> Self {
        Self {
            inner: StaticEmbeddingModel::load(&fixture.path("sbert_duplicate_model")).unwrap(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingModel for CountingModel {
    fn model_type(&self) -> ModelType {
        self.inner.model_type()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn encode(&self, texts: &[String]) -> Array2<f32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.encode(texts)
    }
}

fn resolved_texts(fixture: &Fixture) -> Vec<String> {
    ReferenceDataset::load("resolved_complaints", &fixture.path("data/resolved_complaints.csv"))
        .unwrap()
        .column_values(COMPLAINT_TEXT)
        .unwrap()
}

fn cache(fixture: &Fixture) -> EmbeddingCache {
    EmbeddingCache::new(fixture.path("cache"), Arc::new(TextNormalizer::english()))
}

#[test]
fn test_load_persists_cache_files() {
    let fixture = Fixture::full();
    fixture.engine();

    for file in [EMBEDDINGS_FILE, TEXTS_FILE, METADATA_FILE] {
        assert!(fixture.path("cache").join(file).is_file(), "{} missing", file);
    }
    let metadata = fixture.cache_metadata();
    assert_eq!(metadata["row_count"], 3);
    assert_eq!(metadata["embedding_dim"], 3);
}

#[test]
fn test_persisted_cache_is_reused_without_encoding() {
    let fixture = Fixture::full();
    fixture.engine();

    let model = CountingModel::load(&fixture);
    let cache = cache(&fixture);
    let outcome = cache.ensure_with_outcome(&resolved_texts(&fixture), &model);

    assert_eq!(outcome, CacheOutcome::Hit);
    assert_eq!(model.calls(), 0);
    assert_eq!(cache.snapshot().unwrap().len(), 3);
}

#[test]
fn test_row_count_change_rebuilds_cache() {
    let fixture = Fixture::full();
    let engine = fixture.engine();

    fixture.write_text(
        "data/resolved_complaints.csv",
        &format!(
            "{}Wrong total calculation in internal marks,Calculation Discrepancy,Total recalculated,2\n",
            RESOLVED_CSV
        ),
    );
    let status = engine.reload();

    assert!(status.embeddings_cached);
    assert_eq!(status.resolved_complaints_count, Some(4));
    assert_eq!(fixture.cache_metadata()["row_count"], 4);
    assert_eq!(engine.find_similar(ABSENTEE_TEXT, 10).len(), 4);
}

#[test]
fn test_same_size_edit_keeps_cache() {
    let fixture = Fixture::full();
    fixture.engine();

    let mut texts = resolved_texts(&fixture);
    texts[1] = "Completely different complaint text".to_string();

    let model = CountingModel::load(&fixture);
    let outcome = cache(&fixture).ensure_with_outcome(&texts, &model);
    assert_eq!(outcome, CacheOutcome::Hit);
    assert_eq!(model.calls(), 0);
}

#[test]
fn test_corrupt_cache_is_rebuilt() {
    let fixture = Fixture::full();
    fixture.engine();
    fixture.write_text(&format!("cache/{}", EMBEDDINGS_FILE), "garbage");

    let model = CountingModel::load(&fixture);
    let cache = cache(&fixture);
    let outcome = cache.ensure_with_outcome(&resolved_texts(&fixture), &model);

    assert_eq!(outcome, CacheOutcome::Rebuilt);
    assert_eq!(model.calls(), 1);
    assert_eq!(cache.snapshot().unwrap().embeddings.dim(), (3, 3));

    // Rebuilt files are valid for the next caller
    let again = CountingModel::load(&fixture);
    assert_eq!(
        self::cache(&fixture).ensure_with_outcome(&resolved_texts(&fixture), &again),
        CacheOutcome::Hit
    );
}
