//! Persisted embeddings for the resolved-complaint reference corpus.
//!
//! The cache is valid iff its recorded `row_count` equals the size of the reference corpus
//! handed to [`EmbeddingCache::ensure`]. Same-size edits are only detected through the content
//! digest and reported as drift; they never invalidate the cache.

use crate::metrics::EMBEDDING_CACHE_EVENTS;
use crate::ml::embedding::EmbeddingModel;
use crate::ml::text::TextNormalizer;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const EMBEDDINGS_FILE: &str = "resolved_embeddings.bin";
pub const TEXTS_FILE: &str = "resolved_texts.bin";
pub const METADATA_FILE: &str = "cache_metadata.json";

/// Metadata persisted next to the cached vectors
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheMetadata {
    pub row_count: usize,
    pub embedding_dim: usize,

    #[serde(default)]
    pub computed_at: Option<DateTime<Utc>>,

    /// SHA-256 of the normalised corpus
    #[serde(default)]
    pub content_digest: Option<String>,
}

/// In-memory cache contents, index-aligned with the reference corpus
#[derive(Debug, Clone)]
pub struct CachedEmbeddings {
    pub embeddings: Array2<f32>,
    pub texts: Vec<String>,
    pub metadata: CacheMetadata,
}

impl CachedEmbeddings {
    pub fn len(&self) -> usize {
        self.embeddings.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How a call to `ensure` obtained its embeddings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Persisted cache matched the corpus size and was loaded
    Hit,

    /// Embeddings were recomputed for the full corpus
    Rebuilt,
}

/// Embedding cache rooted at a directory
pub struct EmbeddingCache {
    dir: PathBuf,
    normalizer: Arc<TextNormalizer>,
    current: RwLock<Option<Arc<CachedEmbeddings>>>,
    rebuild_lock: Mutex<()>,
}

impl EmbeddingCache {
    pub fn new(dir: impl Into<PathBuf>, normalizer: Arc<TextNormalizer>) -> Self {
        Self {
            dir: dir.into(),
            normalizer,
            current: RwLock::new(None),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Make embeddings for `reference_texts` available, loading or rebuilding as needed.
    ///
    /// Returns true when usable embeddings are in memory afterwards.
    pub fn ensure(&self, reference_texts: &[String], model: &dyn EmbeddingModel) -> bool {
        self.ensure_with_outcome(reference_texts, model);
        self.current.read().is_some()
    }

    /// Same as [`ensure`](Self::ensure), reporting whether the cache was hit or rebuilt
    pub fn ensure_with_outcome(
        &self,
        reference_texts: &[String],
        model: &dyn EmbeddingModel,
    ) -> CacheOutcome {
        let _guard = self.rebuild_lock.lock();

        match self.load_persisted(reference_texts.len(), model.dimension()) {
            Ok(cached) => {
                if let Some(stored) = cached.metadata.content_digest.as_deref() {
                    if stored != content_digest(&self.normalize_all(reference_texts)) {
                        warn!(
                            rows = reference_texts.len(),
                            "Reference corpus content changed without a row count change; serving cached embeddings"
                        );
                        EMBEDDING_CACHE_EVENTS.with_label_values(&["content_drift"]).inc();
                    }
                }
                EMBEDDING_CACHE_EVENTS.with_label_values(&["hit"]).inc();
                debug!(rows = cached.len(), "Embedding cache hit");
                *self.current.write() = Some(Arc::new(cached));
                CacheOutcome::Hit
            }
            Err(reason) => {
                EMBEDDING_CACHE_EVENTS.with_label_values(&["miss"]).inc();
                info!(reason = %reason, rows = reference_texts.len(), "Embedding cache invalid, rebuilding");
                self.rebuild(self.normalize_all(reference_texts), model);
                CacheOutcome::Rebuilt
            }
        }
    }

    fn normalize_all(&self, texts: &[String]) -> Vec<String> {
        texts.iter().map(|text| self.normalizer.normalize(text)).collect()
    }

    /// Currently loaded embeddings
    pub fn snapshot(&self) -> Option<Arc<CachedEmbeddings>> {
        self.current.read().clone()
    }

    pub fn is_populated(&self) -> bool {
        self.current.read().is_some()
    }

    /// Drop the in-memory embeddings (persisted files are left untouched)
    pub fn clear(&self) {
        *self.current.write() = None;
    }

    fn load_persisted(
        &self,
        expected_rows: usize,
        expected_dim: usize,
    ) -> std::result::Result<CachedEmbeddings, String> {
        let metadata_path = self.dir.join(METADATA_FILE);
        if !metadata_path.exists() {
            return Err("no persisted cache".to_string());
        }

        let metadata: CacheMetadata = fs::read(&metadata_path)
            .map_err(|e| format!("failed to read metadata: {}", e))
            .and_then(|bytes| {
                serde_json::from_slice(&bytes).map_err(|e| format!("corrupt metadata: {}", e))
            })?;

        if metadata.row_count != expected_rows {
            return Err(format!(
                "row count changed from {} to {}",
                metadata.row_count, expected_rows
            ));
        }

        let embeddings: Array2<f32> = read_bincode(&self.dir.join(EMBEDDINGS_FILE))?;
        let texts: Vec<String> = read_bincode(&self.dir.join(TEXTS_FILE))?;

        if embeddings.nrows() != metadata.row_count || texts.len() != metadata.row_count {
            return Err(format!(
                "persisted arrays have {} vectors and {} texts, metadata records {}",
                embeddings.nrows(),
                texts.len(),
                metadata.row_count
            ));
        }
        if embeddings.ncols() != expected_dim || metadata.embedding_dim != expected_dim {
            return Err(format!(
                "persisted dimension {} does not match model dimension {}",
                embeddings.ncols(),
                expected_dim
            ));
        }

        Ok(CachedEmbeddings {
            embeddings,
            texts,
            metadata,
        })
    }

    fn rebuild(&self, cleaned: Vec<String>, model: &dyn EmbeddingModel) {
        let embeddings = model.encode(&cleaned);
        let digest = content_digest(&cleaned);
        let metadata = CacheMetadata {
            row_count: cleaned.len(),
            embedding_dim: embeddings.ncols(),
            computed_at: Some(Utc::now()),
            content_digest: Some(digest),
        };
        let cached = CachedEmbeddings {
            embeddings,
            texts: cleaned,
            metadata,
        };

        EMBEDDING_CACHE_EVENTS.with_label_values(&["rebuild"]).inc();

        if let Err(e) = self.persist(&cached) {
            EMBEDDING_CACHE_EVENTS.with_label_values(&["persist_error"]).inc();
            warn!(error = %e, dir = %self.dir.display(), "Failed to persist embedding cache");
        } else {
            info!(
                rows = cached.metadata.row_count,
                dim = cached.metadata.embedding_dim,
                "Embedding cache persisted"
            );
        }

        *self.current.write() = Some(Arc::new(cached));
    }

    /// Write vectors and texts first, metadata last, each via temp file + rename
    fn persist(&self, cached: &CachedEmbeddings) -> std::result::Result<(), String> {
        fs::create_dir_all(&self.dir).map_err(|e| e.to_string())?;

        let embeddings = bincode::serialize(&cached.embeddings).map_err(|e| e.to_string())?;
        let texts = bincode::serialize(&cached.texts).map_err(|e| e.to_string())?;
        let metadata = serde_json::to_vec_pretty(&cached.metadata).map_err(|e| e.to_string())?;

        write_atomic(&self.dir.join(EMBEDDINGS_FILE), &embeddings)?;
        write_atomic(&self.dir.join(TEXTS_FILE), &texts)?;
        write_atomic(&self.dir.join(METADATA_FILE), &metadata)?;
        Ok(())
    }
}

fn read_bincode<T: serde::de::DeserializeOwned>(path: &Path) -> std::result::Result<T, String> {
    let bytes = fs::read(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    bincode::deserialize(&bytes).map_err(|e| format!("corrupt {}: {}", path.display(), e))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::result::Result<(), String> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));
    fs::write(&tmp, bytes).map_err(|e| format!("failed to write {}: {}", tmp.display(), e))?;
    fs::rename(&tmp, path).map_err(|e| format!("failed to move {}: {}", tmp.display(), e))
}

/// Hex SHA-256 over the corpus, one text per line
pub fn content_digest(texts: &[String]) -> String {
    let mut hasher = Sha256::new();
    for text in texts {
        hasher.update(text.as_bytes());
        hasher.update(b"\n");
    }
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}
