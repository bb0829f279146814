//! Registry of every loaded model artifact.
//!
//! Loading is best-effort: each artifact is attempted independently and a failure only
//! disables the capabilities that depend on it.

use crate::metrics::ARTIFACTS_LOADED;
use crate::ml::anomaly::{IsolationForest, OutlierModel};
use crate::ml::classifier::{load_classifier, Classifier};
use crate::ml::dataset::{ReferenceDataset, COMPLAINT_TEXT};
use crate::ml::embedding::{EmbeddingModel, StaticEmbeddingModel};
use crate::ml::embedding_cache::{CachedEmbeddings, EmbeddingCache};
use crate::ml::error::ArtifactResult;
use crate::ml::label_encoder::LabelEncoder;
use crate::ml::models::EngineConfig;
use crate::ml::survival::SurvivalModel;
use crate::ml::text::{StopwordSet, TextNormalizer};
use crate::ml::vectorizer::TfidfVectorizer;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strum::{Display, EnumIter, IntoEnumIterator};
use tracing::{info, warn};

/// Every artifact the registry knows how to load
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactKind {
    Classifier,
    Vectorizer,
    LabelEncoder,
    EmbeddingModel,
    SurvivalModel,
    SlaFeatures,
    AnomalyModel,
    ProgramEncoder,
    DepartmentEncoder,
    ComplaintsDataset,
    ResolvedDataset,
}

impl ArtifactKind {
    /// File (or directory) name under its root directory
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Classifier => "classifier.json",
            ArtifactKind::Vectorizer => "vectorizer.json",
            ArtifactKind::LabelEncoder => "label_encoder.json",
            ArtifactKind::EmbeddingModel => "sbert_duplicate_model",
            ArtifactKind::SurvivalModel => "sla_survival_model.json",
            ArtifactKind::SlaFeatures => "sla_features.json",
            ArtifactKind::AnomalyModel => "anomaly_model.json",
            ArtifactKind::ProgramEncoder => "le_student_program.json",
            ArtifactKind::DepartmentEncoder => "le_faculty_department.json",
            ArtifactKind::ComplaintsDataset => "complaints.csv",
            ArtifactKind::ResolvedDataset => "resolved_complaints.csv",
        }
    }

    /// Fixed path of the artifact for a configuration
    pub fn path(&self, config: &EngineConfig) -> PathBuf {
        match self {
            ArtifactKind::ComplaintsDataset | ArtifactKind::ResolvedDataset => {
                config.data_dir.join(self.file_name())
            }
            _ => config.model_dir.join(self.file_name()),
        }
    }
}

/// Outcome of one artifact load attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactLoadResult {
    pub name: ArtifactKind,
    pub loaded: bool,
    pub detail: String,
}

/// Capabilities derived from which artifacts loaded
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Capabilities {
    pub classification: bool,
    pub similarity_search: bool,
    pub sla_model: bool,
    pub anomaly_detection: bool,
}

/// Diagnostic snapshot of the registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelStatus {
    pub artifacts: Vec<ArtifactLoadResult>,
    pub capabilities: Capabilities,
    pub classifier_type: Option<String>,
    pub classes: Option<Vec<i64>>,
    pub resolved_complaints_count: Option<usize>,
    pub complaints_count: Option<usize>,
    pub embeddings_cached: bool,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl ModelStatus {
    pub fn is_loaded(&self, kind: ArtifactKind) -> bool {
        self.artifacts
            .iter()
            .any(|result| result.name == kind && result.loaded)
    }

    /// Load results that failed
    pub fn failures(&self) -> impl Iterator<Item = &ArtifactLoadResult> {
        self.artifacts.iter().filter(|result| !result.loaded)
    }

    pub fn loaded_count(&self) -> usize {
        self.artifacts.iter().filter(|result| result.loaded).count()
    }

    /// Flat `<artifact>_loaded` flag view
    pub fn flags(&self) -> BTreeMap<String, bool> {
        let mut flags: BTreeMap<String, bool> = self
            .artifacts
            .iter()
            .map(|result| (format!("{}_loaded", result.name), result.loaded))
            .collect();
        flags.insert("embeddings_cached".to_string(), self.embeddings_cached);
        flags
    }
}

/// Handles to loaded artifacts; any of them may be absent
#[derive(Clone, Default)]
pub struct ArtifactSet {
    pub classifier: Option<Arc<dyn Classifier>>,
    pub vectorizer: Option<Arc<TfidfVectorizer>>,
    pub label_encoder: Option<Arc<LabelEncoder>>,
    pub embedding_model: Option<Arc<dyn EmbeddingModel>>,
    pub survival_model: Option<Arc<SurvivalModel>>,
    pub sla_features: Option<Arc<Vec<String>>>,
    pub anomaly_model: Option<Arc<dyn OutlierModel>>,
    pub program_encoder: Option<Arc<LabelEncoder>>,
    pub department_encoder: Option<Arc<LabelEncoder>>,
    pub complaints: Option<Arc<ReferenceDataset>>,
    pub resolved: Option<Arc<ReferenceDataset>>,
}

impl ArtifactSet {
    /// Attempt every artifact load, collecting one result per artifact
    pub fn load(config: &EngineConfig) -> (Self, Vec<ArtifactLoadResult>) {
        let mut results = Vec::with_capacity(ArtifactKind::iter().count());

        let set = ArtifactSet {
            classifier: try_load(&mut results, ArtifactKind::Classifier, config, load_classifier),
            vectorizer: try_load(&mut results, ArtifactKind::Vectorizer, config, |p| {
                TfidfVectorizer::load(p).map(Arc::new)
            }),
            label_encoder: try_load(&mut results, ArtifactKind::LabelEncoder, config, |p| {
                LabelEncoder::load(p).map(Arc::new)
            }),
            embedding_model: try_load(&mut results, ArtifactKind::EmbeddingModel, config, |p| {
                StaticEmbeddingModel::load(p).map(|m| Arc::new(m) as Arc<dyn EmbeddingModel>)
            }),
            survival_model: try_load(&mut results, ArtifactKind::SurvivalModel, config, |p| {
                SurvivalModel::load(p).map(Arc::new)
            }),
            sla_features: try_load(&mut results, ArtifactKind::SlaFeatures, config, |p| {
                crate::ml::error::read_json_artifact::<Vec<String>>(p).map(Arc::new)
            }),
            anomaly_model: try_load(&mut results, ArtifactKind::AnomalyModel, config, |p| {
                IsolationForest::load(p).map(|f| Arc::new(f) as Arc<dyn OutlierModel>)
            }),
            program_encoder: try_load(&mut results, ArtifactKind::ProgramEncoder, config, |p| {
                LabelEncoder::load(p).map(Arc::new)
            }),
            department_encoder: try_load(&mut results, ArtifactKind::DepartmentEncoder, config, |p| {
                LabelEncoder::load(p).map(Arc::new)
            }),
            complaints: try_load(&mut results, ArtifactKind::ComplaintsDataset, config, |p| {
                ReferenceDataset::load("complaints", p).map(Arc::new)
            }),
            resolved: try_load(&mut results, ArtifactKind::ResolvedDataset, config, |p| {
                ReferenceDataset::load("resolved_complaints", p).map(Arc::new)
            }),
        };

        (set, results)
    }

    /// Load results describing which handles of a hand-assembled set are present
    pub fn presence(&self) -> Vec<ArtifactLoadResult> {
        ArtifactKind::iter()
            .map(|kind| {
                let loaded = self.has(kind);
                ArtifactLoadResult {
                    name: kind,
                    loaded,
                    detail: if loaded { "provided" } else { "not provided" }.to_string(),
                }
            })
            .collect()
    }

    pub fn has(&self, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::Classifier => self.classifier.is_some(),
            ArtifactKind::Vectorizer => self.vectorizer.is_some(),
            ArtifactKind::LabelEncoder => self.label_encoder.is_some(),
            ArtifactKind::EmbeddingModel => self.embedding_model.is_some(),
            ArtifactKind::SurvivalModel => self.survival_model.is_some(),
            ArtifactKind::SlaFeatures => self.sla_features.is_some(),
            ArtifactKind::AnomalyModel => self.anomaly_model.is_some(),
            ArtifactKind::ProgramEncoder => self.program_encoder.is_some(),
            ArtifactKind::DepartmentEncoder => self.department_encoder.is_some(),
            ArtifactKind::ComplaintsDataset => self.complaints.is_some(),
            ArtifactKind::ResolvedDataset => self.resolved.is_some(),
        }
    }
}

fn try_load<T>(
    results: &mut Vec<ArtifactLoadResult>,
    kind: ArtifactKind,
    config: &EngineConfig,
    loader: impl FnOnce(&Path) -> ArtifactResult<T>,
) -> Option<T> {
    let path = kind.path(config);
    match loader(&path) {
        Ok(artifact) => {
            info!(artifact = %kind, path = %path.display(), "Artifact loaded");
            results.push(ArtifactLoadResult {
                name: kind,
                loaded: true,
                detail: format!("loaded from {}", path.display()),
            });
            Some(artifact)
        }
        Err(e) => {
            warn!(artifact = %kind, error = %e, "Artifact unavailable, continuing without it");
            results.push(ArtifactLoadResult {
                name: kind,
                loaded: false,
                detail: e.to_string(),
            });
            None
        }
    }
}

/// Process-wide model registry
pub struct ModelRegistry {
    config: EngineConfig,
    normalizer: Arc<TextNormalizer>,
    artifacts: RwLock<Arc<ArtifactSet>>,
    status: RwLock<ModelStatus>,
    cache: EmbeddingCache,
    load_lock: Mutex<()>,
}

impl ModelRegistry {
    /// Create an empty registry; call [`load`](Self::load) to populate it.
    ///
    /// The stopword corpus is resolved here once. Cached reference texts are normalised with
    /// it, so reloads keep the same normaliser.
    pub fn new(config: EngineConfig) -> Self {
        let stopwords = StopwordSet::resolve(config.stopwords_path.as_deref(), config.builtin_stopwords);
        let normalizer = Arc::new(TextNormalizer::new(stopwords));
        let cache = EmbeddingCache::new(config.cache_dir.clone(), normalizer.clone());

        Self {
            config,
            normalizer,
            artifacts: RwLock::new(Arc::new(ArtifactSet::default())),
            status: RwLock::new(ModelStatus::default()),
            cache,
            load_lock: Mutex::new(()),
        }
    }

    /// Registry over an already assembled artifact set (e.g. test doubles)
    pub fn with_artifacts(config: EngineConfig, artifacts: ArtifactSet) -> Self {
        let registry = Self::new(config);
        let results = artifacts.presence();
        {
            let _guard = registry.load_lock.lock();
            registry.install(artifacts, results);
        }
        registry
    }

    /// Attempt every artifact load and refresh the embedding cache.
    ///
    /// Never fails; per-artifact problems are reported in the returned status.
    pub fn load(&self) -> ModelStatus {
        let _guard = self.load_lock.lock();
        info!(model_dir = %self.config.model_dir.display(), "Loading model artifacts");

        let (artifacts, results) = ArtifactSet::load(&self.config);
        let status = self.install(artifacts, results);

        info!(
            loaded = status.loaded_count(),
            total = status.artifacts.len(),
            classification = status.capabilities.classification,
            similarity_search = status.capabilities.similarity_search,
            "Model artifacts loaded"
        );
        status
    }

    /// Re-run every load attempt (the stopword corpus stays as resolved at construction)
    pub fn reload(&self) -> ModelStatus {
        self.load()
    }

    fn install(&self, artifacts: ArtifactSet, results: Vec<ArtifactLoadResult>) -> ModelStatus {
        let embeddings_cached = match (&artifacts.embedding_model, &artifacts.resolved) {
            (Some(model), Some(resolved)) => match resolved.column_values(COMPLAINT_TEXT) {
                Some(texts) => self.cache.ensure(&texts, model.as_ref()),
                None => {
                    warn!(column = COMPLAINT_TEXT, "Resolved dataset lacks the text column; similarity search disabled");
                    self.cache.clear();
                    false
                }
            },
            _ => {
                self.cache.clear();
                false
            }
        };

        let status = ModelStatus {
            capabilities: Capabilities {
                classification: artifacts.classifier.is_some()
                    && artifacts.vectorizer.is_some()
                    && artifacts.label_encoder.is_some(),
                similarity_search: embeddings_cached,
                sla_model: artifacts.survival_model.is_some() && artifacts.sla_features.is_some(),
                anomaly_detection: artifacts.anomaly_model.is_some(),
            },
            classifier_type: artifacts
                .classifier
                .as_ref()
                .map(|model| model.model_type().to_string()),
            classes: artifacts
                .classifier
                .as_ref()
                .map(|model| model.classes().to_vec()),
            resolved_complaints_count: artifacts.resolved.as_ref().map(|d| d.len()),
            complaints_count: artifacts.complaints.as_ref().map(|d| d.len()),
            embeddings_cached,
            loaded_at: Some(Utc::now()),
            artifacts: results,
        };

        ARTIFACTS_LOADED.set(status.loaded_count() as f64);
        *self.artifacts.write() = Arc::new(artifacts);
        *self.status.write() = status.clone();
        status
    }

    /// Snapshot of the last load
    pub fn status(&self) -> ModelStatus {
        self.status.read().clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn normalizer(&self) -> Arc<TextNormalizer> {
        self.normalizer.clone()
    }

    /// Current artifact set
    pub fn artifacts(&self) -> Arc<ArtifactSet> {
        self.artifacts.read().clone()
    }

    pub fn embeddings(&self) -> Option<Arc<CachedEmbeddings>> {
        self.cache.snapshot()
    }

    pub fn classifier(&self) -> Option<Arc<dyn Classifier>> {
        self.artifacts().classifier.clone()
    }

    pub fn vectorizer(&self) -> Option<Arc<TfidfVectorizer>> {
        self.artifacts().vectorizer.clone()
    }

    pub fn label_encoder(&self) -> Option<Arc<LabelEncoder>> {
        self.artifacts().label_encoder.clone()
    }

    pub fn embedding_model(&self) -> Option<Arc<dyn EmbeddingModel>> {
        self.artifacts().embedding_model.clone()
    }

    pub fn survival_model(&self) -> Option<Arc<SurvivalModel>> {
        self.artifacts().survival_model.clone()
    }

    pub fn sla_features(&self) -> Option<Arc<Vec<String>>> {
        self.artifacts().sla_features.clone()
    }

    pub fn anomaly_model(&self) -> Option<Arc<dyn OutlierModel>> {
        self.artifacts().anomaly_model.clone()
    }

    pub fn program_encoder(&self) -> Option<Arc<LabelEncoder>> {
        self.artifacts().program_encoder.clone()
    }

    pub fn department_encoder(&self) -> Option<Arc<LabelEncoder>> {
        self.artifacts().department_encoder.clone()
    }

    pub fn complaints(&self) -> Option<Arc<ReferenceDataset>> {
        self.artifacts().complaints.clone()
    }

    pub fn resolved_complaints(&self) -> Option<Arc<ReferenceDataset>> {
        self.artifacts().resolved.clone()
    }
}
