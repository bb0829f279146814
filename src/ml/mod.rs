/// Inference engine for complaint intelligence
///
/// This module provides the model-backed operations behind the service:
/// - Complaint category classification with confidence and keywords
/// - Semantic search over resolved complaints (duplicate detection)
/// - SLA estimation from survival-model coefficients and category priors
/// - Resolution anomaly scoring with an isolation forest
/// - Artifact loading, hot reload and the persistent embedding cache

pub mod anomaly;
pub mod classifier;
pub mod dataset;
pub mod embedding;
pub mod embedding_cache;
pub mod error;
pub mod label_encoder;
pub mod models;
pub mod registry;
pub mod service;
pub mod similarity;
pub mod sla;
pub mod survival;
pub mod text;
pub mod vectorizer;

pub use anomaly::{AnomalyDetector, IsolationForest, OutlierModel};
pub use classifier::{
    load_classifier, Classifier, ComplaintClassifier, ConfidenceLadder, ConfidenceStrategy,
    LinearSvcClassifier, LogisticRegressionClassifier, NearestCentroidClassifier,
};
pub use dataset::{DatasetInfo, ReferenceDataset};
pub use embedding::{cosine_similarity, EmbeddingModel, StaticEmbeddingModel};
pub use embedding_cache::{CacheMetadata, CachedEmbeddings, EmbeddingCache};
pub use error::{ArtifactError, ArtifactResult};
pub use label_encoder::LabelEncoder;
pub use models::{
    AnomalyVerdict, CategoryPrediction, ComplaintAnalysis, EngineConfig, FeatureImportance,
    ModelType, RiskTier, SimilarityBand, SimilarityMatch, SlaEstimate, SlaPortfolio,
};
pub use registry::{ArtifactKind, ArtifactSet, Capabilities, ModelRegistry, ModelStatus};
pub use service::InferenceEngine;
pub use similarity::{SimilaritySearch, SimilarityThresholds};
pub use sla::{SlaBreakdown, SlaEstimator};
pub use survival::SurvivalModel;
pub use text::{StopwordSet, TextNormalizer};
pub use vectorizer::TfidfVectorizer;
