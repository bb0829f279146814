use crate::models::ComplaintCategory;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Inference engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding every model artifact
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Directory holding the reference datasets
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory the embedding cache is persisted to
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Optional newline-separated stopword file
    #[serde(default)]
    pub stopwords_path: Option<PathBuf>,

    /// Fall back to the built-in English stopword list when no file is configured
    #[serde(default = "default_true")]
    pub builtin_stopwords: bool,

    /// Number of similar complaints returned by the analysis pipeline
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Similarity at or above which a match is treated as a duplicate
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f64,

    /// Similarity at or above which a match is treated as moderately similar
    #[serde(default = "default_moderate_threshold")]
    pub moderate_threshold: f64,

    /// Minimum trimmed length of a complaint submitted for analysis
    #[serde(default = "default_min_complaint_chars")]
    pub min_complaint_chars: usize,

    /// SLA threshold in days
    #[serde(default = "default_sla_threshold_days")]
    pub sla_threshold_days: u32,
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("./models")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./models/data")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./models/cache")
}

fn default_true() -> bool {
    true
}

fn default_top_k() -> usize {
    3
}

fn default_duplicate_threshold() -> f64 {
    0.8
}

fn default_moderate_threshold() -> f64 {
    0.6
}

fn default_min_complaint_chars() -> usize {
    10
}

fn default_sla_threshold_days() -> u32 {
    SLA_THRESHOLD_DAYS
}

/// Fixed SLA threshold in days
pub const SLA_THRESHOLD_DAYS: u32 = 7;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            data_dir: default_data_dir(),
            cache_dir: default_cache_dir(),
            stopwords_path: None,
            builtin_stopwords: true,
            default_top_k: default_top_k(),
            duplicate_threshold: default_duplicate_threshold(),
            moderate_threshold: default_moderate_threshold(),
            min_complaint_chars: default_min_complaint_chars(),
            sla_threshold_days: default_sla_threshold_days(),
        }
    }
}

impl EngineConfig {
    /// Configuration rooted at a single directory (`<root>/data`, `<root>/cache`)
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            data_dir: root.join("data"),
            cache_dir: root.join("cache"),
            model_dir: root,
            ..Self::default()
        }
    }
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Logistic regression
    LogisticRegression,

    /// Linear support vector classifier
    LinearSvc,

    /// Nearest centroid
    NearestCentroid,

    /// Cox proportional hazards
    CoxPh,

    /// Weibull accelerated failure time
    WeibullAft,

    /// Isolation forest
    IsolationForest,

    /// Static (pooled word vector) sentence embedding
    StaticEmbedding,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::LogisticRegression => write!(f, "Logistic Regression"),
            ModelType::LinearSvc => write!(f, "Linear SVC"),
            ModelType::NearestCentroid => write!(f, "Nearest Centroid"),
            ModelType::CoxPh => write!(f, "Cox Proportional Hazards"),
            ModelType::WeibullAft => write!(f, "Weibull AFT"),
            ModelType::IsolationForest => write!(f, "Isolation Forest"),
            ModelType::StaticEmbedding => write!(f, "Static Embedding"),
        }
    }
}

/// Classification result for a single complaint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryPrediction {
    /// Predicted category
    pub label: ComplaintCategory,

    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,

    /// Highest-weighted vocabulary terms for the predicted class
    pub top_keywords: Vec<String>,
}

/// Similarity band of a matched complaint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityBand {
    High,
    Moderate,
    Low,
}

impl SimilarityBand {
    pub fn from_score(score: f64, high: f64, moderate: f64) -> Self {
        if score >= high {
            SimilarityBand::High
        } else if score >= moderate {
            SimilarityBand::Moderate
        } else {
            SimilarityBand::Low
        }
    }
}

/// A previously resolved complaint similar to the query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarityMatch {
    /// Row index in the resolved-complaints dataset
    pub source_index: usize,

    /// Cosine similarity (-1.0 - 1.0)
    pub score: f64,

    pub matched_category: String,
    pub matched_text: String,
    pub matched_resolution_text: String,

    /// Recorded resolution time in whole days
    pub matched_resolution_days: Option<u32>,

    pub band: SimilarityBand,
}

/// SLA estimate for a complaint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SlaEstimate {
    /// Predicted median resolution time in days
    pub predicted_median_days: u32,

    /// Probability of breaching the SLA threshold (0.0 - 1.0)
    pub breach_probability: f64,
}

impl SlaEstimate {
    /// Estimate returned when no survival model is loaded
    pub fn fallback() -> Self {
        Self {
            predicted_median_days: 5,
            breach_probability: 0.0,
        }
    }

    pub fn risk_tier(&self) -> RiskTier {
        RiskTier::from_probability(self.breach_probability)
    }
}

/// Breach risk tier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn from_probability(probability: f64) -> Self {
        if probability < 0.3 {
            RiskTier::Low
        } else if probability < 0.6 {
            RiskTier::Medium
        } else {
            RiskTier::High
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTier::Low => write!(f, "Low"),
            RiskTier::Medium => write!(f, "Medium"),
            RiskTier::High => write!(f, "High"),
        }
    }
}

/// Outcome of scoring a resolution record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnomalyVerdict {
    pub is_anomaly: bool,
    pub anomaly_score: f64,
    pub explanation: String,
}

impl AnomalyVerdict {
    pub fn unavailable() -> Self {
        Self {
            is_anomaly: false,
            anomaly_score: 0.0,
            explanation: "Anomaly detection model not available".to_string(),
        }
    }
}

/// Survival-model coefficient with its importance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureImportance {
    pub feature: String,
    pub coefficient: f64,

    /// Absolute coefficient
    pub importance: f64,
}

/// Full analysis of a submitted complaint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintAnalysis {
    pub category: CategoryPrediction,
    pub sla: SlaEstimate,
    pub risk_tier: RiskTier,
    pub similar: Vec<SimilarityMatch>,

    /// Source index of the best match when it is similar enough to be a duplicate
    pub duplicate_of: Option<usize>,
}

/// SLA outlook over a set of complaints
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SlaPortfolio {
    pub total: usize,
    pub low_risk: usize,
    pub medium_risk: usize,
    pub high_risk: usize,

    /// Mean predicted median resolution time
    pub mean_predicted_days: f64,

    pub mean_breach_probability: f64,

    /// Complaints whose predicted median exceeds the SLA threshold.
    ///
    /// Model-based medians are capped below the threshold, so this stays 0 unless the
    /// heuristic changes.
    pub over_threshold: usize,
}
