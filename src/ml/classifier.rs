use crate::error::{AppError, Result};
use crate::ml::error::{ArtifactError, ArtifactResult};
use crate::ml::label_encoder::LabelEncoder;
use crate::ml::models::{CategoryPrediction, ModelType};
use crate::ml::text::TextNormalizer;
use crate::ml::vectorizer::TfidfVectorizer;
use crate::models::ComplaintCategory;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use ndarray_stats::QuantileExt;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Number of keywords reported per prediction
pub const TOP_KEYWORDS: usize = 5;

/// Confidence used when a model exposes neither probabilities nor a usable decision margin
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Trait for loaded complaint classifiers
pub trait Classifier: Send + Sync {
    /// Get model type
    fn model_type(&self) -> ModelType;

    /// Class ids in column order
    fn classes(&self) -> &[i64];

    /// Expected feature vector length
    fn n_features(&self) -> usize;

    /// Predict the class id of a single feature row
    fn predict(&self, features: &Array1<f64>) -> i64;

    /// Calibrated class probabilities, when the model provides them
    fn predict_proba(&self, _features: &Array1<f64>) -> Option<Array1<f64>> {
        None
    }

    /// Raw per-class decision scores, when the model provides them
    fn decision_function(&self, _features: &Array1<f64>) -> Option<Array1<f64>> {
        None
    }

    /// Linear coefficients (rows × features), when the model is linear
    fn coefficients(&self) -> Option<ArrayView2<'_, f64>> {
        None
    }
}

/// How a logistic regression combines its per-class scores
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MultiClass {
    #[default]
    Multinomial,
    Ovr,
}

/// Shared weights of a linear model
#[derive(Debug, Clone)]
struct LinearWeights {
    classes: Vec<i64>,
    coef: Array2<f64>,
    intercept: Array1<f64>,
}

impl LinearWeights {
    fn decision(&self, features: &Array1<f64>) -> Array1<f64> {
        self.coef.dot(features) + &self.intercept
    }

    fn predict(&self, features: &Array1<f64>) -> i64 {
        let scores = self.decision(features);
        if self.coef.nrows() == 1 {
            let positive = scores[0] > 0.0;
            return self.classes[usize::from(positive)];
        }
        let idx = scores.argmax().unwrap_or(0);
        self.classes[idx]
    }
}

/// Logistic regression classifier
#[derive(Debug, Clone)]
pub struct LogisticRegressionClassifier {
    weights: LinearWeights,
    multi_class: MultiClass,
}

impl Classifier for LogisticRegressionClassifier {
    fn model_type(&self) -> ModelType {
        ModelType::LogisticRegression
    }

    fn classes(&self) -> &[i64] {
        &self.weights.classes
    }

    fn n_features(&self) -> usize {
        self.weights.coef.ncols()
    }

    fn predict(&self, features: &Array1<f64>) -> i64 {
        self.weights.predict(features)
    }

    fn predict_proba(&self, features: &Array1<f64>) -> Option<Array1<f64>> {
        let scores = self.weights.decision(features);

        if scores.len() == 1 {
            let p = sigmoid(scores[0]);
            return Some(Array1::from(vec![1.0 - p, p]));
        }

        let proba = match self.multi_class {
            MultiClass::Multinomial => {
                let max = scores.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
                let exp = scores.mapv(|v| (v - max).exp());
                let sum = exp.sum();
                exp / sum
            }
            MultiClass::Ovr => {
                let raw = scores.mapv(sigmoid);
                let sum = raw.sum();
                if sum > 0.0 {
                    raw / sum
                } else {
                    raw
                }
            }
        };
        Some(proba)
    }

    fn decision_function(&self, features: &Array1<f64>) -> Option<Array1<f64>> {
        Some(self.weights.decision(features))
    }

    fn coefficients(&self) -> Option<ArrayView2<'_, f64>> {
        Some(self.weights.coef.view())
    }
}

/// Linear support vector classifier (no probability calibration)
#[derive(Debug, Clone)]
pub struct LinearSvcClassifier {
    weights: LinearWeights,
}

impl Classifier for LinearSvcClassifier {
    fn model_type(&self) -> ModelType {
        ModelType::LinearSvc
    }

    fn classes(&self) -> &[i64] {
        &self.weights.classes
    }

    fn n_features(&self) -> usize {
        self.weights.coef.ncols()
    }

    fn predict(&self, features: &Array1<f64>) -> i64 {
        self.weights.predict(features)
    }

    fn decision_function(&self, features: &Array1<f64>) -> Option<Array1<f64>> {
        Some(self.weights.decision(features))
    }

    fn coefficients(&self) -> Option<ArrayView2<'_, f64>> {
        Some(self.weights.coef.view())
    }
}

/// Nearest centroid classifier (prediction only)
#[derive(Debug, Clone)]
pub struct NearestCentroidClassifier {
    classes: Vec<i64>,
    centroids: Array2<f64>,
}

impl Classifier for NearestCentroidClassifier {
    fn model_type(&self) -> ModelType {
        ModelType::NearestCentroid
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.centroids.ncols()
    }

    fn predict(&self, features: &Array1<f64>) -> i64 {
        let distances: Array1<f64> = self
            .centroids
            .axis_iter(Axis(0))
            .map(|centroid| {
                centroid
                    .iter()
                    .zip(features.iter())
                    .map(|(c, x)| (c - x).powi(2))
                    .sum::<f64>()
            })
            .collect();
        let idx = distances.argmin().unwrap_or(0);
        self.classes[idx]
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// On-disk classifier artifact
#[derive(Debug, Deserialize)]
#[serde(tag = "model_type", rename_all = "snake_case")]
enum ClassifierArtifact {
    LogisticRegression {
        classes: Vec<i64>,
        coef: Vec<Vec<f64>>,
        intercept: Vec<f64>,
        #[serde(default)]
        multi_class: MultiClass,
    },
    LinearSvc {
        classes: Vec<i64>,
        coef: Vec<Vec<f64>>,
        intercept: Vec<f64>,
    },
    NearestCentroid {
        classes: Vec<i64>,
        centroids: Vec<Vec<f64>>,
    },
}

/// Build a dense matrix from row vectors of equal length
pub(crate) fn matrix_from_rows(rows: Vec<Vec<f64>>) -> std::result::Result<Array2<f64>, String> {
    let n_rows = rows.len();
    let n_cols = rows.first().map(Vec::len).unwrap_or(0);
    if let Some(bad) = rows.iter().position(|row| row.len() != n_cols) {
        return Err(format!(
            "row {} has {} values, expected {}",
            bad,
            rows[bad].len(),
            n_cols
        ));
    }
    let data: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n_rows, n_cols), data).map_err(|e| e.to_string())
}

fn linear_weights(
    classes: Vec<i64>,
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
) -> std::result::Result<LinearWeights, String> {
    let coef = matrix_from_rows(coef)?;
    let expected_rows = if classes.len() == 2 { 1 } else { classes.len() };
    if classes.len() < 2 {
        return Err(format!("expected at least 2 classes, found {}", classes.len()));
    }
    if coef.nrows() != expected_rows && coef.nrows() != classes.len() {
        return Err(format!(
            "coef has {} rows for {} classes",
            coef.nrows(),
            classes.len()
        ));
    }
    if intercept.len() != coef.nrows() {
        return Err(format!(
            "intercept has {} values for {} coefficient rows",
            intercept.len(),
            coef.nrows()
        ));
    }
    Ok(LinearWeights {
        classes,
        coef,
        intercept: Array1::from(intercept),
    })
}

/// Load a classifier artifact
pub fn load_classifier(path: &Path) -> ArtifactResult<Arc<dyn Classifier>> {
    let artifact: ClassifierArtifact = crate::ml::error::read_json_artifact(path)?;

    let model: Arc<dyn Classifier> = match artifact {
        ClassifierArtifact::LogisticRegression {
            classes,
            coef,
            intercept,
            multi_class,
        } => Arc::new(LogisticRegressionClassifier {
            weights: linear_weights(classes, coef, intercept)
                .map_err(|reason| ArtifactError::incompatible(path, reason))?,
            multi_class,
        }),
        ClassifierArtifact::LinearSvc {
            classes,
            coef,
            intercept,
        } => Arc::new(LinearSvcClassifier {
            weights: linear_weights(classes, coef, intercept)
                .map_err(|reason| ArtifactError::incompatible(path, reason))?,
        }),
        ClassifierArtifact::NearestCentroid { classes, centroids } => {
            let centroids = matrix_from_rows(centroids)
                .map_err(|reason| ArtifactError::incompatible(path, reason))?;
            if centroids.nrows() != classes.len() || classes.is_empty() {
                return Err(ArtifactError::incompatible(
                    path,
                    format!("{} centroids for {} classes", centroids.nrows(), classes.len()),
                ));
            }
            Arc::new(NearestCentroidClassifier { classes, centroids })
        }
    };

    Ok(model)
}

/// Where a prediction's confidence came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceSource {
    Probability,
    DecisionMargin,
    Fixed,
}

/// Predicted class with its confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPrediction {
    pub class_id: i64,
    pub confidence: f64,
    pub source: ConfidenceSource,
}

/// One step of the confidence fallback chain
pub trait ConfidenceStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Score the row, or `None` to defer to the next strategy
    fn score(&self, model: &dyn Classifier, features: &Array1<f64>) -> Option<ScoredPrediction>;
}

/// Arg-max of calibrated class probabilities
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbabilityStrategy;

impl ConfidenceStrategy for ProbabilityStrategy {
    fn name(&self) -> &'static str {
        "probability"
    }

    fn score(&self, model: &dyn Classifier, features: &Array1<f64>) -> Option<ScoredPrediction> {
        let proba = model.predict_proba(features)?;
        let idx = proba.argmax().ok()?;
        let class_id = *model.classes().get(idx)?;
        let confidence = proba[idx];
        if !confidence.is_finite() {
            return None;
        }
        Some(ScoredPrediction {
            class_id,
            confidence: confidence.clamp(0.0, 1.0),
            source: ConfidenceSource::Probability,
        })
    }
}

/// Predicted class's decision score rescaled by the min/max spread of all scores
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionMarginStrategy;

impl ConfidenceStrategy for DecisionMarginStrategy {
    fn name(&self) -> &'static str {
        "decision_margin"
    }

    fn score(&self, model: &dyn Classifier, features: &Array1<f64>) -> Option<ScoredPrediction> {
        let scores = model.decision_function(features)?;
        let max = *scores.max().ok()?;
        let min = *scores.min().ok()?;
        if max == min {
            return None;
        }

        let class_id = model.predict(features);
        let idx = model
            .classes()
            .iter()
            .position(|&c| c == class_id)
            .unwrap_or(0);
        let margin = (*scores.get(idx)? - min) / (max - min);
        if !margin.is_finite() {
            return None;
        }
        Some(ScoredPrediction {
            class_id,
            confidence: margin.clamp(0.0, 1.0),
            source: ConfidenceSource::DecisionMargin,
        })
    }
}

/// Constant confidence, always applicable
#[derive(Debug, Clone, Copy)]
pub struct FixedConfidence(pub f64);

impl Default for FixedConfidence {
    fn default() -> Self {
        FixedConfidence(DEFAULT_CONFIDENCE)
    }
}

impl ConfidenceStrategy for FixedConfidence {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn score(&self, model: &dyn Classifier, features: &Array1<f64>) -> Option<ScoredPrediction> {
        Some(ScoredPrediction {
            class_id: model.predict(features),
            confidence: self.0,
            source: ConfidenceSource::Fixed,
        })
    }
}

/// Ordered confidence strategies; the first one that applies wins
pub struct ConfidenceLadder {
    strategies: Vec<Box<dyn ConfidenceStrategy>>,
}

impl ConfidenceLadder {
    pub fn new(strategies: Vec<Box<dyn ConfidenceStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn score(&self, model: &dyn Classifier, features: &Array1<f64>) -> ScoredPrediction {
        for strategy in &self.strategies {
            if let Some(scored) = strategy.score(model, features) {
                debug!(strategy = strategy.name(), confidence = scored.confidence, "Scored prediction");
                return scored;
            }
        }
        FixedConfidence::default()
            .score(model, features)
            .unwrap_or(ScoredPrediction {
                class_id: model.predict(features),
                confidence: DEFAULT_CONFIDENCE,
                source: ConfidenceSource::Fixed,
            })
    }
}

impl Default for ConfidenceLadder {
    fn default() -> Self {
        Self::new(vec![
            Box::new(ProbabilityStrategy),
            Box::new(DecisionMarginStrategy),
            Box::new(FixedConfidence::default()),
        ])
    }
}

/// Highest-weighted terms of the predicted class, descending
pub fn top_keywords(
    model: &dyn Classifier,
    feature_names: &[String],
    class_id: i64,
    n: usize,
) -> Vec<String> {
    let Some(coef) = model.coefficients() else {
        return Vec::new();
    };
    if coef.nrows() != model.classes().len() || coef.ncols() != feature_names.len() {
        return Vec::new();
    }
    let Some(row_idx) = model.classes().iter().position(|&c| c == class_id) else {
        return Vec::new();
    };

    let row = coef.row(row_idx);
    let mut order: Vec<usize> = (0..row.len()).collect();
    order.sort_by(|&a, &b| row[b].total_cmp(&row[a]).then(b.cmp(&a)));
    order
        .into_iter()
        .take(n)
        .map(|idx| feature_names[idx].clone())
        .collect()
}

/// Complaint classifier: normalize, vectorize, predict
#[derive(Clone)]
pub struct ComplaintClassifier {
    model: Arc<dyn Classifier>,
    vectorizer: Arc<TfidfVectorizer>,
    label_encoder: Arc<LabelEncoder>,
    normalizer: Arc<TextNormalizer>,
    ladder: Arc<ConfidenceLadder>,
}

impl ComplaintClassifier {
    pub fn new(
        model: Arc<dyn Classifier>,
        vectorizer: Arc<TfidfVectorizer>,
        label_encoder: Arc<LabelEncoder>,
        normalizer: Arc<TextNormalizer>,
    ) -> Self {
        Self {
            model,
            vectorizer,
            label_encoder,
            normalizer,
            ladder: Arc::new(ConfidenceLadder::default()),
        }
    }

    /// Assemble a classifier from optional artifacts, failing when any core artifact is absent
    pub fn from_parts(
        model: Option<Arc<dyn Classifier>>,
        vectorizer: Option<Arc<TfidfVectorizer>>,
        label_encoder: Option<Arc<LabelEncoder>>,
        normalizer: Arc<TextNormalizer>,
    ) -> Result<Self> {
        let missing: Vec<&str> = [
            ("classifier", model.is_none()),
            ("vectorizer", vectorizer.is_none()),
            ("label_encoder", label_encoder.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        match (model, vectorizer, label_encoder) {
            (Some(model), Some(vectorizer), Some(label_encoder)) => {
                Ok(Self::new(model, vectorizer, label_encoder, normalizer))
            }
            _ => Err(AppError::ModelsUnavailable(format!(
                "core models not loaded: {}",
                missing.join(", ")
            ))),
        }
    }

    pub fn with_ladder(mut self, ladder: ConfidenceLadder) -> Self {
        self.ladder = Arc::new(ladder);
        self
    }

    pub fn model_type(&self) -> ModelType {
        self.model.model_type()
    }

    pub fn label_encoder(&self) -> &LabelEncoder {
        &self.label_encoder
    }

    /// Classify raw complaint text
    pub fn classify(&self, text: &str) -> Result<CategoryPrediction> {
        if self.vectorizer.n_features() != self.model.n_features() {
            return Err(AppError::Artifact {
                artifact: "classifier".to_string(),
                message: format!(
                    "vectorizer produces {} features but classifier expects {}",
                    self.vectorizer.n_features(),
                    self.model.n_features()
                ),
            });
        }

        let cleaned = self.normalizer.normalize(text);
        let features = self.vectorizer.transform(&cleaned);
        let scored = self.ladder.score(self.model.as_ref(), &features);

        let top_keywords = top_keywords(
            self.model.as_ref(),
            self.vectorizer.feature_names(),
            scored.class_id,
            TOP_KEYWORDS,
        );

        Ok(CategoryPrediction {
            label: ComplaintCategory::from_class_id(scored.class_id),
            confidence: scored.confidence,
            top_keywords,
        })
    }
}
