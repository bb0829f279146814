use crate::error::{AppError, Result};
use crate::metrics::{INFERENCE_DURATION_SECONDS, INFERENCE_REQUESTS_TOTAL};
use crate::ml::anomaly::AnomalyDetector;
use crate::ml::classifier::ComplaintClassifier;
use crate::ml::dataset::DatasetInfo;
use crate::ml::models::{
    AnomalyVerdict, CategoryPrediction, ComplaintAnalysis, EngineConfig, FeatureImportance,
    RiskTier, SimilarityMatch, SlaEstimate, SlaPortfolio,
};
use crate::ml::registry::{ModelRegistry, ModelStatus};
use crate::ml::similarity::{SimilaritySearch, SimilarityThresholds};
use crate::ml::sla::{SlaBreakdown, SlaEstimator};
use crate::models::{ComplaintCategory, ComplaintRecord, ResolutionRecord};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use validator::Validate;

/// Department assumed when a complaint record carries none
const DEFAULT_DEPARTMENT: &str = "Computer Science";

/// Complaint inference engine
#[derive(Clone)]
pub struct InferenceEngine {
    registry: Arc<ModelRegistry>,
}

impl InferenceEngine {
    /// Create an engine with an empty registry
    pub fn new(config: EngineConfig) -> Self {
        Self::from_registry(Arc::new(ModelRegistry::new(config)))
    }

    pub fn from_registry(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    fn config(&self) -> &EngineConfig {
        self.registry.config()
    }

    /// Load every artifact (startup)
    pub fn load(&self) -> ModelStatus {
        let status = self.registry.load();
        for failure in status.failures() {
            debug!(artifact = %failure.name, detail = %failure.detail, "Artifact not loaded");
        }
        status
    }

    /// Re-run every artifact load and refresh the embedding cache
    pub fn reload(&self) -> ModelStatus {
        info!("Reloading model artifacts");
        let start = Instant::now();
        let status = self.registry.reload();
        record("reload", "ok", start);
        status
    }

    pub fn status(&self) -> ModelStatus {
        self.registry.status()
    }

    fn classifier(&self) -> Result<ComplaintClassifier> {
        let artifacts = self.registry.artifacts();
        ComplaintClassifier::from_parts(
            artifacts.classifier.clone(),
            artifacts.vectorizer.clone(),
            artifacts.label_encoder.clone(),
            self.registry.normalizer(),
        )
    }

    fn similarity(&self) -> SimilaritySearch {
        let artifacts = self.registry.artifacts();
        SimilaritySearch::new(
            artifacts.embedding_model.clone(),
            artifacts.resolved.clone(),
            self.registry.embeddings(),
            self.registry.normalizer(),
        )
        .with_thresholds(SimilarityThresholds {
            high: self.config().duplicate_threshold,
            moderate: self.config().moderate_threshold,
        })
    }

    fn sla(&self) -> SlaEstimator {
        let artifacts = self.registry.artifacts();
        SlaEstimator::new(artifacts.survival_model.clone(), artifacts.sla_features.clone())
            .with_threshold(self.config().sla_threshold_days)
    }

    fn anomaly(&self) -> AnomalyDetector {
        let artifacts = self.registry.artifacts();
        AnomalyDetector::new(
            artifacts.anomaly_model.clone(),
            artifacts.program_encoder.clone(),
            artifacts.department_encoder.clone(),
        )
    }

    /// Classify complaint text; fails when a core classification artifact is missing
    pub fn classify(&self, text: &str) -> Result<CategoryPrediction> {
        let start = Instant::now();
        let result = self.classifier().and_then(|classifier| classifier.classify(text));

        match &result {
            Ok(prediction) => {
                debug!(
                    label = %prediction.label,
                    confidence = prediction.confidence,
                    "Complaint classified"
                );
                record("classify", "ok", start);
            }
            Err(e) => {
                warn!(error = %e, "Classification failed");
                record("classify", "error", start);
            }
        }
        result
    }

    /// Resolved complaints most similar to `text`; empty when similarity search is unavailable
    pub fn find_similar(&self, text: &str, top_k: usize) -> Vec<SimilarityMatch> {
        let start = Instant::now();
        let search = self.similarity();
        let outcome = if search.is_available() { "ok" } else { "degraded" };
        let matches = search.find_similar(text, top_k);
        record("find_similar", outcome, start);
        matches
    }

    pub fn estimate_sla(&self, category: &str, department: &str) -> SlaEstimate {
        self.explain_sla(category, department).estimate
    }

    /// SLA estimate with the intermediate values that produced it
    pub fn explain_sla(&self, category: &str, department: &str) -> SlaBreakdown {
        let start = Instant::now();
        let estimator = self.sla();
        let outcome = if estimator.is_available() { "ok" } else { "degraded" };
        let breakdown = estimator.explain(category, department);
        debug!(
            category,
            department,
            days = breakdown.estimate.predicted_median_days,
            coefficient_score = breakdown.coefficient_score,
            "SLA estimated"
        );
        record("estimate_sla", outcome, start);
        breakdown
    }

    pub fn detect_anomaly(&self, record_in: &ResolutionRecord) -> AnomalyVerdict {
        let start = Instant::now();
        let detector = self.anomaly();
        let outcome = if detector.is_available() { "ok" } else { "degraded" };
        let verdict = detector.detect(record_in);
        record("detect_anomaly", outcome, start);
        verdict
    }

    /// Classify, search for duplicates and estimate SLA for a submitted complaint
    pub fn analyze(&self, complaint: &ComplaintRecord) -> Result<ComplaintAnalysis> {
        complaint.validate()?;
        let min_chars = self.config().min_complaint_chars;
        if complaint.text.trim().chars().count() < min_chars {
            return Err(AppError::Validation(format!(
                "complaint text must be at least {} characters",
                min_chars
            )));
        }

        let start = Instant::now();
        let category = match self.classify(&complaint.text) {
            Ok(category) => category,
            Err(e) => {
                record("analyze", "error", start);
                return Err(e);
            }
        };

        let similar = self.find_similar(&complaint.text, self.config().default_top_k);
        let duplicate_of = similar
            .first()
            .filter(|best| best.score >= self.config().duplicate_threshold)
            .map(|best| best.source_index);

        let sla = self.estimate_sla(&category.label.to_string(), complaint.department_or_empty());

        if let Some(index) = duplicate_of {
            info!(source_index = index, "Complaint looks like a duplicate of a resolved complaint");
        }
        record("analyze", "ok", start);

        Ok(ComplaintAnalysis {
            risk_tier: sla.risk_tier(),
            category,
            sla,
            similar,
            duplicate_of,
        })
    }

    /// SLA outlook over a set of complaints using their recorded category and department
    pub fn summarize_sla(&self, complaints: &[ComplaintRecord]) -> SlaPortfolio {
        let start = Instant::now();
        let estimator = self.sla();

        let mut portfolio = SlaPortfolio {
            total: complaints.len(),
            ..Default::default()
        };
        if complaints.is_empty() {
            return portfolio;
        }

        let threshold = estimator.threshold_days();
        let mut total_days = 0.0;
        let mut total_breach = 0.0;

        for complaint in complaints {
            let category = complaint
                .category
                .as_deref()
                .map(ComplaintCategory::from_stored)
                .unwrap_or(ComplaintCategory::CalculationDiscrepancy);
            let department = complaint
                .department
                .as_deref()
                .filter(|d| !d.is_empty())
                .unwrap_or(DEFAULT_DEPARTMENT);

            let estimate = estimator.estimate(&category.to_string(), department);
            match estimate.risk_tier() {
                RiskTier::Low => portfolio.low_risk += 1,
                RiskTier::Medium => portfolio.medium_risk += 1,
                RiskTier::High => portfolio.high_risk += 1,
            }
            if estimate.predicted_median_days > threshold {
                portfolio.over_threshold += 1;
            }
            total_days += f64::from(estimate.predicted_median_days);
            total_breach += estimate.breach_probability;
        }

        portfolio.mean_predicted_days = total_days / complaints.len() as f64;
        portfolio.mean_breach_probability = total_breach / complaints.len() as f64;
        record("summarize_sla", "ok", start);
        portfolio
    }

    /// SLA outlook over the loaded complaints dataset
    pub fn dataset_sla_outlook(&self) -> Option<SlaPortfolio> {
        let complaints = self.registry.complaints()?;
        Some(self.summarize_sla(&complaints.complaint_records()))
    }

    /// Survival-model coefficients ranked by absolute value
    pub fn sla_feature_importance(&self) -> Option<Vec<FeatureImportance>> {
        self.sla().feature_importance()
    }

    /// Shape of each loaded reference dataset
    pub fn dataset_info(&self) -> Vec<DatasetInfo> {
        let artifacts = self.registry.artifacts();
        [artifacts.complaints.as_ref(), artifacts.resolved.as_ref()]
            .into_iter()
            .flatten()
            .map(|dataset| dataset.info())
            .collect()
    }
}

fn record(operation: &str, outcome: &str, start: Instant) {
    INFERENCE_REQUESTS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
    INFERENCE_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::registry::ArtifactSet;
    use crate::ml::survival::SurvivalModel;
    use crate::ml::models::ModelType;

    fn empty_engine() -> InferenceEngine {
        InferenceEngine::from_registry(Arc::new(ModelRegistry::with_artifacts(
            EngineConfig::default(),
            ArtifactSet::default(),
        )))
    }

    fn sla_engine() -> InferenceEngine {
        sla_engine_with(EngineConfig::default())
    }

    fn sla_engine_with(config: EngineConfig) -> InferenceEngine {
        InferenceEngine::from_registry(Arc::new(ModelRegistry::with_artifacts(
            config,
            ArtifactSet {
                survival_model: Some(Arc::new(SurvivalModel::new(
                    ModelType::CoxPh,
                    Some(vec![0.0, 0.0]),
                    None,
                    None,
                ))),
                sla_features: Some(Arc::new(vec![
                    "Complaint Type_Marks Mismatch".to_string(),
                    "Faculty Department_Electrical Engineering".to_string(),
                ])),
                ..Default::default()
            },
        )))
    }

    #[test]
    fn test_classify_without_models_is_unavailable() {
        let engine = empty_engine();
        assert!(matches!(
            engine.classify("I was marked absent but I attended class"),
            Err(AppError::ModelsUnavailable(_))
        ));
    }

    #[test]
    fn test_degraded_operations_use_defaults() {
        let engine = empty_engine();
        assert!(engine.find_similar("I was marked absent", 1).is_empty());
        assert_eq!(engine.estimate_sla("Absentee Error", ""), SlaEstimate::fallback());
        let verdict = engine.detect_anomaly(&ResolutionRecord::new(200.0, "UNKNOWN", "UNKNOWN"));
        assert!(!verdict.is_anomaly);
        assert!(engine.sla_feature_importance().is_none());
        assert!(engine.dataset_info().is_empty());
        assert!(engine.dataset_sla_outlook().is_none());
    }

    #[test]
    fn test_analyze_rejects_short_text() {
        let engine = empty_engine();
        assert!(matches!(
            engine.analyze(&ComplaintRecord::new("   too short  ")),
            Err(AppError::Validation(_))
        ));
        // Long enough but no classifier
        assert!(matches!(
            engine.analyze(&ComplaintRecord::new("my internal marks are wrong")),
            Err(AppError::ModelsUnavailable(_))
        ));
    }

    #[test]
    fn test_summarize_sla() {
        let engine = sla_engine();
        let complaints = vec![
            ComplaintRecord::new("a").with_category("Marks Mismatch"),
            ComplaintRecord::new("b")
                .with_category("2")
                .with_department("Electrical Engineering"),
            ComplaintRecord::new("c"),
        ];

        let portfolio = engine.summarize_sla(&complaints);
        assert_eq!(portfolio.total, 3);
        assert_eq!(portfolio.low_risk, 3);
        assert_eq!(portfolio.over_threshold, 0);
        // 3 + round(5.5) + 6
        assert!((portfolio.mean_predicted_days - 5.0).abs() < 1e-9);
        assert_eq!(portfolio.mean_breach_probability, 0.0);

        assert_eq!(engine.summarize_sla(&[]).total, 0);
    }

    #[test]
    fn test_configured_threshold_caps_estimates() {
        let config = EngineConfig {
            sla_threshold_days: 5,
            ..EngineConfig::default()
        };
        let engine = sla_engine_with(config);
        assert_eq!(engine.estimate_sla("Calculation Discrepancy", "").predicted_median_days, 4);

        let complaints = vec![
            ComplaintRecord::new("a").with_category("Marks Mismatch"),
            ComplaintRecord::new("b")
                .with_category("2")
                .with_department("Electrical Engineering"),
            ComplaintRecord::new("c"),
        ];
        let portfolio = engine.summarize_sla(&complaints);
        assert_eq!(portfolio.over_threshold, 0);
        // 3 + 4 + 4
        assert!((portfolio.mean_predicted_days - 11.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_explain_reports_model_usage() {
        let breakdown = sla_engine().explain_sla("Marks Mismatch", "");
        assert!(breakdown.model_used);
        assert_eq!(breakdown.estimate.predicted_median_days, 3);
        assert_eq!(breakdown.active_features, vec!["Complaint Type_Marks Mismatch"]);
    }
}
