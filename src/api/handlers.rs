use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::ml::{
    AnomalyVerdict, CategoryPrediction, ComplaintAnalysis, DatasetInfo, FeatureImportance,
    ModelStatus, RiskTier, SimilarityMatch, SlaBreakdown, SlaEstimate, SlaPortfolio,
};
use crate::models::{ComplaintRecord, ResolutionRecord};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let status = state.engine.status();
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        models_loaded: status.flags(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub models_loaded: BTreeMap<String, bool>,
}

/// Liveness probe
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Current artifact load state
pub async fn model_status(State(state): State<AppState>) -> Result<Json<ModelStatus>> {
    Ok(Json(state.engine.status()))
}

/// Re-run every artifact load
pub async fn reload_models(State(state): State<AppState>) -> Result<Json<ModelStatus>> {
    let status = state.run(|engine| engine.reload()).await?;
    Ok(Json(status))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ClassifyRequest {
    #[validate(length(min = 1, max = 20000))]
    pub text: String,
}

/// Classify complaint text
pub async fn classify(
    State(state): State<AppState>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<CategoryPrediction>> {
    request.validate()?;

    let prediction = state
        .run(move |engine| engine.classify(&request.text))
        .await??;
    Ok(Json(prediction))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SimilarRequest {
    #[validate(length(min = 1, max = 20000))]
    pub text: String,

    #[validate(range(min = 1, max = 100))]
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SimilarResponse {
    pub matches: Vec<SimilarityMatch>,
}

/// Find resolved complaints similar to the given text
pub async fn find_similar(
    State(state): State<AppState>,
    Json(request): Json<SimilarRequest>,
) -> Result<Json<SimilarResponse>> {
    request.validate()?;

    let matches = state
        .run(move |engine| {
            let top_k = request
                .top_k
                .unwrap_or(engine.registry().config().default_top_k);
            engine.find_similar(&request.text, top_k)
        })
        .await?;
    Ok(Json(SimilarResponse { matches }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SlaRequest {
    #[validate(length(min = 1, max = 200))]
    pub category: String,

    #[serde(default)]
    #[validate(length(max = 200))]
    pub department: String,

    /// Include the intermediate values behind the estimate
    #[serde(default)]
    pub explain: bool,
}

#[derive(Debug, Serialize)]
pub struct SlaResponse {
    #[serde(flatten)]
    pub estimate: SlaEstimate,
    pub risk_tier: RiskTier,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<SlaBreakdown>,
}

/// Estimate resolution time for a category and department
pub async fn estimate_sla(
    State(state): State<AppState>,
    Json(request): Json<SlaRequest>,
) -> Result<Json<SlaResponse>> {
    request.validate()?;

    let breakdown = state
        .run(move |engine| engine.explain_sla(&request.category, &request.department))
        .await?;
    Ok(Json(SlaResponse {
        estimate: breakdown.estimate,
        risk_tier: breakdown.estimate.risk_tier(),
        breakdown: request.explain.then_some(breakdown),
    }))
}

/// Score a resolution record for anomalous handling
pub async fn detect_anomaly(
    State(state): State<AppState>,
    Json(request): Json<ResolutionRecord>,
) -> Result<Json<AnomalyVerdict>> {
    request.validate()?;

    let verdict = state
        .run(move |engine| engine.detect_anomaly(&request))
        .await?;
    Ok(Json(verdict))
}

/// Full analysis of a submitted complaint
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<ComplaintRecord>,
) -> Result<Json<ComplaintAnalysis>> {
    let analysis = state.run(move |engine| engine.analyze(&request)).await??;
    Ok(Json(analysis))
}

/// Survival-model feature importance
pub async fn sla_features(State(state): State<AppState>) -> Result<Json<Vec<FeatureImportance>>> {
    state
        .engine
        .sla_feature_importance()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("SLA model coefficients not available".to_string()))
}

/// Shape of the loaded reference datasets
pub async fn datasets(State(state): State<AppState>) -> Result<Json<Vec<DatasetInfo>>> {
    Ok(Json(state.engine.dataset_info()))
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct SlaPortfolioRequest {
    /// Complaints to summarise; the loaded complaints dataset when empty
    #[serde(default)]
    #[validate(length(max = 100000))]
    pub complaints: Vec<ComplaintRecord>,
}

/// SLA outlook over a set of complaints
pub async fn sla_portfolio(
    State(state): State<AppState>,
    Json(request): Json<SlaPortfolioRequest>,
) -> Result<Json<SlaPortfolio>> {
    request.validate()?;

    let portfolio = state
        .run(move |engine| {
            if request.complaints.is_empty() {
                engine.dataset_sla_outlook()
            } else {
                Some(engine.summarize_sla(&request.complaints))
            }
        })
        .await?;
    portfolio
        .map(Json)
        .ok_or_else(|| AppError::NotFound("complaints dataset not loaded".to_string()))
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    let metrics = crate::metrics::gather_metrics();
    (StatusCode::OK, metrics)
}
