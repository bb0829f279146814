//! Hybrid SLA scorer: fixed category/department priors nudged by survival-model coefficients.

use crate::ml::models::{FeatureImportance, SlaEstimate, SLA_THRESHOLD_DAYS};
use crate::ml::survival::SurvivalModel;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const COMPLAINT_TYPE_FEATURE: &str = "Complaint Type";
const DEPARTMENT_FEATURE: &str = "Faculty Department";

const MIN_MEDIAN_DAYS: f64 = 1.0;
const MAX_MEDIAN_DAYS: f64 = 6.9;

/// Map a classifier label onto the survival model's training vocabulary
pub fn remap_category(category: &str) -> &str {
    match category {
        "Calculation Discrepancy" => "Incorrect Calculation",
        other => other,
    }
}

fn base_days(category: &str) -> Option<f64> {
    match category {
        "Marks Mismatch" => Some(3.0),
        "Absentee Error" => Some(4.0),
        "Missing Grade" => Some(5.0),
        "Calculation Discrepancy" | "Incorrect Calculation" => Some(6.0),
        "" => Some(5.0),
        _ => None,
    }
}

fn department_adjustment(department: &str) -> f64 {
    match department {
        "Electrical Engineering" => 0.5,
        "Mechanical Engineering" => 0.3,
        _ => 0.0,
    }
}

/// Intermediate values behind an estimate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlaBreakdown {
    pub category: String,
    pub remapped_category: String,
    pub department: String,

    /// Whether survival-model coefficients contributed
    pub model_used: bool,

    /// Active one-hot features
    pub active_features: Vec<String>,

    pub base_days: f64,
    pub department_adjustment: f64,

    /// Coefficient-weighted risk signal
    pub coefficient_score: f64,
    pub score_adjustment: f64,

    /// Median before clamping and rounding
    pub raw_median_days: f64,

    pub estimate: SlaEstimate,
}

/// SLA estimator
#[derive(Debug, Clone)]
pub struct SlaEstimator {
    model: Option<Arc<SurvivalModel>>,
    features: Option<Arc<Vec<String>>>,
    threshold_days: u32,
}

impl Default for SlaEstimator {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl SlaEstimator {
    pub fn new(model: Option<Arc<SurvivalModel>>, features: Option<Arc<Vec<String>>>) -> Self {
        Self {
            model,
            features,
            threshold_days: SLA_THRESHOLD_DAYS,
        }
    }

    /// Model-based medians are capped one day below `days`
    pub fn with_threshold(mut self, days: u32) -> Self {
        self.threshold_days = days.max(2);
        self
    }

    pub fn threshold_days(&self) -> u32 {
        self.threshold_days
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some() && self.features.is_some()
    }

    pub fn estimate(&self, category: &str, department: &str) -> SlaEstimate {
        self.explain(category, department).estimate
    }

    pub fn explain(&self, category: &str, department: &str) -> SlaBreakdown {
        let remapped = remap_category(category);

        let (Some(model), Some(features)) = (&self.model, &self.features) else {
            return SlaBreakdown {
                category: category.to_string(),
                remapped_category: remapped.to_string(),
                department: department.to_string(),
                model_used: false,
                active_features: Vec::new(),
                base_days: 0.0,
                department_adjustment: 0.0,
                coefficient_score: 0.0,
                score_adjustment: 0.0,
                raw_median_days: 0.0,
                estimate: SlaEstimate::fallback(),
            };
        };

        let coefficients = model.coefficients();
        let mut active_features = Vec::new();
        let mut score = 0.0;

        for (idx, name) in features.iter().enumerate() {
            if one_hot(name, remapped, department) == 0.0 {
                continue;
            }
            active_features.push(name.clone());
            if let Some(coef) = coefficients.and_then(|c| c.get(idx)) {
                if coef.is_finite() {
                    score += coef.abs();
                }
            }
        }

        let base = base_days(remapped)
            .or_else(|| base_days(category))
            .unwrap_or(5.0);
        let dept = department_adjustment(department);
        let score_adjustment = if score > 0.0 { (score / 10.0).min(1.0) } else { 0.0 };
        let raw = base + dept + score_adjustment;

        let clamped = raw.clamp(MIN_MEDIAN_DAYS, MAX_MEDIAN_DAYS);
        let days = (clamped.round_ties_even() as u32).min(self.threshold_days - 1);

        SlaBreakdown {
            category: category.to_string(),
            remapped_category: remapped.to_string(),
            department: department.to_string(),
            model_used: coefficients.is_some(),
            active_features,
            base_days: base,
            department_adjustment: dept,
            coefficient_score: score,
            score_adjustment,
            raw_median_days: raw,
            estimate: SlaEstimate {
                predicted_median_days: days,
                breach_probability: 0.0,
            },
        }
    }

    /// Survival coefficients ranked by absolute value
    pub fn feature_importance(&self) -> Option<Vec<FeatureImportance>> {
        let model = self.model.as_ref()?;
        let coefficients = model.coefficients()?;

        let names: Vec<String> = match self.features.as_deref() {
            Some(features) if features.len() == coefficients.len() => features.clone(),
            Some(_) => generic_names(coefficients.len()),
            None if model.covariate_names().len() == coefficients.len() => {
                model.covariate_names().to_vec()
            }
            None => generic_names(coefficients.len()),
        };

        let mut importance: Vec<FeatureImportance> = names
            .into_iter()
            .zip(coefficients.iter())
            .map(|(feature, &coefficient)| FeatureImportance {
                feature,
                coefficient,
                importance: coefficient.abs(),
            })
            .collect();
        importance.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        Some(importance)
    }
}

fn generic_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("Feature_{}", i)).collect()
}

/// One-hot value of a `"<Column>_<value>"` feature for the given complaint
fn one_hot(feature: &str, category: &str, department: &str) -> f64 {
    let Some((column, value)) = feature.split_once('_') else {
        return 0.0;
    };
    let matched = match column {
        COMPLAINT_TYPE_FEATURE => value == category,
        DEPARTMENT_FEATURE => value == department,
        _ => false,
    };
    if matched {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::models::{ModelType, RiskTier};
    use crate::ml::survival::SurvivalSummary;

    fn features() -> Arc<Vec<String>> {
        Arc::new(vec![
            "Complaint Type_Absentee Error".to_string(),
            "Complaint Type_Incorrect Calculation".to_string(),
            "Complaint Type_Marks Mismatch".to_string(),
            "Faculty Department_Electrical Engineering".to_string(),
            "Student Year_3".to_string(),
            "Intercept".to_string(),
        ])
    }

    fn estimator(coefficients: Option<Vec<f64>>) -> SlaEstimator {
        SlaEstimator::new(
            Some(Arc::new(SurvivalModel::new(ModelType::CoxPh, coefficients, None, None))),
            Some(features()),
        )
    }

    #[test]
    fn test_threshold_caps_model_median() {
        let default = estimator(None);
        assert_eq!(default.threshold_days(), SLA_THRESHOLD_DAYS);
        assert_eq!(default.estimate("Calculation Discrepancy", "").predicted_median_days, 6);

        let tight = estimator(None).with_threshold(5);
        assert_eq!(tight.threshold_days(), 5);
        assert_eq!(tight.estimate("Calculation Discrepancy", "").predicted_median_days, 4);
        assert_eq!(tight.estimate("Marks Mismatch", "").predicted_median_days, 3);

        assert_eq!(estimator(None).with_threshold(0).threshold_days(), 2);
    }

    #[test]
    fn test_degraded_mode_returns_default() {
        let estimate = SlaEstimator::default().estimate("Marks Mismatch", "");
        assert_eq!(estimate.predicted_median_days, 5);
        assert_eq!(estimate.breach_probability, 0.0);

        let only_model = SlaEstimator::new(
            Some(Arc::new(SurvivalModel::new(ModelType::CoxPh, None, None, None))),
            None,
        );
        assert!(!only_model.is_available());
        assert_eq!(only_model.estimate("Missing Grade", "").predicted_median_days, 5);
    }

    #[test]
    fn test_category_priors_without_coefficients() {
        let estimator = estimator(None);
        assert_eq!(estimator.estimate("Marks Mismatch", "").predicted_median_days, 3);
        assert_eq!(estimator.estimate("Absentee Error", "").predicted_median_days, 4);
        assert_eq!(estimator.estimate("Missing Grade", "").predicted_median_days, 5);
        assert_eq!(estimator.estimate("Calculation Discrepancy", "").predicted_median_days, 6);
        assert_eq!(estimator.estimate("Something Else", "").predicted_median_days, 5);
    }

    #[test]
    fn test_absentee_end_to_end_value() {
        let estimate = estimator(Some(vec![0.0; 6])).estimate("Absentee Error", "");
        assert_eq!(estimate.predicted_median_days, 4);
        assert_eq!(estimate.breach_probability, 0.0);
        assert_eq!(estimate.risk_tier(), RiskTier::Low);
    }

    #[test]
    fn test_department_adjustment_rounds_half_to_even() {
        let estimator = estimator(None);
        // 4.5 -> 4, 5.5 -> 6, 6.5 -> 6
        assert_eq!(
            estimator.estimate("Absentee Error", "Electrical Engineering").predicted_median_days,
            4
        );
        assert_eq!(
            estimator.estimate("Missing Grade", "Electrical Engineering").predicted_median_days,
            6
        );
        assert_eq!(
            estimator.estimate("Calculation Discrepancy", "Electrical Engineering").predicted_median_days,
            6
        );
        assert_eq!(
            estimator.estimate("Marks Mismatch", "Mechanical Engineering").predicted_median_days,
            3
        );
    }

    #[test]
    fn test_coefficient_score_shifts_median() {
        let estimator = estimator(Some(vec![8.0, -6.0, 2.0, 3.0, 9.0, 9.0]));

        let breakdown = estimator.explain("Marks Mismatch", "Electrical Engineering");
        assert!(breakdown.model_used);
        assert_eq!(breakdown.active_features.len(), 2);
        assert!((breakdown.coefficient_score - 5.0).abs() < 1e-12);
        assert!((breakdown.score_adjustment - 0.5).abs() < 1e-12);
        assert!((breakdown.raw_median_days - 4.0).abs() < 1e-12);
        assert_eq!(breakdown.estimate.predicted_median_days, 4);

        // Remapped calculation feature contributes |-6|; the adjustment caps at 1.0
        let breakdown = estimator.explain("Calculation Discrepancy", "Electrical Engineering");
        assert_eq!(breakdown.remapped_category, "Incorrect Calculation");
        assert!((breakdown.coefficient_score - 9.0).abs() < 1e-12);
        assert_eq!(breakdown.estimate.predicted_median_days, 6);
        assert_eq!(breakdown.estimate.breach_probability, 0.0);
    }

    #[test]
    fn test_estimates_stay_in_range() {
        let estimator = estimator(Some(vec![100.0; 6]));
        for category in ["Marks Mismatch", "Absentee Error", "Missing Grade", "Calculation Discrepancy", ""] {
            for department in ["", "Electrical Engineering", "Mechanical Engineering", "Computer Science"] {
                let estimate = estimator.estimate(category, department);
                assert!((1..7).contains(&estimate.predicted_median_days));
                assert!((0.0..=1.0).contains(&estimate.breach_probability));
            }
        }
    }

    #[test]
    fn test_feature_importance_sorted_by_magnitude() {
        let importance = estimator(Some(vec![0.5, -2.0, 1.0, 0.0, 0.1, 0.2]))
            .feature_importance()
            .unwrap();
        assert_eq!(importance.len(), 6);
        assert_eq!(importance[0].feature, "Complaint Type_Incorrect Calculation");
        assert_eq!(importance[0].coefficient, -2.0);
        assert_eq!(importance[0].importance, 2.0);
        assert!(importance.windows(2).all(|w| w[0].importance >= w[1].importance));
    }

    #[test]
    fn test_feature_importance_generic_names_on_length_mismatch() {
        let importance = estimator(Some(vec![0.5, -2.0])).feature_importance().unwrap();
        assert_eq!(importance[0].feature, "Feature_1");

        let summary = SurvivalSummary {
            index: vec!["dept".into(), "type".into()],
            coef: Some(vec![0.1, 0.3]),
        };
        let estimator = SlaEstimator::new(
            Some(Arc::new(SurvivalModel::new(ModelType::WeibullAft, None, None, Some(summary)))),
            None,
        );
        assert_eq!(estimator.feature_importance().unwrap()[0].feature, "type");

        assert!(self::estimator(None).feature_importance().is_none());
    }
}
