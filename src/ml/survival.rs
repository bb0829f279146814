use crate::ml::error::{ArtifactError, ArtifactResult};
use crate::ml::models::ModelType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fitted-coefficient summary table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurvivalSummary {
    /// Covariate names, one per row
    #[serde(default)]
    pub index: Vec<String>,

    #[serde(default)]
    pub coef: Option<Vec<f64>>,
}

/// Fitted survival model (time-to-resolution)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurvivalModel {
    pub model_type: ModelType,

    #[serde(default)]
    hazard_ratios: Option<Vec<f64>>,

    #[serde(default)]
    params: Option<Vec<f64>>,

    #[serde(default)]
    summary: Option<SurvivalSummary>,
}

impl SurvivalModel {
    pub fn new(
        model_type: ModelType,
        hazard_ratios: Option<Vec<f64>>,
        params: Option<Vec<f64>>,
        summary: Option<SurvivalSummary>,
    ) -> Self {
        Self {
            model_type,
            hazard_ratios,
            params,
            summary,
        }
    }

    pub fn load(path: &Path) -> ArtifactResult<Self> {
        let model: Self = crate::ml::error::read_json_artifact(path)?;
        match model.model_type {
            ModelType::CoxPh | ModelType::WeibullAft => Ok(model),
            other => Err(ArtifactError::incompatible(
                path,
                format!("{} is not a survival model", other),
            )),
        }
    }

    /// Fitted coefficients: hazard ratios, else linear parameters, else the summary table
    pub fn coefficients(&self) -> Option<&[f64]> {
        self.hazard_ratios
            .as_deref()
            .or(self.params.as_deref())
            .or_else(|| self.summary.as_ref().and_then(|s| s.coef.as_deref()))
    }

    /// Covariate names recorded in the summary table
    pub fn covariate_names(&self) -> &[String] {
        self.summary
            .as_ref()
            .map(|s| s.index.as_slice())
            .unwrap_or(&[])
    }
}
