use crate::ml::error::{ArtifactError, ArtifactResult};
use crate::ml::label_encoder::LabelEncoder;
use crate::ml::models::{AnomalyVerdict, ModelType};
use crate::models::ResolutionRecord;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Feature layout: resolution time, program code, department code
pub const ANOMALY_FEATURES: usize = 3;

/// Prediction sentinel for an outlier
pub const OUTLIER: i8 = -1;

/// Prediction sentinel for an inlier
pub const INLIER: i8 = 1;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Trait for outlier detectors
pub trait OutlierModel: Send + Sync {
    fn model_type(&self) -> ModelType;

    fn n_features(&self) -> usize;

    /// Signed score; negative values are outliers
    fn decision_function(&self, sample: &[f64]) -> f64;

    /// `OUTLIER` or `INLIER`
    fn predict(&self, sample: &[f64]) -> i8 {
        if self.decision_function(sample) < 0.0 {
            OUTLIER
        } else {
            INLIER
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        n_node_samples: usize,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct IsolationTree {
    nodes: Vec<TreeNode>,
}

impl IsolationTree {
    /// Depth of the reached leaf plus the expected remaining path length
    fn path_length(&self, sample: &[f64]) -> f64 {
        let mut idx = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = sample.get(*feature).copied().unwrap_or(0.0);
                    idx = if value <= *threshold { *left } else { *right };
                    depth += 1.0;
                }
                TreeNode::Leaf { n_node_samples } => {
                    return depth + average_path_length(*n_node_samples);
                }
            }
        }
    }

    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= n_features {
                    return Err(format!("node {} splits on unknown feature {}", idx, feature));
                }
                // Children always follow their parent, which rules out cycles
                for child in [*left, *right] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(format!("node {} has invalid child {}", idx, child));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Average path length of an unsuccessful search in a binary search tree of `n` samples
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Isolation forest loaded from its exported trees
#[derive(Debug, Clone, Deserialize)]
pub struct IsolationForest {
    max_samples: usize,
    offset: f64,
    n_features: usize,
    trees: Vec<IsolationTree>,
}

impl IsolationForest {
    pub fn load(path: &Path) -> ArtifactResult<Self> {
        let forest: Self = crate::ml::error::read_json_artifact(path)?;
        forest
            .validate()
            .map_err(|reason| ArtifactError::incompatible(path, reason))?;
        Ok(forest)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if self.max_samples == 0 {
            return Err("max_samples must be positive".to_string());
        }
        if self.n_features != ANOMALY_FEATURES {
            return Err(format!(
                "model expects {} features, resolution records provide {}",
                self.n_features, ANOMALY_FEATURES
            ));
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|reason| format!("tree {}: {}", idx, reason))?;
        }
        Ok(())
    }

    /// Opposite of the anomaly score: values near -1 are anomalous, near -0.5 normal
    pub fn score_samples(&self, sample: &[f64]) -> f64 {
        let mean_depth = self
            .trees
            .iter()
            .map(|tree| tree.path_length(sample))
            .sum::<f64>()
            / self.trees.len() as f64;
        let normaliser = average_path_length(self.max_samples);
        if normaliser == 0.0 {
            return -1.0;
        }
        -(2f64.powf(-mean_depth / normaliser))
    }
}

impl OutlierModel for IsolationForest {
    fn model_type(&self) -> ModelType {
        ModelType::IsolationForest
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn decision_function(&self, sample: &[f64]) -> f64 {
        self.score_samples(sample) - self.offset
    }
}

/// Scores resolution records against the outlier model
#[derive(Clone, Default)]
pub struct AnomalyDetector {
    model: Option<Arc<dyn OutlierModel>>,
    program_encoder: Option<Arc<LabelEncoder>>,
    department_encoder: Option<Arc<LabelEncoder>>,
}

impl AnomalyDetector {
    pub fn new(
        model: Option<Arc<dyn OutlierModel>>,
        program_encoder: Option<Arc<LabelEncoder>>,
        department_encoder: Option<Arc<LabelEncoder>>,
    ) -> Self {
        let model = model.filter(|model| {
            let compatible = model.n_features() == ANOMALY_FEATURES;
            if !compatible {
                warn!(
                    expected = ANOMALY_FEATURES,
                    actual = model.n_features(),
                    "Outlier model feature count does not match resolution records"
                );
            }
            compatible
        });
        Self {
            model,
            program_encoder,
            department_encoder,
        }
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    /// Feature vector `[resolution_time_days, program_code, department_code]`.
    ///
    /// Unseen or blank categories and missing encoders encode to 0.
    pub fn features(&self, record: &ResolutionRecord) -> [f64; ANOMALY_FEATURES] {
        let encode = |encoder: &Option<Arc<LabelEncoder>>, value: &str| -> f64 {
            match encoder {
                Some(encoder) if !value.is_empty() => encoder.transform_or_default(value) as f64,
                _ => 0.0,
            }
        };

        let resolution_time = record
            .resolution_time_days
            .filter(|days| days.is_finite())
            .unwrap_or(0.0);

        [
            resolution_time,
            encode(&self.program_encoder, &record.student_program),
            encode(&self.department_encoder, &record.faculty_department),
        ]
    }

    pub fn detect(&self, record: &ResolutionRecord) -> AnomalyVerdict {
        let Some(model) = &self.model else {
            return AnomalyVerdict::unavailable();
        };

        let features = self.features(record);
        let anomaly_score = model.decision_function(&features);
        let is_anomaly = model.predict(&features) == OUTLIER;
        debug!(score = anomaly_score, is_anomaly, "Scored resolution record");

        let explanation = if is_anomaly {
            format!("Anomaly detected (score: {:.3})", anomaly_score)
        } else {
            "Normal pattern".to_string()
        };

        AnomalyVerdict {
            is_anomaly,
            anomaly_score,
            explanation,
        }
    }
}
