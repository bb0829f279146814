use crate::ml::error::{ArtifactError, ArtifactResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Fitted categorical encoder (class label <-> integer code)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,

    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Self {
        let index = classes
            .iter()
            .enumerate()
            .map(|(code, class)| (class.clone(), code))
            .collect();
        Self { classes, index }
    }

    pub fn load(path: &Path) -> ArtifactResult<Self> {
        let encoder: Self = crate::ml::error::read_json_artifact(path)?;
        if encoder.classes.is_empty() {
            return Err(ArtifactError::incompatible(path, "encoder has no classes"));
        }
        Ok(Self::new(encoder.classes))
    }

    /// Code for a known class, `None` when the value was never seen during fitting
    pub fn transform(&self, value: &str) -> Option<usize> {
        self.index.get(value).copied()
    }

    /// Code for a value, mapping unseen values to 0
    pub fn transform_or_default(&self, value: &str) -> usize {
        self.transform(value).unwrap_or(0)
    }

    pub fn inverse_transform(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
