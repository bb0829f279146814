use crate::ml::error::{ArtifactError, ArtifactResult};
use crate::ml::models::ModelType;
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Sentence embedding model
pub trait EmbeddingModel: Send + Sync {
    fn model_type(&self) -> ModelType;

    /// Length of every produced vector
    fn dimension(&self) -> usize;

    /// Embed a batch of (already normalised) texts, one row per text
    fn encode(&self, texts: &[String]) -> Array2<f32>;

    /// Embed a single text
    fn encode_one(&self, text: &str) -> Array1<f32> {
        let batch = self.encode(&[text.to_string()]);
        batch.row(0).to_owned()
    }
}

#[derive(Debug, Deserialize)]
struct StaticEmbeddingConfig {
    dimension: usize,
    #[serde(default = "default_normalize")]
    normalize: bool,
}

fn default_normalize() -> bool {
    true
}

/// Mean-pooled word-vector embedding model
#[derive(Debug, Clone)]
pub struct StaticEmbeddingModel {
    dimension: usize,
    normalize: bool,
    vectors: HashMap<String, Vec<f32>>,
}

impl StaticEmbeddingModel {
    pub fn new(
        dimension: usize,
        normalize: bool,
        vectors: HashMap<String, Vec<f32>>,
    ) -> std::result::Result<Self, String> {
        if dimension == 0 {
            return Err("embedding dimension must be positive".to_string());
        }
        if let Some((token, vector)) = vectors.iter().find(|(_, v)| v.len() != dimension) {
            return Err(format!(
                "vector for '{}' has length {}, expected {}",
                token,
                vector.len(),
                dimension
            ));
        }
        Ok(Self {
            dimension,
            normalize,
            vectors,
        })
    }

    /// Load a model directory (`config.json` + `vectors.json`)
    pub fn load(dir: &Path) -> ArtifactResult<Self> {
        if !dir.is_dir() {
            return Err(ArtifactError::NotFound(dir.to_path_buf()));
        }
        let config: StaticEmbeddingConfig =
            crate::ml::error::read_json_artifact(&dir.join("config.json"))?;
        let vectors_path = dir.join("vectors.json");
        let vectors: HashMap<String, Vec<f32>> =
            crate::ml::error::read_json_artifact(&vectors_path)?;

        Self::new(config.dimension, config.normalize, vectors)
            .map_err(|reason| ArtifactError::corrupt(&vectors_path, reason))
    }

    pub fn vocab_size(&self) -> usize {
        self.vectors.len()
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut pooled = vec![0.0f32; self.dimension];
        let mut known = 0usize;

        for token in text.split_whitespace() {
            if let Some(vector) = self.vectors.get(token) {
                for (acc, v) in pooled.iter_mut().zip(vector) {
                    *acc += v;
                }
                known += 1;
            }
        }

        if known == 0 {
            return pooled;
        }

        let count = known as f32;
        pooled.iter_mut().for_each(|v| *v /= count);

        if self.normalize {
            let norm = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                pooled.iter_mut().for_each(|v| *v /= norm);
            }
        }
        pooled
    }
}

impl EmbeddingModel for StaticEmbeddingModel {
    fn model_type(&self) -> ModelType {
        ModelType::StaticEmbedding
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, texts: &[String]) -> Array2<f32> {
        let rows: Vec<Vec<f32>> = texts.par_iter().map(|text| self.embed(text)).collect();
        let mut matrix = Array2::zeros((rows.len(), self.dimension));
        for (mut target, row) in matrix.outer_iter_mut().zip(rows) {
            target.assign(&Array1::from(row));
        }
        matrix
    }
}

/// Cosine similarity in `[-1, 1]`; zero when either vector has zero norm
pub fn cosine_similarity(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f64 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}
