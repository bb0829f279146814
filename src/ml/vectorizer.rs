use crate::ml::error::{ArtifactError, ArtifactResult};
use ndarray::Array1;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("valid token pattern"));

/// Row normalisation applied after TF-IDF weighting
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VectorNorm {
    #[default]
    L2,
    None,
}

/// Fitted TF-IDF vectorizer loaded from an exported artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Vocabulary mapping (term -> column index)
    vocabulary: HashMap<String, usize>,

    /// Inverse document frequency per column
    idf: Vec<f64>,

    /// N-gram range (min, max)
    #[serde(default = "default_ngram_range")]
    ngram_range: (usize, usize),

    /// Use 1 + ln(tf) instead of raw counts
    #[serde(default)]
    sublinear_tf: bool,

    #[serde(default)]
    norm: VectorNorm,

    /// Column index -> term, rebuilt after loading
    #[serde(skip)]
    feature_names: Vec<String>,
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

impl TfidfVectorizer {
    /// Build a vectorizer from its fitted state
    pub fn new(
        vocabulary: HashMap<String, usize>,
        idf: Vec<f64>,
        ngram_range: (usize, usize),
        sublinear_tf: bool,
        norm: VectorNorm,
    ) -> std::result::Result<Self, String> {
        let mut vectorizer = Self {
            vocabulary,
            idf,
            ngram_range,
            sublinear_tf,
            norm,
            feature_names: Vec::new(),
        };
        vectorizer.index_features()?;
        Ok(vectorizer)
    }

    /// Load a fitted vectorizer from its JSON artifact
    pub fn load(path: &Path) -> ArtifactResult<Self> {
        let mut vectorizer: Self = crate::ml::error::read_json_artifact(path)?;
        vectorizer
            .index_features()
            .map_err(|reason| ArtifactError::incompatible(path, reason))?;
        Ok(vectorizer)
    }

    fn index_features(&mut self) -> std::result::Result<(), String> {
        let n_features = self.idf.len();
        if self.vocabulary.len() != n_features {
            return Err(format!(
                "vocabulary has {} terms but idf has {} values",
                self.vocabulary.len(),
                n_features
            ));
        }
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(format!("invalid ngram range ({}, {})", min_n, max_n));
        }

        let mut names = vec![String::new(); n_features];
        for (term, &idx) in &self.vocabulary {
            if idx >= n_features {
                return Err(format!("term '{}' maps to out-of-range column {}", term, idx));
            }
            names[idx] = term.clone();
        }
        self.feature_names = names;
        Ok(())
    }

    /// Transform a single (already normalised) document into a TF-IDF row
    pub fn transform(&self, text: &str) -> Array1<f64> {
        let mut row = Array1::zeros(self.n_features());

        for (term, count) in self.count_terms(&self.extract_terms(text)) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                let tf = if self.sublinear_tf {
                    1.0 + (count as f64).ln()
                } else {
                    count as f64
                };
                row[idx] = tf * self.idf[idx];
            }
        }

        if self.norm == VectorNorm::L2 {
            let norm = row.dot(&row).sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|v| v / norm);
            }
        }

        row
    }

    /// Extract word n-grams from text
    fn extract_terms(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = TOKEN_PATTERN.find_iter(text).map(|m| m.as_str()).collect();

        let mut terms = Vec::new();
        for n in self.ngram_range.0..=self.ngram_range.1 {
            for window in words.windows(n) {
                terms.push(window.join(" "));
            }
        }

        terms
    }

    /// Count term occurrences
    fn count_terms(&self, terms: &[String]) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for term in terms {
            *counts.entry(term.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Column index -> term
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Get number of features
    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    /// Get vocabulary size
    pub fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }
}
