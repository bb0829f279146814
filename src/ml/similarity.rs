use crate::ml::dataset::ReferenceDataset;
use crate::ml::embedding::{cosine_similarity, EmbeddingModel};
use crate::ml::embedding_cache::CachedEmbeddings;
use crate::ml::models::{SimilarityBand, SimilarityMatch};
use crate::ml::text::TextNormalizer;
use ndarray::{Array2, ArrayView1, Axis};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

/// Score thresholds used to band matches
#[derive(Debug, Clone, Copy)]
pub struct SimilarityThresholds {
    pub high: f64,
    pub moderate: f64,
}

impl Default for SimilarityThresholds {
    fn default() -> Self {
        Self {
            high: 0.8,
            moderate: 0.6,
        }
    }
}

/// Indices of the `top_k` most similar rows, descending by score (ties keep row order)
pub fn rank(query: ArrayView1<'_, f32>, embeddings: &Array2<f32>, top_k: usize) -> Vec<(usize, f64)> {
    if top_k == 0 || embeddings.nrows() == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f64)> = embeddings
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(idx, row)| (idx, cosine_similarity(query, row)))
        .collect();

    let by_score = |a: &(usize, f64), b: &(usize, f64)| -> Ordering {
        b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
    };

    if top_k < scored.len() {
        scored.select_nth_unstable_by(top_k - 1, by_score);
        scored.truncate(top_k);
    }
    scored.sort_by(by_score);
    scored
}

/// Nearest-neighbour search over the cached resolved-complaint embeddings
#[derive(Clone)]
pub struct SimilaritySearch {
    model: Option<Arc<dyn EmbeddingModel>>,
    dataset: Option<Arc<ReferenceDataset>>,
    embeddings: Option<Arc<CachedEmbeddings>>,
    normalizer: Arc<TextNormalizer>,
    thresholds: SimilarityThresholds,
}

impl SimilaritySearch {
    pub fn new(
        model: Option<Arc<dyn EmbeddingModel>>,
        dataset: Option<Arc<ReferenceDataset>>,
        embeddings: Option<Arc<CachedEmbeddings>>,
        normalizer: Arc<TextNormalizer>,
    ) -> Self {
        Self {
            model,
            dataset,
            embeddings,
            normalizer,
            thresholds: SimilarityThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: SimilarityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some() && self.dataset.is_some() && self.embeddings.is_some()
    }

    /// Up to `top_k` resolved complaints most similar to `text`, descending by score.
    ///
    /// Returns an empty list whenever the model, dataset or cache is missing.
    pub fn find_similar(&self, text: &str, top_k: usize) -> Vec<SimilarityMatch> {
        let (Some(model), Some(dataset), Some(cache)) =
            (&self.model, &self.dataset, &self.embeddings)
        else {
            debug!("Similarity search unavailable");
            return Vec::new();
        };

        if cache.len() != dataset.len() {
            warn!(
                cached = cache.len(),
                dataset = dataset.len(),
                "Embedding cache is not aligned with the resolved dataset"
            );
            return Vec::new();
        }

        let cleaned = self.normalizer.normalize(text);
        let query = model.encode_one(&cleaned);
        if query.len() != cache.embeddings.ncols() {
            warn!(
                query_dim = query.len(),
                cache_dim = cache.embeddings.ncols(),
                "Query embedding dimension does not match the cache"
            );
            return Vec::new();
        }

        rank(query.view(), &cache.embeddings, top_k)
            .into_iter()
            .filter_map(|(idx, score)| {
                let row = dataset.resolved_row(idx)?;
                Some(SimilarityMatch {
                    source_index: idx,
                    score,
                    matched_category: row.complaint_type.to_string(),
                    matched_text: row.complaint_text.to_string(),
                    matched_resolution_text: row.resolution_description.to_string(),
                    matched_resolution_days: row.resolution_days,
                    band: SimilarityBand::from_score(
                        score,
                        self.thresholds.high,
                        self.thresholds.moderate,
                    ),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::dataset::{COMPLAINT_TEXT, COMPLAINT_TYPE, RESOLUTION_DESCRIPTION, RESOLUTION_TIME};
    use crate::ml::embedding::StaticEmbeddingModel;
    use crate::ml::embedding_cache::CacheMetadata;
    use ndarray::array;
    use std::collections::HashMap;

    fn model() -> Arc<dyn EmbeddingModel> {
        let vectors = HashMap::from([
            ("absent".to_string(), vec![1.0, 0.0, 0.0]),
            ("attendance".to_string(), vec![0.9, 0.1, 0.0]),
            ("grade".to_string(), vec![0.0, 1.0, 0.0]),
            ("missing".to_string(), vec![0.0, 0.8, 0.2]),
            ("total".to_string(), vec![0.0, 0.0, 1.0]),
        ]);
        Arc::new(StaticEmbeddingModel::new(3, true, vectors).unwrap())
    }

    fn dataset() -> Arc<ReferenceDataset> {
        let headers = [COMPLAINT_TEXT, COMPLAINT_TYPE, RESOLUTION_DESCRIPTION, RESOLUTION_TIME]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let rows = vec![
            vec!["Attendance shows absent", "Absentee Error", "Attendance fixed", "2"],
            vec!["Grade is missing", "Missing Grade", "Grade uploaded", ""],
            vec!["Total is wrong", "Incorrect Calculation", "Total recomputed", "6.5"],
        ]
        .into_iter()
        .map(|row| row.into_iter().map(str::to_string).collect())
        .collect();
        Arc::new(ReferenceDataset::new("resolved_complaints", headers, rows))
    }

    fn cached(model: &Arc<dyn EmbeddingModel>, dataset: &ReferenceDataset) -> Arc<CachedEmbeddings> {
        let normalizer = TextNormalizer::english();
        let texts: Vec<String> = dataset
            .column_values(COMPLAINT_TEXT)
            .unwrap()
            .iter()
            .map(|t| normalizer.normalize(t))
            .collect();
        let embeddings = model.encode(&texts);
        Arc::new(CachedEmbeddings {
            metadata: CacheMetadata {
                row_count: texts.len(),
                embedding_dim: embeddings.ncols(),
                computed_at: None,
                content_digest: None,
            },
            embeddings,
            texts,
        })
    }

    fn search() -> SimilaritySearch {
        let model = model();
        let dataset = dataset();
        let cache = cached(&model, &dataset);
        SimilaritySearch::new(
            Some(model),
            Some(dataset),
            Some(cache),
            Arc::new(TextNormalizer::english()),
        )
    }

    #[test]
    fn test_rank_descending_and_bounded() {
        let embeddings = array![[1.0f32, 0.0], [0.0, 1.0], [0.7, 0.7], [0.0, 0.0]];
        let query = array![1.0f32, 0.1];

        let ranked = rank(query.view(), &embeddings, 3);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].0, 0);
        assert_eq!(ranked[1].0, 2);
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
        assert!(ranked.iter().all(|(_, s)| (-1.0..=1.0).contains(s)));

        assert!(rank(query.view(), &embeddings, 0).is_empty());
        assert_eq!(rank(query.view(), &embeddings, 10).len(), 4);
    }

    #[test]
    fn test_find_similar_returns_best_match_first() {
        let matches = search().find_similar("I was marked absent in attendance", 3);
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].source_index, 0);
        assert_eq!(matches[0].matched_category, "Absentee Error");
        assert_eq!(matches[0].matched_resolution_text, "Attendance fixed");
        assert_eq!(matches[0].matched_resolution_days, Some(2));
        assert_eq!(matches[0].band, SimilarityBand::High);
        assert!(matches.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_top_k_limits_results() {
        let matches = search().find_similar("grade missing", 1);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].source_index, 1);
        assert_eq!(matches[0].matched_resolution_days, None);
    }

    #[test]
    fn test_missing_pieces_yield_empty() {
        let normalizer = Arc::new(TextNormalizer::english());
        let search = SimilaritySearch::new(Some(model()), Some(dataset()), None, normalizer.clone());
        assert!(!search.is_available());
        assert!(search.find_similar("absent", 3).is_empty());

        let search = SimilaritySearch::new(None, Some(dataset()), None, normalizer);
        assert!(search.find_similar("absent", 3).is_empty());
    }

    #[test]
    fn test_misaligned_cache_yields_empty() {
        let model = model();
        let full = dataset();
        let cache = cached(&model, &full);
        let smaller = Arc::new(ReferenceDataset::new(
            "resolved_complaints",
            full.headers().to_vec(),
            vec![vec!["x".to_string(); 4]],
        ));
        let search = SimilaritySearch::new(
            Some(model),
            Some(smaller),
            Some(cache),
            Arc::new(TextNormalizer::english()),
        );
        assert!(search.find_similar("absent", 3).is_empty());
    }

    #[test]
    fn test_unknown_query_scores_zero() {
        let matches = search().find_similar("completely unrelated words", 2);
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.score == 0.0 && m.band == SimilarityBand::Low));
    }
}
