//! Deterministic text cleaning shared by classification and similarity search

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:https?://|www\.)\S+").expect("valid URL pattern"));

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\S+@\S+").expect("valid email pattern"));

/// English stopword corpus (apostrophe-free forms, since normalisation strips punctuation)
const ENGLISH_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by",
    "for", "with", "about", "against", "between", "into", "through", "during", "before",
    "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over",
    "under", "again", "further", "then", "once", "here", "there", "when", "where", "why",
    "how", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "no",
    "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will",
    "just", "don", "should", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren",
    "couldn", "didn", "doesn", "hadn", "hasn", "haven", "isn", "ma", "mightn", "mustn",
    "needn", "shan", "shouldn", "wasn", "weren", "won", "wouldn",
];

/// A set of tokens dropped during normalisation
#[derive(Debug, Clone, Default)]
pub struct StopwordSet {
    words: HashSet<String>,
}

impl StopwordSet {
    /// Built-in English stopword corpus
    pub fn english() -> Self {
        Self {
            words: ENGLISH_STOPWORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Load a stopword corpus with one word per line
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let words = content
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();
        Ok(Self { words })
    }

    /// Resolve the configured stopword corpus.
    ///
    /// An unreadable file falls back to the built-in corpus when allowed; absence of any
    /// corpus just disables stopword removal.
    pub fn resolve(path: Option<&Path>, builtin: bool) -> Option<Self> {
        if let Some(path) = path {
            match Self::from_file(path) {
                Ok(set) if !set.is_empty() => {
                    debug!(path = %path.display(), words = set.len(), "Loaded stopword corpus");
                    return Some(set);
                }
                Ok(_) => warn!(path = %path.display(), "Stopword corpus is empty"),
                Err(e) => warn!(path = %path.display(), "Could not read stopword corpus: {}", e),
            }
        }
        builtin.then(Self::english)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Text normaliser.
///
/// Lowercases, strips URL and email tokens, keeps only ASCII letters and whitespace,
/// collapses whitespace and optionally drops stopwords. Pure, total and idempotent.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    stopwords: Option<Arc<StopwordSet>>,
}

impl TextNormalizer {
    pub fn new(stopwords: Option<StopwordSet>) -> Self {
        Self {
            stopwords: stopwords.filter(|s| !s.is_empty()).map(Arc::new),
        }
    }

    /// Normaliser without stopword removal
    pub fn without_stopwords() -> Self {
        Self { stopwords: None }
    }

    /// Normaliser with the built-in English stopword corpus
    pub fn english() -> Self {
        Self::new(Some(StopwordSet::english()))
    }

    pub fn has_stopwords(&self) -> bool {
        self.stopwords.is_some()
    }

    /// Normalise a possibly-absent text; `None` behaves like the empty string
    pub fn normalize_opt(&self, text: Option<&str>) -> String {
        self.normalize(text.unwrap_or(""))
    }

    pub fn normalize(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let lowered = text.to_lowercase();
        let without_urls = URL_PATTERN.replace_all(&lowered, "");
        let without_emails = EMAIL_PATTERN.replace_all(&without_urls, "");

        let letters_only: String = without_emails
            .chars()
            .filter(|c| c.is_ascii_alphabetic() || c.is_whitespace())
            .collect();

        let tokens = letters_only.split_whitespace();
        match &self.stopwords {
            Some(stopwords) => tokens
                .filter(|token| !stopwords.contains(token))
                .collect::<Vec<_>>()
                .join(" "),
            None => tokens.collect::<Vec<_>>().join(" "),
        }
    }
}
