//! Text embedding backends for guideline retrieval.
//!
//! [`KeywordEmbedder`] is always available and is fitted on the indexed
//! corpus. With the `embeddings` feature, [`MiniLmEmbedder`] runs
//! all-MiniLM-L6-v2 locally through fastembed.

use std::collections::HashMap;

use thiserror::Error;

use super::tokenize;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("Embedding model failed to initialise: {0}")]
    InitFailed(String),

    #[error("Embedding failed: {0}")]
    EmbedFailed(String),

    #[error("Embedding model returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
}

pub type EmbedResult<T> = Result<T, EmbedError>;

/// Maps text to dense vectors compared by cosine similarity.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> EmbedResult<Vec<f32>>;

    fn embed_batch(&self, texts: &[&str]) -> EmbedResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize;

    /// Model name reported in index stats.
    fn name(&self) -> &str;
}

// =========================================================================
// Keyword (TF-IDF)
// =========================================================================

/// TF-IDF vectors over the vocabulary of the fitted documents.
///
/// Only shares signal between texts that use the same words.
#[derive(Debug, Clone, Default)]
pub struct KeywordEmbedder {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
}

impl KeywordEmbedder {
    pub const NAME: &'static str = "tfidf-keyword";

    pub fn fit<S: AsRef<str>>(docs: &[S]) -> Self {
        let tokenized: Vec<Vec<String>> = docs.iter().map(|d| tokenize(d.as_ref())).collect();

        let mut df: HashMap<&str, usize> = HashMap::new();
        for doc in &tokenized {
            let mut seen: Vec<&str> = doc.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *df.entry(term).or_insert(0) += 1;
            }
        }

        let mut terms: Vec<(&str, usize)> = df.into_iter().collect();
        terms.sort_unstable();

        let n = tokenized.len() as f32;
        let mut vocabulary = HashMap::with_capacity(terms.len());
        let mut idf = Vec::with_capacity(terms.len());
        for (i, (term, count)) in terms.into_iter().enumerate() {
            vocabulary.insert(term.to_string(), i);
            idf.push(((1.0 + n) / (1.0 + count as f32)).ln() + 1.0);
        }

        Self { vocabulary, idf }
    }
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        let mut vector = vec![0.0; self.idf.len()];
        for token in tokenize(text) {
            if let Some(&i) = self.vocabulary.get(&token) {
                vector[i] += self.idf[i];
            }
        }
        normalize(&mut vector);
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.idf.len()
    }

    fn name(&self) -> &str {
        Self::NAME
    }
}

// =========================================================================
// all-MiniLM-L6-v2
// =========================================================================

#[cfg(feature = "embeddings")]
pub use minilm::MiniLmEmbedder;

#[cfg(feature = "embeddings")]
mod minilm {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
    use tracing::info;

    use super::{EmbedError, EmbedResult, Embedder};

    /// Sentence embeddings from all-MiniLM-L6-v2 (384 dimensions).
    ///
    /// Model files are downloaded into `cache_dir` on first use.
    pub struct MiniLmEmbedder {
        model: Mutex<TextEmbedding>,
    }

    impl MiniLmEmbedder {
        pub const NAME: &'static str = "all-MiniLM-L6-v2";

        pub fn new(cache_dir: impl Into<PathBuf>) -> EmbedResult<Self> {
            let cache_dir = cache_dir.into();
            info!(cache_dir = %cache_dir.display(), "Loading embedding model");
            let model = TextEmbedding::try_new(
                TextInitOptions::new(EmbeddingModel::AllMiniLML6V2)
                    .with_cache_dir(cache_dir)
                    .with_show_download_progress(false),
            )
            .map_err(|e| EmbedError::InitFailed(e.to_string()))?;
            Ok(Self {
                model: Mutex::new(model),
            })
        }
    }

    impl Embedder for MiniLmEmbedder {
        fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
            let mut vectors = self.embed_batch(&[text])?;
            vectors.pop().ok_or(EmbedError::CountMismatch {
                expected: 1,
                got: 0,
            })
        }

        fn embed_batch(&self, texts: &[&str]) -> EmbedResult<Vec<Vec<f32>>> {
            let mut model = self
                .model
                .lock()
                .map_err(|e| EmbedError::EmbedFailed(e.to_string()))?;
            model
                .embed(texts.iter().map(|t| t.to_string()).collect::<Vec<_>>(), None)
                .map_err(|e| EmbedError::EmbedFailed(e.to_string()))
        }

        fn dimension(&self) -> usize {
            384
        }

        fn name(&self) -> &str {
            Self::NAME
        }
    }
}

/// Sentence model for `data_dir`, when the `embeddings` feature is on.
///
/// `None` means retrieval falls back to [`KeywordEmbedder`].
pub fn default_model(data_dir: &std::path::Path) -> Option<std::sync::Arc<dyn Embedder>> {
    #[cfg(feature = "embeddings")]
    {
        match MiniLmEmbedder::new(data_dir.join("embedding_cache")) {
            Ok(model) => return Some(std::sync::Arc::new(model)),
            Err(e) => tracing::warn!(error = %e, "Falling back to keyword retrieval"),
        }
    }
    #[cfg(not(feature = "embeddings"))]
    let _ = data_dir;
    None
}

pub(crate) fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Cosine similarity; zero when either side is empty or all zeros.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    f64::from(dot / (norm_a * norm_b))
}

/// Embedder that groups clinical synonyms onto shared dimensions.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    const CONCEPTS: &[&[&str]] = &[
        &["seizure", "seizures", "convulsion", "convulsions", "fits"],
        &["stroke", "alteplase", "thrombolysis", "clot"],
        &["driving", "drive", "car"],
        &["lasting", "minutes", "prolonged", "stop", "stopping"],
    ];

    pub struct ConceptEmbedder;

    impl Embedder for ConceptEmbedder {
        fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
            let mut vector = vec![0.0; CONCEPTS.len()];
            for token in tokenize(text) {
                if let Some(i) = CONCEPTS.iter().position(|c| c.contains(&token.as_str())) {
                    vector[i] += 1.0;
                }
            }
            Ok(vector)
        }

        fn dimension(&self) -> usize {
            CONCEPTS.len()
        }

        fn name(&self) -> &str {
            "concept"
        }
    }
}
