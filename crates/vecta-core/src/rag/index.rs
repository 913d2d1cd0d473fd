//! Dense-vector index over guideline chunks.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::embed::{cosine, Embedder, KeywordEmbedder};
use crate::library::{GuidelineChunk, GuidelineCorpus, LibraryResult};

/// A retrieved chunk and its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: GuidelineChunk,
    pub score: f64,
}

/// Index summary for the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagStats {
    pub available: bool,
    pub total_chunks: usize,
    pub embedding_model: String,
    pub dimension: usize,
    pub source: Option<String>,
}

/// In-process retrieval index.
///
/// Chunks are embedded with a sentence model when one is supplied, or with
/// a [`KeywordEmbedder`] fitted on the corpus otherwise.
#[derive(Clone)]
pub struct GuidelineIndex {
    chunks: Vec<GuidelineChunk>,
    vectors: Vec<Vec<f32>>,
    embedder: Arc<dyn Embedder>,
    model: Option<Arc<dyn Embedder>>,
    source: Option<PathBuf>,
}

impl fmt::Debug for GuidelineIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuidelineIndex")
            .field("chunks", &self.chunks.len())
            .field("embedder", &self.embedder.name())
            .field("source", &self.source)
            .finish()
    }
}

impl Default for GuidelineIndex {
    fn default() -> Self {
        Self {
            chunks: Vec::new(),
            vectors: Vec::new(),
            embedder: Arc::new(KeywordEmbedder::default()),
            model: None,
            source: None,
        }
    }
}

fn chunk_text(chunk: &GuidelineChunk) -> String {
    format!("{} {}", chunk.topic.replace('_', " "), chunk.content)
}

impl GuidelineIndex {
    /// Index every chunk of a corpus with keyword vectors.
    pub fn build(corpus: &GuidelineCorpus) -> Self {
        let chunks = corpus.chunks();
        let texts: Vec<String> = chunks.iter().map(chunk_text).collect();
        let embedder = KeywordEmbedder::fit(&texts);
        let vectors = texts
            .iter()
            .map(|t| embedder.embed(t).unwrap_or_default())
            .collect();

        let index = Self {
            chunks,
            vectors,
            embedder: Arc::new(embedder),
            model: None,
            source: corpus.path().map(|p| p.to_path_buf()),
        };
        index.log_built();
        index
    }

    /// Index every chunk of a corpus with a sentence model.
    pub fn with_model(corpus: &GuidelineCorpus, model: Arc<dyn Embedder>) -> LibraryResult<Self> {
        let chunks = corpus.chunks();
        let texts: Vec<String> = chunks.iter().map(chunk_text).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = if refs.is_empty() {
            Vec::new()
        } else {
            model.embed_batch(&refs)?
        };
        if vectors.len() != chunks.len() {
            return Err(super::EmbedError::CountMismatch {
                expected: chunks.len(),
                got: vectors.len(),
            }
            .into());
        }

        let index = Self {
            chunks,
            vectors,
            embedder: Arc::clone(&model),
            model: Some(model),
            source: corpus.path().map(|p| p.to_path_buf()),
        };
        index.log_built();
        Ok(index)
    }

    /// [`Self::with_model`] when a model is given, [`Self::build`] otherwise.
    pub fn build_with(
        corpus: &GuidelineCorpus,
        model: Option<Arc<dyn Embedder>>,
    ) -> LibraryResult<Self> {
        match model {
            Some(model) => Self::with_model(corpus, model),
            None => Ok(Self::build(corpus)),
        }
    }

    fn log_built(&self) {
        if self.chunks.is_empty() {
            warn!("No guideline chunks to index");
        } else {
            info!(
                chunks = self.chunks.len(),
                embedding_model = self.embedder.name(),
                dimension = self.embedder.dimension(),
                "Indexed guideline chunks"
            );
        }
    }

    /// Rebuild from the corpus file this index was built from.
    ///
    /// Returns the new chunk count. An index without a source is left as is.
    pub fn reindex(&mut self) -> LibraryResult<usize> {
        if let Some(path) = self.source.clone() {
            let corpus = GuidelineCorpus::load(&path)?;
            *self = Self::build_with(&corpus, self.model.clone())?;
        }
        Ok(self.chunks.len())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Top `n` chunks with a positive similarity to `query`.
    ///
    /// A query that fails to embed is logged and matches nothing.
    pub fn search(&self, query: &str, condition: Option<&str>, n: usize) -> Vec<ScoredChunk> {
        if n == 0 || self.chunks.is_empty() {
            return Vec::new();
        }
        let query_vec = match self.embedder.embed(query) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "RAG retrieval error");
                return Vec::new();
            }
        };

        let mut scored: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .zip(&self.vectors)
            .filter(|(chunk, _)| condition.map_or(true, |c| chunk.condition == c))
            .filter_map(|(chunk, vector)| {
                let score = cosine(&query_vec, vector);
                (score > 0.0).then(|| ScoredChunk {
                    chunk: chunk.clone(),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(n);
        scored
    }

    /// Retrieved guidelines formatted for prompt injection.
    ///
    /// Returns an empty string when nothing matches.
    pub fn retrieve(&self, query: &str, condition: Option<&str>, n: usize) -> String {
        let hits = self.search(query, condition, n);
        if hits.is_empty() {
            return String::new();
        }

        let mut parts = vec!["📚 RELEVANT CLINICAL GUIDELINES (RAG):\n".to_string()];
        for (i, hit) in hits.iter().enumerate() {
            let source = if hit.chunk.source.is_empty() {
                "N/A"
            } else {
                hit.chunk.source.as_str()
            };
            parts.push(format!("\n{}. {}:", i + 1, hit.chunk.topic.to_uppercase()));
            parts.push(format!("   Source: {source}"));
            parts.push(format!("   {}\n", hit.chunk.content));
        }
        parts.join("\n")
    }

    pub fn stats(&self) -> RagStats {
        RagStats {
            available: true,
            total_chunks: self.chunks.len(),
            embedding_model: self.embedder.name().to_string(),
            dimension: self.embedder.dimension(),
            source: self.source.as_ref().map(|p| p.display().to_string()),
        }
    }
}
