//! Prompt-context sources: few-shot examples and static guidelines.

mod examples;
mod guidelines;

pub use examples::*;
pub use guidelines::*;

use thiserror::Error;
use tracing::debug;

use crate::models::{AnalysisType, Condition};
use crate::rag::GuidelineIndex;

/// Library loading/saving errors.
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid library JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Embedding error: {0}")]
    Embedding(#[from] crate::rag::EmbedError),
}

pub type LibraryResult<T> = Result<T, LibraryError>;

/// Replace `path` with `contents` through a sibling `.tmp` file.
///
/// Readers see either the old file or the new one, never a partial write.
pub(crate) fn write_atomic(path: &std::path::Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}

/// Number of guideline hits injected from retrieval.
pub const RAG_RESULTS: usize = 2;

/// Everything the prompt builder can draw context from.
#[derive(Clone, Copy)]
pub struct ContextSources<'a> {
    pub library: &'a FewShotLibrary,
    pub guidelines: &'a GuidelineCorpus,
    pub rag: Option<&'a GuidelineIndex>,
}

impl<'a> ContextSources<'a> {
    /// Build the enhanced context block for a prompt.
    ///
    /// Combines few-shot examples, the static guideline section and
    /// retrieved guidelines for `query`. Empty when no condition is known.
    pub fn enhanced_context(
        &self,
        condition: Option<Condition>,
        analysis_type: AnalysisType,
        num_examples: usize,
        query: Option<&str>,
    ) -> String {
        let Some(condition) = condition else {
            return String::new();
        };

        let mut parts = Vec::new();

        let examples = self.library.examples_for(
            condition.as_str(),
            num_examples,
            Some(analysis_type.as_str()),
            true,
        );
        if !examples.is_empty() {
            parts.push(FewShotLibrary::format_for_prompt(&examples));
        }

        let static_guidelines = self.guidelines.context_for(condition.as_str(), None);
        if !static_guidelines.is_empty() {
            parts.push(format!(
                "\n📚 CLINICAL GUIDELINES (Static):\n{static_guidelines}\n"
            ));
        }

        if let (Some(index), Some(query)) = (self.rag, query) {
            let retrieved = index.retrieve(query, Some(condition.as_str()), RAG_RESULTS);
            if !retrieved.is_empty() {
                parts.push(retrieved);
            }
        }

        debug!(
            condition = %condition,
            examples = examples.len(),
            parts = parts.len(),
            "Built enhanced context"
        );
        parts.join("\n")
    }
}
