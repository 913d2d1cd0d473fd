//! Guideline retrieval.
//!
//! Guidelines are chunked per (condition, topic) and embedded as dense
//! vectors, by all-MiniLM-L6-v2 when the `embeddings` feature is enabled and
//! by corpus-fitted TF-IDF otherwise. Queries are matched by cosine
//! similarity, optionally restricted to one condition.

mod embed;
mod index;

pub use embed::*;
pub use index::*;

#[cfg(test)]
pub(crate) use embed::testing;

/// Words ignored when indexing and querying.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in", "is",
    "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "with", "within",
    "after", "before", "patient", "patients",
];

/// Lowercased alphanumeric tokens with stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}
