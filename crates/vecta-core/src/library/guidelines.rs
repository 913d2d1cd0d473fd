//! Static clinical guideline corpus.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::LibraryResult;

#[derive(Debug, Default, Deserialize)]
struct CorpusFile {
    #[serde(default)]
    neurology_guidelines: BTreeMap<String, Value>,
}

/// One retrievable (condition, topic) section of the corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuidelineChunk {
    /// `guideline_<n>` in corpus order
    pub id: String,
    pub condition: String,
    pub topic: String,
    pub content: String,
    pub source: String,
    pub url: String,
}

/// Guidelines keyed by condition then topic.
#[derive(Debug, Clone, Default)]
pub struct GuidelineCorpus {
    sections: BTreeMap<String, Value>,
    path: Option<PathBuf>,
}

impl GuidelineCorpus {
    /// Load the corpus from disk. A missing file yields an empty corpus.
    pub fn load<P: AsRef<Path>>(path: P) -> LibraryResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Guidelines not found; using empty corpus");
            return Ok(Self {
                sections: BTreeMap::new(),
                path: Some(path.to_path_buf()),
            });
        }

        let mut corpus = Self::from_json(&std::fs::read_to_string(path)?)?;
        corpus.path = Some(path.to_path_buf());
        info!(
            path = %path.display(),
            conditions = corpus.sections.len(),
            "Loaded guideline corpus"
        );
        Ok(corpus)
    }

    /// Parse a corpus from JSON text.
    pub fn from_json(raw: &str) -> LibraryResult<Self> {
        let file: CorpusFile = serde_json::from_str(raw)?;
        Ok(Self {
            sections: file.neurology_guidelines,
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Readable guideline text for a condition.
    ///
    /// With a known `topic` only that section is rendered. Returns an empty
    /// string for unknown conditions.
    pub fn context_for(&self, condition: &str, topic: Option<&str>) -> String {
        let Some(section) = self.sections.get(condition) else {
            return String::new();
        };

        let content = topic
            .and_then(|t| section.get(t))
            .unwrap_or(section);
        render_titled(content, 0)
    }

    /// Flatten the corpus into retrievable chunks.
    ///
    /// Topics whose content is empty or not an object are skipped.
    pub fn chunks(&self) -> Vec<GuidelineChunk> {
        let mut chunks = Vec::new();
        for (condition, topics) in &self.sections {
            let Some(topics) = topics.as_object() else {
                continue;
            };
            for (topic, data) in topics {
                let Some(data) = data.as_object() else {
                    continue;
                };

                let content = match data.get("content") {
                    Some(Value::String(s)) => s.clone(),
                    Some(nested @ Value::Object(_)) => render_plain(nested),
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(scalar_text)
                        .collect::<Vec<_>>()
                        .join("\n"),
                    _ => String::new(),
                };
                if content.trim().is_empty() {
                    continue;
                }

                let text_field = |key: &str| {
                    data.get(key)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                chunks.push(GuidelineChunk {
                    id: format!("guideline_{}", chunks.len()),
                    condition: condition.clone(),
                    topic: topic.clone(),
                    content,
                    source: text_field("source"),
                    url: text_field("url"),
                });
            }
        }
        chunks
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Indented rendering with title-cased keys, used for prompt context.
fn render_titled(value: &Value, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(key, v)| {
                let title = title_case(key);
                match v {
                    Value::Object(_) | Value::Array(_) => {
                        format!("{pad}{title}:\n{}", render_titled(v, indent + 1))
                    }
                    scalar => format!("{pad}{title}: {}", scalar_text(scalar)),
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Array(items) => items
            .iter()
            .map(|item| format!("{pad}- {}", scalar_text(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        scalar => format!("{pad}{}", scalar_text(scalar)),
    }
}

/// Raw-key rendering of nested content, used for retrieval chunks.
fn render_plain(value: &Value) -> String {
    let Some(map) = value.as_object() else {
        return scalar_text(value);
    };

    let mut lines = Vec::new();
    for (key, v) in map {
        match v {
            Value::Object(_) => {
                lines.push(format!("{key}:"));
                lines.push(render_plain(v));
            }
            Value::Array(items) => {
                lines.push(format!("{key}:"));
                lines.extend(items.iter().map(|item| format!("  - {}", scalar_text(item))));
            }
            scalar => lines.push(format!("{key}: {}", scalar_text(scalar))),
        }
    }
    lines.join("\n")
}
