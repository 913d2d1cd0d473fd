//! Text extraction from uploaded files and direct input.

use std::path::Path;

use thiserror::Error;
use vecta_llm::{TabularData, TabularError};

/// Upload extraction errors.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Unsupported file type: .{ext}. Supported: {supported}")]
    UnsupportedType { ext: String, supported: String },

    #[error("Text extraction from .{0} files is not available. Upload txt, csv or json instead")]
    NoExtractor(String),

    #[error("File {0} is not valid UTF-8 text")]
    Encoding(String),

    #[error("Invalid JSON in {name}: {source}")]
    Json {
        name: String,
        source: serde_json::Error,
    },

    #[error("Invalid CSV in {name}: {source}")]
    Csv { name: String, source: TabularError },
}

pub type UploadResult<T> = Result<T, UploadError>;

/// Text ready for analysis, plus the parsed table when the input was tabular.
#[derive(Debug, Clone)]
pub struct ExtractedInput {
    pub text: String,
    /// Human-readable origin, used in error messages
    pub source: String,
    pub tabular: Option<TabularData>,
}

/// Lowercased extension of `filename`, or an empty string.
pub fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Check the extension against the allow-list.
pub fn check_extension(filename: &str, allowed: &[String]) -> UploadResult<String> {
    let ext = file_extension(filename);
    if allowed.iter().any(|a| *a == ext) {
        Ok(ext)
    } else {
        Err(UploadError::UnsupportedType {
            ext,
            supported: allowed.join(", "),
        })
    }
}

/// Extract analysable text from an uploaded file.
pub fn extract_upload(filename: &str, bytes: &[u8], allowed: &[String]) -> UploadResult<ExtractedInput> {
    let ext = check_extension(filename, allowed)?;
    let source = format!("file {filename}");

    match ext.as_str() {
        "txt" => Ok(ExtractedInput {
            text: utf8(filename, bytes)?.to_string(),
            source,
            tabular: None,
        }),
        "json" => {
            let value: serde_json::Value =
                serde_json::from_slice(bytes).map_err(|source| UploadError::Json {
                    name: filename.to_string(),
                    source,
                })?;
            let text = serde_json::to_string_pretty(&value).map_err(|source| UploadError::Json {
                name: filename.to_string(),
                source,
            })?;
            Ok(ExtractedInput {
                text,
                source,
                tabular: None,
            })
        }
        "csv" => {
            let table = TabularData::from_csv(utf8(filename, bytes)?).map_err(|source| {
                UploadError::Csv {
                    name: filename.to_string(),
                    source,
                }
            })?;
            Ok(ExtractedInput {
                text: table.summary_text(),
                source,
                tabular: Some(table),
            })
        }
        other => Err(UploadError::NoExtractor(other.to_string())),
    }
}

/// Wrap direct text input.
///
/// The text reaches the model as typed. Delimited multi-column text is also
/// parsed as a table so the response can carry the tabular rendering.
pub fn extract_direct_text(text: &str) -> ExtractedInput {
    ExtractedInput {
        text: text.to_string(),
        source: "direct input".to_string(),
        tabular: TabularData::detect(text),
    }
}

fn utf8<'a>(filename: &str, bytes: &'a [u8]) -> UploadResult<&'a str> {
    std::str::from_utf8(bytes).map_err(|_| UploadError::Encoding(filename.to_string()))
}
