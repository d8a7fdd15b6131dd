use thiserror::Error;

use super::model::Document;

/// Why a buffer could not be read as a document.
#[derive(Debug, Error)]
pub enum ParseIssue {
    #[error("document text is empty")]
    Empty,
    #[error("document text is not a valid flow document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Strict parse. Callers that must always end up with a document use
/// [`Document::from_text_or_default`].
pub fn parse_document(text: &str) -> Result<Document, ParseIssue> {
    if text.trim().is_empty() {
        return Err(ParseIssue::Empty);
    }
    Ok(serde_json::from_str(text)?)
}

/// Pretty JSON with two-space indentation, the format hosts persist.
pub fn serialize_document(doc: &Document) -> String {
    // Document only holds strings, numbers and maps with string keys.
    serde_json::to_string_pretty(doc).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize document: {}", e);
        String::new()
    })
}

impl Document {
    /// Parse `text`, substituting the default document on any issue.
    pub fn from_text_or_default(text: &str) -> Document {
        match parse_document(text) {
            Ok(doc) => doc,
            Err(ParseIssue::Empty) => Document::default(),
            Err(issue) => {
                tracing::warn!("{}; opening an empty document instead", issue);
                Document::default()
            }
        }
    }

    pub fn to_text(&self) -> String {
        serialize_document(self)
    }
}
