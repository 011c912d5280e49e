use serde::{Deserialize, Serialize};

/// A raw input document, identified by where it came from.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source_id: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
        }
    }
}

/// A contiguous fragment of a source document. `ordinal` is its position
/// among the chunks of the same source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Chunk {
    pub text: String,
    pub source_id: String,
    pub ordinal: usize,
}
