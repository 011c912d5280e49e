use std::collections::HashMap;
use std::fs;
use std::io;

use crate::document::SourceDocument;

/// Supplies the full raw text of a source document by id.
pub trait SourceReader: Send + Sync {
    fn read(&self, source_id: &str) -> io::Result<String>;
}

/// Treats source ids as filesystem paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSources;

impl SourceReader for FsSources {
    fn read(&self, source_id: &str) -> io::Result<String> {
        fs::read_to_string(source_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySources {
    texts: HashMap<String, String>,
}

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source_id: impl Into<String>, text: impl Into<String>) {
        self.texts.insert(source_id.into(), text.into());
    }
}

impl From<&[SourceDocument]> for MemorySources {
    fn from(documents: &[SourceDocument]) -> Self {
        let mut sources = Self::new();
        for doc in documents {
            sources.insert(doc.source_id.clone(), doc.text.clone());
        }
        sources
    }
}

impl SourceReader for MemorySources {
    fn read(&self, source_id: &str) -> io::Result<String> {
        self.texts.get(source_id).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no source registered as {source_id}"),
            )
        })
    }
}

/// Reads each file as a document whose id is its path, in the given order.
pub fn read_documents<P: AsRef<std::path::Path>>(paths: &[P]) -> io::Result<Vec<SourceDocument>> {
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let text = fs::read_to_string(path)?;
            Ok(SourceDocument::new(path.to_string_lossy(), text))
        })
        .collect()
}
