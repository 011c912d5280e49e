use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::document::Chunk;
use crate::error::IndexError;
use crate::persist::{write_atomic, PairTag};

#[derive(Deserialize, Serialize)]
struct StoreFile {
    pair_tag: u64,
    chunks: Vec<Chunk>,
}

/// Chunk texts and their source metadata, positionally aligned with the
/// vectors of a [`crate::index::VectorIndex`]. Alignment is kept by the
/// build orchestration, not by the store.
#[derive(Debug, Clone, Default)]
pub struct Store {
    chunks: Vec<Chunk>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, chunks: Vec<Chunk>) {
        self.chunks.extend(chunks);
    }

    pub fn get(&self, id: usize) -> Option<&Chunk> {
        self.chunks.get(id)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// Distinct source ids in first-seen order.
    pub fn sources(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.chunks
            .iter()
            .map(|c| c.source_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    pub fn chunk_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for chunk in &self.chunks {
            *counts.entry(chunk.source_id.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn to_bytes(&self, tag: PairTag) -> Result<Vec<u8>, IndexError> {
        let file = StoreFile {
            pair_tag: tag.0,
            chunks: self.chunks.clone(),
        };
        Ok(bincode::serialize(&file)?)
    }

    pub fn save(&self, path: &Path, tag: PairTag) -> Result<(), IndexError> {
        write_atomic(path, &self.to_bytes(tag)?)?;
        info!(chunks = self.len(), "store saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<(Self, PairTag), IndexError> {
        let bytes = fs::read(path).map_err(|e| IndexError::io(path, e))?;
        let file: StoreFile = bincode::deserialize(&bytes)
            .map_err(|e| IndexError::corrupt(path, e.to_string()))?;
        info!(chunks = file.chunks.len(), "store loaded from {}", path.display());
        Ok((
            Self {
                chunks: file.chunks,
            },
            PairTag(file.pair_tag),
        ))
    }
}
