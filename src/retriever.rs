use serde::Serialize;
use tracing::debug;

use crate::config::Number;
use crate::corpus::IndexHandle;
use crate::embedder::{embed_one, Embedder};
use crate::error::{Misalignment, Result, TalevecError};

/// A retrieved chunk with its position in the index and its distance to the query.
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub id: usize,
    pub distance: Number,
    pub source_id: String,
    pub ordinal: usize,
    pub text: String,
}

/// Read-only query path over a loaded index/store pair.
#[derive(Clone, Copy)]
pub struct Retriever<'a> {
    handle: &'a IndexHandle,
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    pub fn new(handle: &'a IndexHandle, embedder: &'a dyn Embedder) -> Self {
        Self { handle, embedder }
    }

    /// Chunk texts best match first; at most `k`, fewer if the corpus is smaller.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>> {
        Ok(self
            .retrieve_hits(query, k)?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }

    pub fn retrieve_hits(&self, query: &str, k: usize) -> Result<Vec<Hit>> {
        let vector = embed_one(self.embedder, query)?;
        let neighbors = self.handle.index().search(&vector, k)?;
        debug!(query, k, found = neighbors.len(), "retrieved neighbors");

        neighbors
            .into_iter()
            .map(|n| {
                let chunk = self.handle.store().get(n.id).ok_or_else(|| {
                    TalevecError::StoreMisaligned(Misalignment::Length {
                        index_len: self.handle.index().len(),
                        store_len: self.handle.store().len(),
                    })
                })?;
                Ok(Hit {
                    id: n.id,
                    distance: n.distance,
                    source_id: chunk.source_id.clone(),
                    ordinal: chunk.ordinal,
                    text: chunk.text.clone(),
                })
            })
            .collect()
    }
}
