use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::Number;
use crate::error::EmbedError;
use crate::vector_ops::normalize_vector;

/// Maps text to fixed-dimension vectors. Implementations must be
/// deterministic for a fixed model and return one vector per input.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<Number>>, EmbedError>;
}

/// Embeds `texts` in batches of `batch_size`, running batches concurrently.
/// Output position `i` always belongs to input `i`.
pub fn embed_batched(
    embedder: &dyn Embedder,
    texts: &[&str],
    batch_size: usize,
) -> Result<Vec<Vec<Number>>, EmbedError> {
    let batch_size = batch_size.max(1);
    let expected_dim = embedder.dimension();
    debug!(
        texts = texts.len(),
        batch_size, "embedding in {} batches",
        texts.len().div_ceil(batch_size)
    );

    let batches = texts
        .par_chunks(batch_size)
        .map(|batch| {
            let vectors = embedder.encode(batch)?;
            check_batch(batch.len(), expected_dim, &vectors)?;
            Ok(vectors)
        })
        .collect::<Result<Vec<_>, EmbedError>>()?;

    Ok(batches.into_iter().flatten().collect())
}

/// Embeds a single query string.
pub fn embed_one(embedder: &dyn Embedder, text: &str) -> Result<Vec<Number>, EmbedError> {
    let vectors = embedder.encode(&[text])?;
    check_batch(1, embedder.dimension(), &vectors)?;
    Ok(vectors.into_iter().next().unwrap_or_default())
}

fn check_batch(
    inputs: usize,
    expected_dim: usize,
    vectors: &[Vec<Number>],
) -> Result<(), EmbedError> {
    if vectors.len() != inputs {
        return Err(EmbedError::CountMismatch {
            expected: inputs,
            actual: vectors.len(),
        });
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != expected_dim) {
        return Err(EmbedError::DimensionMismatch {
            expected: expected_dim,
            actual: bad.len(),
        });
    }
    Ok(())
}

/// Offline embedder: signed feature hashing of lowercased word tokens,
/// L2-normalized. Texts sharing words land close together.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<Number> {
        let mut vector = vec![0.0; self.dimension];
        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        normalize_vector(&mut vector);
        vector
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<Number>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}
