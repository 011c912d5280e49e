use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::mem::size_of;
use std::path::Path;
use tracing::{debug, info};

use crate::config::Number;
use crate::error::IndexError;
use crate::persist::{write_atomic, PairTag};
use crate::vector_ops::squared_l2_simd;

const MAGIC: &[u8; 4] = b"TVIX";
const FORMAT_VERSION: u32 = 1;
// magic + version + dimension + count + pair tag
const HEADER_LEN: usize = 4 + 4 + 4 + 8 + 8;

/// One search result: the vector's insertion id and its squared L2 distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: usize,
    pub distance: Number,
}

/// Exhaustive nearest-neighbor index over squared Euclidean distance.
/// Vectors are stored contiguously in insertion order; id `i` is the
/// `i`-th vector added.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimension: Option<usize>,
    data: Vec<Number>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            data: Vec::new(),
        }
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        match self.dimension {
            Some(dim) if dim > 0 => self.data.len() / dim,
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends vectors in order. The first vector fixes the dimension; the
    /// whole batch is rejected if any vector disagrees with it.
    pub fn add(&mut self, vectors: &[Vec<Number>]) -> Result<(), IndexError> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        let dim = self.dimension.unwrap_or(first.len());
        if dim == 0 || vectors.iter().any(|v| v.is_empty()) {
            return Err(IndexError::EmptyVector);
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(IndexError::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }

        self.dimension = Some(dim);
        self.data.reserve(vectors.len() * dim);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        debug!(added = vectors.len(), total = self.len(), "vectors added to index");
        Ok(())
    }

    /// The `min(k, len)` nearest vectors, ascending by distance, ties broken
    /// by ascending id.
    pub fn search(&self, query: &[Number], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        let Some(dim) = self.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dim {
            return Err(IndexError::DimensionMismatch {
                expected: dim,
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .par_chunks_exact(dim)
            .enumerate()
            .map(|(id, vector)| Neighbor {
                id,
                distance: squared_l2_simd(query, vector).unwrap_or(Number::INFINITY),
            })
            .collect();

        neighbors.sort_unstable_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });
        neighbors.truncate(k);
        Ok(neighbors)
    }

    /// Serialized form: little-endian header followed by the raw vectors.
    pub fn to_bytes(&self, tag: PairTag) -> Vec<u8> {
        let dim = self.dimension.unwrap_or(0);
        let count = self.len();
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * size_of::<Number>());

        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(dim as u32).to_le_bytes());
        bytes.extend_from_slice(&(count as u64).to_le_bytes());
        bytes.extend_from_slice(&tag.0.to_le_bytes());
        bytes.extend(self.data.iter().flat_map(|&num| num.to_le_bytes()));
        bytes
    }

    pub fn save(&self, path: &Path, tag: PairTag) -> Result<(), IndexError> {
        write_atomic(path, &self.to_bytes(tag))?;
        info!(
            vectors = self.len(),
            "index saved to {}",
            path.display()
        );
        Ok(())
    }

    /// Loads an index written by [`VectorIndex::save`], checking its stored
    /// dimension against `expected_dimension`.
    pub fn load(path: &Path, expected_dimension: usize) -> Result<(Self, PairTag), IndexError> {
        let file = File::open(path).map_err(|e| IndexError::io(path, e))?;
        let mmap = unsafe { Mmap::map(&file).map_err(|e| IndexError::io(path, e))? };

        if mmap.len() < HEADER_LEN {
            return Err(IndexError::corrupt(path, "file shorter than header"));
        }
        if &mmap[0..4] != MAGIC {
            return Err(IndexError::corrupt(path, "bad magic bytes"));
        }
        let version = read_u32(&mmap, 4);
        if version != FORMAT_VERSION {
            return Err(IndexError::corrupt(
                path,
                format!("unsupported format version {version}"),
            ));
        }
        let dim = read_u32(&mmap, 8) as usize;
        let count = read_u64(&mmap, 12) as usize;
        let tag = PairTag(read_u64(&mmap, 20));

        if count > 0 && dim != expected_dimension {
            return Err(IndexError::DimensionMismatch {
                expected: expected_dimension,
                actual: dim,
            });
        }

        let payload_len = count
            .checked_mul(dim)
            .and_then(|n| n.checked_mul(size_of::<Number>()))
            .ok_or_else(|| IndexError::corrupt(path, "header sizes overflow"))?;
        if mmap.len() - HEADER_LEN != payload_len {
            return Err(IndexError::corrupt(
                path,
                format!(
                    "expected {payload_len} payload bytes for {count}x{dim}, found {}",
                    mmap.len() - HEADER_LEN
                ),
            ));
        }

        let data: Vec<Number> = mmap[HEADER_LEN..]
            .chunks_exact(size_of::<Number>())
            .map(|b| Number::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let index = Self {
            dimension: if count > 0 { Some(dim) } else { None },
            data,
        };
        info!(vectors = count, dimension = dim, "index loaded from {}", path.display());
        Ok((index, tag))
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}
