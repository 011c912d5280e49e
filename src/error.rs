use std::fmt;
use std::path::PathBuf;

/// File-level failures of the vector index and chunk store artifacts.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("artifact not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt artifact at {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cannot index zero-length vectors")]
    EmptyVector,

    #[error("failed to encode store: {0}")]
    Encode(#[from] bincode::Error),
}

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::Missing { path: path.into() }
        } else {
            Self::Io {
                path: path.into(),
                source,
            }
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("embedding model failed: {0}")]
    Model(String),

    #[error("embedder returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedder returned a {actual}-dimensional vector, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// How a loaded index/store pair failed to line up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Misalignment {
    Length { index_len: usize, store_len: usize },
    Generation { index_tag: u64, store_tag: u64 },
}

impl fmt::Display for Misalignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Misalignment::Length {
                index_len,
                store_len,
            } => write!(f, "index holds {index_len} vectors but store holds {store_len} chunks"),
            Misalignment::Generation {
                index_tag,
                store_tag,
            } => write!(
                f,
                "index tag {index_tag:016x} does not match store tag {store_tag:016x}"
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TalevecError {
    #[error("no index found at {} / {}; build one first", index_path.display(), store_path.display())]
    IndexNotFound {
        index_path: PathBuf,
        store_path: PathBuf,
    },

    #[error("failed to load index: {0}")]
    IndexLoad(#[from] IndexError),

    #[error("misaligned store: {0}")]
    StoreMisaligned(Misalignment),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("failed to read source {source_id}: {source}")]
    SourceRead {
        source_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to persist index: {0}")]
    Persist(IndexError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, TalevecError>;
