//! Character profiles from a corpus of stories by semantic retrieval.
//!
//! Documents are split into overlapping chunks, embedded, and indexed in a
//! flat L2 [`index::VectorIndex`] kept positionally aligned with a chunk
//! [`store::Store`]. Lookups combine four aspect queries against that pair
//! with a literal scan of the raw sources to synthesize a
//! [`profile::CharacterInfo`].

pub mod chunker;
pub mod config;
pub mod corpus;
pub mod document;
pub mod embedder;
pub mod error;
pub mod index;
pub mod persist;
pub mod profile;
pub mod retriever;
pub mod sources;
pub mod store;
pub mod vector_ops;

pub use config::State;
pub use corpus::{build_index, build_or_load, load_index, lookup_character, IndexHandle};
pub use document::{Chunk, SourceDocument};
pub use embedder::{Embedder, HashingEmbedder};
pub use error::{EmbedError, IndexError, Misalignment, TalevecError};
pub use profile::{CharacterInfo, CharacterType, Relation};
pub use retriever::Retriever;
pub use sources::{FsSources, MemorySources, SourceReader};
