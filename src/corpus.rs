use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::chunker::{SplitterConfig, TextSplitter};
use crate::config::State;
use crate::document::{Chunk, SourceDocument};
use crate::embedder::{embed_batched, Embedder};
use crate::error::{EmbedError, IndexError, Misalignment, Result, TalevecError};
use crate::index::VectorIndex;
use crate::persist::{PairTag, Staged};
use crate::profile::{self, CharacterInfo};
use crate::sources::SourceReader;
use crate::store::Store;

/// An immutable, aligned index/store pair. Only constructible through
/// alignment-checked paths, and never mutated afterwards.
#[derive(Debug)]
pub struct IndexHandle {
    index: VectorIndex,
    store: Store,
}

impl IndexHandle {
    pub fn new(index: VectorIndex, store: Store) -> Result<Self> {
        if index.len() != store.len() {
            return Err(TalevecError::StoreMisaligned(Misalignment::Length {
                index_len: index.len(),
                store_len: store.len(),
            }));
        }
        Ok(Self { index, store })
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Chunks, embeds and indexes `documents`, then publishes both artifacts.
/// Nothing is written unless every step succeeds.
pub fn build_index(
    documents: &[SourceDocument],
    embedder: &dyn Embedder,
    state: &State,
) -> Result<IndexHandle> {
    state.validate()?;
    if embedder.dimension() != state.dimensions {
        return Err(TalevecError::InvalidConfig(format!(
            "embedder produces {}-dimensional vectors but dimensions is {}",
            embedder.dimension(),
            state.dimensions
        )));
    }

    let splitter = TextSplitter::new(SplitterConfig::from(state))?;
    let mut chunks: Vec<Chunk> = Vec::new();
    for document in documents {
        let doc_chunks = splitter.split_document(document);
        info!(chunks = doc_chunks.len(), "processed {}", document.source_id);
        chunks.extend(doc_chunks);
    }

    info!(chunks = chunks.len(), "creating embeddings");
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    let vectors = embed_batched(embedder, &texts, state.embed_batch_size)?;
    if vectors.len() != chunks.len() {
        return Err(EmbedError::CountMismatch {
            expected: chunks.len(),
            actual: vectors.len(),
        }
        .into());
    }

    let mut index = VectorIndex::with_dimension(embedder.dimension());
    let mut store = Store::new();
    index.add(&vectors)?;
    store.append(chunks);
    let handle = IndexHandle::new(index, store)?;

    persist_pair(&handle, state)?;
    info!(
        chunks = handle.len(),
        "index and store written to {} and {}",
        state.index_path.display(),
        state.store_path.display()
    );
    Ok(handle)
}

/// Both artifacts are staged before either is renamed into place. The store
/// is published first; a reader racing the two renames sees mismatched tags.
/// If the index rename fails, the store is put back the way it was.
fn persist_pair(handle: &IndexHandle, state: &State) -> Result<()> {
    let tag = PairTag::generate(handle.len(), state.dimensions);
    let index_stage = Staged::new(&state.index_path, &handle.index.to_bytes(tag))
        .map_err(TalevecError::Persist)?;
    let store_bytes = handle.store.to_bytes(tag).map_err(TalevecError::Persist)?;
    let store_stage =
        Staged::new(&state.store_path, &store_bytes).map_err(TalevecError::Persist)?;
    let previous_store =
        Staged::snapshot(&state.store_path).map_err(TalevecError::Persist)?;

    store_stage.publish().map_err(TalevecError::Persist)?;
    if let Err(err) = index_stage.publish() {
        restore_store(previous_store, &state.store_path);
        return Err(TalevecError::Persist(err));
    }
    Ok(())
}

fn restore_store(previous: Option<Staged>, store_path: &Path) {
    let restored = match previous {
        Some(previous) => previous.publish(),
        None => fs::remove_file(store_path).map_err(|e| IndexError::io(store_path, e)),
    };
    match restored {
        Ok(()) => warn!("index publish failed, store rolled back"),
        Err(err) => warn!(error = %err, "index publish failed and store rollback failed"),
    }
}

/// Loads the persisted pair, verifying dimension and alignment.
pub fn load_index(state: &State) -> Result<IndexHandle> {
    let index_exists = state.index_path.exists();
    let store_exists = state.store_path.exists();
    if !index_exists && !store_exists {
        return Err(TalevecError::IndexNotFound {
            index_path: state.index_path.clone(),
            store_path: state.store_path.clone(),
        });
    }
    if !store_exists {
        warn!("index present without store");
        return Err(IndexError::Missing {
            path: state.store_path.clone(),
        }
        .into());
    }

    info!("loading existing index");
    let (index, index_tag) = VectorIndex::load(&state.index_path, state.dimensions)?;
    let (store, store_tag) = Store::load(&state.store_path)?;

    if index.len() != store.len() {
        return Err(TalevecError::StoreMisaligned(Misalignment::Length {
            index_len: index.len(),
            store_len: store.len(),
        }));
    }
    if index_tag != store_tag {
        return Err(TalevecError::StoreMisaligned(Misalignment::Generation {
            index_tag: index_tag.0,
            store_tag: store_tag.0,
        }));
    }
    IndexHandle::new(index, store)
}

/// Builds from `documents` when given, otherwise loads the persisted pair.
pub fn build_or_load(
    documents: Option<&[SourceDocument]>,
    embedder: &dyn Embedder,
    state: &State,
) -> Result<Arc<IndexHandle>> {
    let handle = match documents {
        Some(documents) => build_index(documents, embedder, state)?,
        None => load_index(state)?,
    };
    Ok(Arc::new(handle))
}

/// Looks a character up against an already resident pair. `Ok(None)` means
/// the name occurs in no source document.
pub fn lookup_character(
    handle: &IndexHandle,
    embedder: &dyn Embedder,
    sources: &dyn SourceReader,
    name: &str,
    state: &State,
) -> Result<Option<CharacterInfo>> {
    profile::lookup(handle, embedder, sources, name, &profile::ProfileRules::from(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;
    use tempfile::{tempdir, TempDir};

    fn state_in(dir: &TempDir) -> State {
        State {
            index_path: dir.path().join("story_index.tvx"),
            store_path: dir.path().join("story_store.bin"),
            dimensions: 64,
            chunk_size: 60,
            chunk_overlap: 10,
            ..State::default()
        }
    }

    fn documents() -> Vec<SourceDocument> {
        vec![
            SourceDocument::new(
                "castle.txt",
                "The knight rode to the castle. The queen waited at the gate. \
                 A storm gathered over the hills while the bells rang.",
            ),
            SourceDocument::new("forest.txt", "Wolves ran through the forest at night."),
        ]
    }

    #[test]
    fn build_then_load_gives_identical_search() {
        let dir = tempdir().unwrap();
        let state = state_in(&dir);
        let embedder = HashingEmbedder::new(64);

        let built = build_index(&documents(), &embedder, &state).unwrap();
        let loaded = load_index(&state).unwrap();
        assert_eq!(built.len(), loaded.len());
        assert_eq!(built.index().len(), built.store().len());

        let query = embedder.encode(&["queen at the gate"]).unwrap().remove(0);
        assert_eq!(
            built.index().search(&query, 4).unwrap(),
            loaded.index().search(&query, 4).unwrap()
        );
    }

    #[test]
    fn chunks_keep_document_order() {
        let dir = tempdir().unwrap();
        let state = state_in(&dir);
        let handle = build_index(&documents(), &HashingEmbedder::new(64), &state).unwrap();
        let sources: Vec<&str> = handle.store().iter().map(|c| c.source_id.as_str()).collect();
        let first_forest = sources.iter().position(|s| *s == "forest.txt").unwrap();
        assert!(sources[..first_forest].iter().all(|s| *s == "castle.txt"));
        assert!(first_forest > 1);
    }

    #[test]
    fn load_without_artifacts_is_index_not_found() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_index(&state_in(&dir)),
            Err(TalevecError::IndexNotFound { .. })
        ));
    }

    #[test]
    fn load_with_only_index_is_load_error() {
        let dir = tempdir().unwrap();
        let state = state_in(&dir);
        build_index(&documents(), &HashingEmbedder::new(64), &state).unwrap();
        std::fs::remove_file(&state.store_path).unwrap();
        assert!(matches!(
            load_index(&state),
            Err(TalevecError::IndexLoad(IndexError::Missing { .. }))
        ));
    }

    #[test]
    fn shortened_store_is_misaligned() {
        let dir = tempdir().unwrap();
        let state = state_in(&dir);
        let handle = build_index(&documents(), &HashingEmbedder::new(64), &state).unwrap();

        let (_, tag) = Store::load(&state.store_path).unwrap();
        let mut short = Store::new();
        short.append(handle.store().iter().skip(1).cloned().collect());
        short.save(&state.store_path, tag).unwrap();

        assert!(matches!(
            load_index(&state),
            Err(TalevecError::StoreMisaligned(Misalignment::Length { .. }))
        ));
    }

    #[test]
    fn store_from_another_build_is_misaligned() {
        let dir = tempdir().unwrap();
        let state = state_in(&dir);
        let handle = build_index(&documents(), &HashingEmbedder::new(64), &state).unwrap();
        handle
            .store()
            .save(&state.store_path, PairTag(0xdead_beef))
            .unwrap();

        assert!(matches!(
            load_index(&state),
            Err(TalevecError::StoreMisaligned(Misalignment::Generation { .. }))
        ));
    }

    #[test]
    fn embedder_dimension_must_match_config() {
        let dir = tempdir().unwrap();
        let state = state_in(&dir);
        let err = build_index(&documents(), &HashingEmbedder::new(32), &state).unwrap_err();
        assert!(matches!(err, TalevecError::InvalidConfig(_)));
        assert!(!state.index_path.exists());
        assert!(!state.store_path.exists());
    }

    #[test]
    fn failed_build_leaves_previous_artifacts() {
        struct Broken;
        impl Embedder for Broken {
            fn dimension(&self) -> usize {
                64
            }
            fn encode(
                &self,
                _texts: &[&str],
            ) -> std::result::Result<Vec<Vec<crate::config::Number>>, EmbedError> {
                Err(EmbedError::Model("out of memory".into()))
            }
        }

        let dir = tempdir().unwrap();
        let state = state_in(&dir);
        build_index(&documents(), &HashingEmbedder::new(64), &state).unwrap();
        let before = std::fs::read(&state.index_path).unwrap();

        let err = build_index(&documents(), &Broken, &state).unwrap_err();
        assert!(matches!(err, TalevecError::Embedding(_)));
        assert_eq!(std::fs::read(&state.index_path).unwrap(), before);
        assert!(load_index(&state).is_ok());
    }

    #[test]
    fn failed_index_publish_restores_previous_store() {
        let dir = tempdir().unwrap();
        let state = state_in(&dir);
        build_index(&documents(), &HashingEmbedder::new(64), &state).unwrap();
        let store_before = std::fs::read(&state.store_path).unwrap();

        // a non-empty directory cannot be replaced by a file rename
        std::fs::remove_file(&state.index_path).unwrap();
        std::fs::create_dir(&state.index_path).unwrap();
        std::fs::write(state.index_path.join("occupied"), b"x").unwrap();

        let fresh = vec![SourceDocument::new("other.txt", "A different tale entirely.")];
        let err = build_index(&fresh, &HashingEmbedder::new(64), &state).unwrap_err();
        assert!(matches!(err, TalevecError::Persist(_)));
        assert_eq!(std::fs::read(&state.store_path).unwrap(), store_before);
    }

    #[test]
    fn failed_first_publish_leaves_no_store() {
        let dir = tempdir().unwrap();
        let state = state_in(&dir);
        std::fs::create_dir(&state.index_path).unwrap();
        std::fs::write(state.index_path.join("occupied"), b"x").unwrap();

        let err = build_index(&documents(), &HashingEmbedder::new(64), &state).unwrap_err();
        assert!(matches!(err, TalevecError::Persist(_)));
        assert!(!state.store_path.exists());
    }

    #[test]
    fn build_or_load_prefers_documents() {
        let dir = tempdir().unwrap();
        let state = state_in(&dir);
        let embedder = HashingEmbedder::new(64);
        let docs = documents();

        let built = build_or_load(Some(docs.as_slice()), &embedder, &state).unwrap();
        let loaded = build_or_load(None, &embedder, &state).unwrap();
        assert_eq!(built.len(), loaded.len());
    }

    #[test]
    fn empty_corpus_round_trips() {
        let dir = tempdir().unwrap();
        let state = state_in(&dir);
        let handle = build_index(&[], &HashingEmbedder::new(64), &state).unwrap();
        assert!(handle.is_empty());
        assert!(load_index(&state).unwrap().is_empty());
    }
}
