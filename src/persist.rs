use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::IndexError;

/// Identifies the build that produced an index/store pair. Both artifacts
/// of one build carry the same tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairTag(pub u64);

impl PairTag {
    pub fn generate(entries: usize, dimension: usize) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(nanos.to_le_bytes());
        hasher.update((entries as u64).to_le_bytes());
        hasher.update((dimension as u64).to_le_bytes());
        hasher.update(std::process::id().to_le_bytes());
        let digest = hasher.finalize();

        let mut buf = [0u8; 8];
        buf.copy_from_slice(&digest[..8]);
        PairTag(u64::from_le_bytes(buf))
    }
}

/// Bytes fully written and synced to a temporary file next to their
/// destination, not yet visible under the destination name.
pub struct Staged {
    file: NamedTempFile,
    dest: PathBuf,
}

impl Staged {
    pub fn new(dest: &Path, bytes: &[u8]) -> Result<Self, IndexError> {
        let dir = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| IndexError::io(&dir, e))?;

        let mut file = NamedTempFile::new_in(&dir).map_err(|e| IndexError::io(&dir, e))?;
        file.write_all(bytes)
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| IndexError::io(file.path(), e))?;
        debug!(bytes = bytes.len(), "staged {}", dest.display());

        Ok(Self {
            file,
            dest: dest.to_path_buf(),
        })
    }

    /// Stages a copy of whatever currently sits at `dest`, so it can be
    /// published back if a later step fails. `None` if `dest` does not exist.
    pub fn snapshot(dest: &Path) -> Result<Option<Self>, IndexError> {
        match fs::read(dest) {
            Ok(bytes) => Self::new(dest, &bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(IndexError::io(dest, e)),
        }
    }

    /// Renames the temporary file over the destination.
    pub fn publish(self) -> Result<(), IndexError> {
        let dest = self.dest;
        self.file
            .persist(&dest)
            .map_err(|e| IndexError::io(&dest, e.error))?;
        Ok(())
    }
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), IndexError> {
    Staged::new(path, bytes)?.publish()
}
