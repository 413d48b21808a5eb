//! Result store for published artifacts.
//!
//! The store is the only state shared between concurrent conform runs. Each
//! run writes under a freshly generated id, so writers never contend on a
//! key; files are written to a hidden temp name and renamed into place so a
//! reader never observes a partial artifact.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::models::OutputFormat;

/// Errors from result store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Store I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// An artifact read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub id: String,
    pub format: OutputFormat,
    pub bytes: Vec<u8>,
}

impl StoredArtifact {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Keyed storage for finished artifacts.
pub trait ResultStore: Send + Sync {
    /// Store bytes under a new opaque id and return it.
    ///
    /// `label` is folded into the id for readability; it carries no meaning.
    fn put(&self, bytes: &[u8], format: OutputFormat, label: &str) -> StoreResult<String>;

    /// Read an artifact back by id.
    fn get(&self, id: &str) -> StoreResult<StoredArtifact>;
}

/// Filesystem-backed store: one file per artifact in a single folder.
#[derive(Debug, Clone)]
pub struct FsResultStore {
    root: PathBuf,
    prefix: String,
}

impl FsResultStore {
    /// Create a store rooted at `root`, creating the folder if needed.
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io("creating store folder", e))?;
        Ok(Self {
            root,
            prefix: prefix.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Generate a fresh id.
    fn new_id(&self, format: OutputFormat, label: &str) -> String {
        let uid = Uuid::new_v4().simple().to_string();
        let label = sanitize_label(label);
        match (self.prefix.is_empty(), label.is_empty()) {
            (true, true) => format!("{}.{}", uid, format.extension()),
            (true, false) => format!("{}_{}.{}", uid, label, format.extension()),
            (false, true) => format!("{}_{}.{}", self.prefix, uid, format.extension()),
            (false, false) => format!(
                "{}_{}_{}.{}",
                self.prefix,
                uid,
                label,
                format.extension()
            ),
        }
    }
}

impl ResultStore for FsResultStore {
    fn put(&self, bytes: &[u8], format: OutputFormat, label: &str) -> StoreResult<String> {
        let id = self.new_id(format, label);
        let final_path = self.root.join(&id);
        let temp_path = self.root.join(format!(".{}.tmp", id));

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)
                .map_err(|e| StoreError::io("creating artifact", e))?;
            file.write_all(bytes)
                .map_err(|e| StoreError::io("writing artifact", e))?;
            file.sync_all()
                .map_err(|e| StoreError::io("syncing artifact", e))?;
        }

        fs::rename(&temp_path, &final_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            StoreError::io("publishing artifact", e)
        })?;

        tracing::debug!("Stored artifact {} ({} bytes)", id, bytes.len());
        Ok(id)
    }

    fn get(&self, id: &str) -> StoreResult<StoredArtifact> {
        if !is_valid_id(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let path = self.root.join(id);
        if !path.is_file() {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(id.to_string()),
            _ => StoreError::io("reading artifact", e),
        })?;

        Ok(StoredArtifact {
            id: id.to_string(),
            format: OutputFormat::from_file_name(id),
            bytes,
        })
    }
}

/// Ids are single path components that are not hidden.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && !id.contains("..")
        && !id.contains('/')
        && !id.contains('\\')
}

fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = FsResultStore::new(dir.path(), "chronique").unwrap();

        let id = store.put(b"ID3abc", OutputFormat::Mp3, "9000").unwrap();
        assert!(id.starts_with("chronique_"));
        assert!(id.ends_with("_9000.mp3"));

        let artifact = store.get(&id).unwrap();
        assert_eq!(artifact.bytes, b"ID3abc");
        assert_eq!(artifact.content_type(), "audio/mpeg");
    }

    #[test]
    fn ids_are_unique() {
        let dir = tempdir().unwrap();
        let store = FsResultStore::new(dir.path(), "").unwrap();
        let a = store.put(b"a", OutputFormat::Wav, "").unwrap();
        let b = store.put(b"b", OutputFormat::Wav, "").unwrap();
        assert_ne!(a, b);
        assert_eq!(store.get(&a).unwrap().bytes, b"a");
        assert_eq!(store.get(&b).unwrap().content_type(), "audio/wav");
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let store = FsResultStore::new(dir.path(), "x").unwrap();
        store.put(b"data", OutputFormat::Wav, "1").unwrap();

        let hidden = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .count();
        assert_eq!(hidden, 0);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FsResultStore::new(dir.path(), "x").unwrap();
        assert!(matches!(
            store.get("x_missing_1.mp3"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn traversal_ids_are_not_found() {
        let dir = tempdir().unwrap();
        let inner = dir.path().join("store");
        let store = FsResultStore::new(&inner, "x").unwrap();
        fs::write(dir.path().join("secret.wav"), b"s").unwrap();

        assert!(matches!(store.get("../secret.wav"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.get(".hidden"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.get(""), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn labels_are_sanitized() {
        let dir = tempdir().unwrap();
        let store = FsResultStore::new(dir.path(), "x").unwrap();
        let id = store.put(b"a", OutputFormat::Wav, "../9000").unwrap();
        assert!(id.ends_with("_9000.wav"));
        assert!(!id.contains('/'));
    }
}
