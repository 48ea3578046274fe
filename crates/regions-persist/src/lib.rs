//! File-backed document store for regions.
//!
//! One pretty-printed JSON file per area:
//!
//! ```text
//! <root>/
//! ├── worlds/
//! │   └── <world name>.json
//! └── regions/
//!     └── <region name>.json
//! ```
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crash mid-save leaves the previous document intact.

mod error;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use regions_core::{AreaKind, Document, DocumentStore};

pub use error::{Result, StoreError};

const EXTENSION: &str = "json";

/// A [`DocumentStore`] over a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the area directories.
    ///
    /// # Errors
    /// Returns an error if a directory cannot be created.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            root: root.as_ref().to_path_buf(),
        };
        for kind in [AreaKind::World, AreaKind::Region] {
            let dir = store.dir(kind);
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }

        tracing::debug!("opened document store at {}", store.root.display());
        Ok(store)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding documents of one kind.
    #[must_use]
    pub fn dir(&self, kind: AreaKind) -> PathBuf {
        self.root.join(match kind {
            AreaKind::World => "worlds",
            AreaKind::Region => "regions",
        })
    }

    /// File holding one document.
    #[must_use]
    pub fn path(&self, kind: AreaKind, name: &str) -> PathBuf {
        self.dir(kind).join(format!("{name}.{EXTENSION}"))
    }
}

impl DocumentStore for FileStore {
    type Error = StoreError;

    fn list(&self, kind: AreaKind) -> Result<Vec<String>> {
        let dir = self.dir(kind);
        let entries = fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&dir, e))?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, kind: AreaKind, name: &str) -> Result<Document> {
        let path = self.path(kind, name);
        let text = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
        serde_json::from_str(&text).map_err(|e| StoreError::json(&path, e))
    }

    fn write(&mut self, kind: AreaKind, name: &str, document: &Document) -> Result<()> {
        let path = self.path(kind, name);
        let text = serde_json::to_string_pretty(document).map_err(|e| StoreError::json(&path, e))?;

        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        fs::write(&tmp, text).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;

        tracing::trace!("wrote {}", path.display());
        Ok(())
    }

    fn remove(&mut self, kind: AreaKind, name: &str) -> Result<()> {
        let path = self.path(kind, name);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::trace!("deleted {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}
