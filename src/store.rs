//! File-backed stores for the two halves of a project
//!
//! Each project owns one JSON file per store, named `<project>.json`. The
//! record store is written only by the importer; the metadata store only by
//! the repository layer. Directories are created on demand.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::project::{ProjectMetadata, RepositoryRecord};

const EXTENSION: &str = "json";

/// Directory of `<name>.json` files holding one serialized value each
#[derive(Debug, Clone)]
struct JsonDir {
    dir: PathBuf,
}

impl JsonDir {
    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, EXTENSION))
    }

    fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.path_for(name);
        let content =
            std::fs::read_to_string(&path).map_err(|e| SyncError::persistence("read", &path, e))?;
        serde_json::from_str(&content).map_err(|e| SyncError::persistence("parse", &path, e))
    }

    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.path_for(name);
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| SyncError::persistence("create directory", &self.dir, e))?;
        let content = serde_json::to_string_pretty(value)
            .map_err(|e| SyncError::persistence("serialize", &path, e))?;
        std::fs::write(&path, content).map_err(|e| SyncError::persistence("write", &path, e))?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    /// Sorted base names of every `.json` file; a missing directory is empty
    fn names(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| SyncError::persistence("list", &self.dir, e))?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(EXTENSION))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Store of imported [`RepositoryRecord`] files
#[derive(Debug, Clone)]
pub struct RecordStore {
    inner: JsonDir,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: JsonDir { dir: dir.into() },
        }
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.inner.path_for(name)
    }

    /// Overwrite the record file for `record.name` wholesale
    pub fn save(&self, record: &RepositoryRecord) -> Result<()> {
        self.inner.write(&record.name, record)
    }

    pub fn load(&self, name: &str) -> Result<RepositoryRecord> {
        self.inner.read(name)
    }

    pub fn names(&self) -> Result<Vec<String>> {
        self.inner.names()
    }
}

/// Store of user-assigned [`ProjectMetadata`] files
#[derive(Debug, Clone)]
pub struct MetadataStore {
    inner: JsonDir,
}

impl MetadataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: JsonDir { dir: dir.into() },
        }
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.inner.path_for(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.inner.exists(name)
    }

    /// `None` when the project has no metadata file yet
    pub fn load(&self, name: &str) -> Result<Option<ProjectMetadata>> {
        if !self.exists(name) {
            return Ok(None);
        }
        self.inner.read(name).map(Some)
    }

    pub fn save(&self, name: &str, metadata: &ProjectMetadata) -> Result<()> {
        self.inner.write(name, metadata)
    }
}
