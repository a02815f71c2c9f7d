//! In-memory sources with explicit timestamps.

use std::time::{Duration, SystemTime};

use dashmap::DashMap;

use super::{SourceError, SourceProvider};
use crate::core::normalize_path;

#[derive(Debug, Clone)]
struct Entry {
    content: Vec<u8>,
    modified: SystemTime,
}

/// Templates held in memory.
///
/// Timestamps are set by the caller, which makes staleness fully
/// deterministic; writing without a timestamp advances the entry by one
/// second past its previous value.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: DashMap<String, Entry>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a template with an explicit timestamp.
    pub fn insert(&self, path: &str, content: impl Into<Vec<u8>>, modified: SystemTime) {
        self.files.insert(
            normalize_path(path),
            Entry {
                content: content.into(),
                modified,
            },
        );
    }

    /// Replace contents and move the timestamp forward.
    pub fn write(&self, path: &str, content: impl Into<Vec<u8>>) {
        let key = normalize_path(path);
        let modified = self
            .files
            .get(&key)
            .map(|e| e.modified + Duration::from_secs(1))
            .unwrap_or_else(|| SystemTime::UNIX_EPOCH + Duration::from_secs(1));
        self.files.insert(
            key,
            Entry {
                content: content.into(),
                modified,
            },
        );
    }

    /// Set the timestamp without changing contents.
    pub fn touch(&self, path: &str, modified: SystemTime) {
        if let Some(mut entry) = self.files.get_mut(&normalize_path(path)) {
            entry.modified = modified;
        }
    }

    pub fn remove(&self, path: &str) {
        self.files.remove(&normalize_path(path));
    }

    /// All logical paths currently present.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.files.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    fn not_found(path: &str) -> SourceError {
        SourceError::NotFound {
            path: path.to_string(),
        }
    }
}

impl SourceProvider for MemorySource {
    fn last_modified(&self, path: &str) -> Result<SystemTime, SourceError> {
        self.files
            .get(&normalize_path(path))
            .map(|e| e.modified)
            .ok_or_else(|| Self::not_found(path))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        self.files
            .get(&normalize_path(path))
            .map(|e| e.content.clone())
            .ok_or_else(|| Self::not_found(path))
    }
}
