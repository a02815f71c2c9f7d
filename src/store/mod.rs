//! Artifact storage for compiled bytecode.
//!
//! One [`ArtifactStore`] interface, two implementations selected by the
//! `[store]` configuration:
//!
//! - [`MemoryStore`]: never touches disk; artifacts die with the process
//! - [`DiskStore`]: in-memory table mirrored to `<scratch>/<deployment>/`,
//!   with per-artifact metadata so staleness survives restarts
//!
//! Writes happen only inside a unit's compile lock, so there is a single
//! writer per key; reads may happen from any thread.

mod disk;
mod meta;
mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;
pub use meta::{ArtifactMeta, DependencyStamp};

use std::sync::Arc;
use std::time::SystemTime;

use thiserror::Error;

use crate::config::EngineConfig;

/// Error type for artifact storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on `{path}`")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact `{name}` failed checksum verification")]
    Corrupt { name: String },

    #[error("metadata for `{name}` is unreadable: {message}")]
    Meta { name: String, message: String },
}

/// A freshly compiled unit, ready to be stored.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Qualified type name.
    pub name: String,
    /// Logical path of the template it was compiled from.
    pub source_path: String,
    pub bytecode: Vec<u8>,
    /// Source timestamp the artifact corresponds to.
    pub source_stamp: SystemTime,
    /// Timestamps of the sources this artifact was compiled against.
    pub dependencies: Vec<DependencyStamp>,
    /// Generated source text, mirrored when the store keeps it.
    pub generated: Option<String>,
}

/// Storage for compiled bytecode, keyed by qualified type name.
pub trait ArtifactStore: Send + Sync {
    /// Store (or replace) an artifact.
    fn put(&self, artifact: Artifact) -> Result<ArtifactMeta, StoreError>;

    /// Bytecode for `name`, preferring memory over the backing directory.
    fn load(&self, name: &str) -> Result<Option<Arc<[u8]>>, StoreError>;

    /// Metadata for `name`, if an artifact exists.
    fn meta(&self, name: &str) -> Option<ArtifactMeta>;

    fn remove(&self, name: &str);

    /// Drop all in-memory state (backing files are kept).
    fn clear(&self);

    /// Whether artifacts survive a restart.
    fn is_persistent(&self) -> bool;
}

/// Open the store described by the configuration.
pub fn open(config: &EngineConfig) -> Result<Arc<dyn ArtifactStore>, StoreError> {
    if config.store.in_memory {
        crate::debug!("store"; "using in-memory artifact store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let dir = config.deployment_dir();
    crate::debug!("store"; "using artifact directory {}", dir.display());
    Ok(Arc::new(DiskStore::open(dir, config.store.keep_generated)?))
}

/// Content checksum of bytecode (blake3 hex).
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_checksum_is_stable() {
        assert_eq!(checksum(b"abc"), checksum(b"abc"));
        assert_ne!(checksum(b"abc"), checksum(b"abd"));
        assert_eq!(checksum(b"abc").len(), 64);
    }

    #[test]
    fn test_open_selects_implementation() {
        let mut config = EngineConfig::default();
        config.store.in_memory = true;
        assert!(!open(&config).unwrap().is_persistent());

        let dir = TempDir::new().unwrap();
        let mut config = EngineConfig::default();
        config.root = dir.path().to_path_buf();
        assert!(open(&config).unwrap().is_persistent());
        assert!(config.deployment_dir().is_dir());
    }
}
