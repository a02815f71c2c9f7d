//! Memory-only artifact store.

use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;

use super::{Artifact, ArtifactMeta, ArtifactStore, StoreError, checksum};

/// Artifacts held purely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, (Arc<[u8]>, ArtifactMeta)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ArtifactStore for MemoryStore {
    fn put(&self, artifact: Artifact) -> Result<ArtifactMeta, StoreError> {
        let meta = ArtifactMeta {
            name: artifact.name.clone(),
            source_path: artifact.source_path,
            source_stamp: artifact.source_stamp,
            dependencies: artifact.dependencies,
            checksum: checksum(&artifact.bytecode),
            stored_at: SystemTime::now(),
        };
        let bytes: Arc<[u8]> = Arc::from(artifact.bytecode);
        self.entries.insert(artifact.name, (bytes, meta.clone()));
        Ok(meta)
    }

    fn load(&self, name: &str) -> Result<Option<Arc<[u8]>>, StoreError> {
        Ok(self.entries.get(name).map(|e| e.0.clone()))
    }

    fn meta(&self, name: &str) -> Option<ArtifactMeta> {
        self.entries.get(name).map(|e| e.1.clone())
    }

    fn remove(&self, name: &str) {
        self.entries.remove(name);
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn is_persistent(&self) -> bool {
        false
    }
}
