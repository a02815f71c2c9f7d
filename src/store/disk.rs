//! Artifact store mirrored to a deployment directory.
//!
//! Layout for type `gen.blog.a_002etpl` under `<dir>`:
//!
//! ```text
//! <dir>/gen/blog/a_002etpl.bin    bytecode
//! <dir>/gen/blog/a_002etpl.json   ArtifactMeta
//! <dir>/gen/blog/a_002etpl.src    generated source (keep_generated)
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;

use super::meta::META_EXT;
use super::{Artifact, ArtifactMeta, ArtifactStore, StoreError, checksum};
use crate::core::type_file_stem;

/// In-memory bytecode table backed by a directory.
#[derive(Debug)]
pub struct DiskStore {
    dir: PathBuf,
    keep_generated: bool,
    table: DashMap<String, Arc<[u8]>>,
    metas: DashMap<String, ArtifactMeta>,
}

impl DiskStore {
    /// Open (and create) the deployment directory.
    pub fn open(dir: impl Into<PathBuf>, keep_generated: bool) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        Ok(Self {
            dir,
            keep_generated,
            table: DashMap::new(),
            metas: DashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a file belonging to `name` with the given extension.
    pub fn file_for(&self, name: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{ext}", type_file_stem(name)))
    }

    /// Write via a temporary sibling and rename so readers never observe a
    /// partial file.
    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| io_err(path, e))
    }

    fn read_meta(&self, name: &str) -> Result<Option<ArtifactMeta>, StoreError> {
        let path = self.file_for(name, META_EXT);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&path, e)),
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| StoreError::Meta {
                name: name.to_string(),
                message: e.to_string(),
            })
    }
}

impl ArtifactStore for DiskStore {
    fn put(&self, artifact: Artifact) -> Result<ArtifactMeta, StoreError> {
        let meta = ArtifactMeta {
            name: artifact.name.clone(),
            source_path: artifact.source_path,
            source_stamp: artifact.source_stamp,
            dependencies: artifact.dependencies,
            checksum: checksum(&artifact.bytecode),
            stored_at: SystemTime::now(),
        };

        if self.keep_generated {
            if let Some(text) = &artifact.generated {
                Self::write_atomic(&self.file_for(&artifact.name, "src"), text.as_bytes())?;
            }
        }

        // Bytecode first, metadata last: metadata marks the artifact complete.
        Self::write_atomic(&self.file_for(&artifact.name, "bin"), &artifact.bytecode)?;
        let json = serde_json::to_string_pretty(&meta).map_err(|e| StoreError::Meta {
            name: artifact.name.clone(),
            message: e.to_string(),
        })?;
        Self::write_atomic(&self.file_for(&artifact.name, META_EXT), json.as_bytes())?;

        self.table
            .insert(artifact.name.clone(), Arc::from(artifact.bytecode));
        self.metas.insert(artifact.name.clone(), meta.clone());
        crate::debug!("store"; "wrote {} ({})", artifact.name, &meta.checksum[..16]);
        Ok(meta)
    }

    fn load(&self, name: &str) -> Result<Option<Arc<[u8]>>, StoreError> {
        if let Some(bytes) = self.table.get(name) {
            return Ok(Some(bytes.clone()));
        }

        let Some(meta) = self.meta(name) else {
            return Ok(None);
        };
        let path = self.file_for(name, "bin");
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&path, e)),
        };
        if checksum(&bytes) != meta.checksum {
            return Err(StoreError::Corrupt {
                name: name.to_string(),
            });
        }

        let bytes: Arc<[u8]> = Arc::from(bytes);
        self.table.insert(name.to_string(), bytes.clone());
        Ok(Some(bytes))
    }

    fn meta(&self, name: &str) -> Option<ArtifactMeta> {
        if let Some(meta) = self.metas.get(name) {
            return Some(meta.clone());
        }
        match self.read_meta(name) {
            Ok(Some(meta)) => {
                self.metas.insert(name.to_string(), meta.clone());
                Some(meta)
            }
            Ok(None) => None,
            Err(e) => {
                crate::log!("store"; "ignoring artifact {}: {}", name, e);
                None
            }
        }
    }

    fn remove(&self, name: &str) {
        self.table.remove(name);
        self.metas.remove(name);
        for ext in ["bin", META_EXT, "src"] {
            let _ = fs::remove_file(self.file_for(name, ext));
        }
    }

    fn clear(&self) {
        self.table.clear();
        self.metas.clear();
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
