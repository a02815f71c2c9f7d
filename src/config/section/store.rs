//! `[store]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [store]
//! in_memory = false             # keep artifacts in memory only
//! scratch_dir = ".stencil/work" # artifacts live in <scratch_dir>/<deployment>/
//! deployment = "default"
//! keep_generated = true         # mirror generated source next to artifacts
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Artifact storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Never touch disk. Artifacts do not survive a restart.
    pub in_memory: bool,

    /// Root of the scratch area (relative paths resolve against the
    /// config file's directory).
    pub scratch_dir: PathBuf,

    /// Name of the deployment subtree.
    pub deployment: String,

    /// Write generated source text next to each artifact.
    pub keep_generated: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            in_memory: false,
            scratch_dir: PathBuf::from(".stencil/work"),
            deployment: "default".to_string(),
            keep_generated: true,
        }
    }
}

impl StoreConfig {
    /// Directory holding this deployment's artifacts.
    pub fn deployment_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.scratch_dir).join(&self.deployment)
    }
}
