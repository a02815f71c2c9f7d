//! Engine configuration from `stencil.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                             |
//! |-------------|-----------------------------------------------------|
//! | `[compile]` | Recompilation policy, timeouts, fragment extension  |
//! | `[runtime]` | Unavailability backoff, include depth, namespace    |
//! | `[store]`   | In-memory vs. scratch directory artifact storage    |
//! | `[log]`     | Verbose output                                      |

mod error;
pub mod section;

pub use error::ConfigError;
pub use section::{CompileConfig, LogConfig, RuntimeConfig, StoreConfig};

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::log;

/// Default config file name.
pub const CONFIG_FILE: &str = "stencil.toml";

/// Root configuration structure representing stencil.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory the config was loaded from; relative paths resolve here
    /// (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub compile: CompileConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl EngineConfig {
    /// Parse configuration from TOML string.
    ///
    /// Unknown fields are reported through the logger and otherwise ignored.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let (config, ignored) = Self::parse_with_ignored(content)?;
        for field in &ignored {
            log!("config"; "unknown field `{}` ignored", field);
        }
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file; its parent directory becomes the root.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let mut config = Self::parse(&content)?;
        config.root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    /// Load `stencil.toml` from `root` if present, defaults otherwise.
    pub fn load_or_default(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        if path.exists() {
            return Self::from_path(&path);
        }
        Ok(Self {
            root: root.to_path_buf(),
            ..Self::default()
        })
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Reject combinations the engine cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.namespace.trim().is_empty() {
            return Err(ConfigError::Validation(
                "runtime.namespace must not be empty".into(),
            ));
        }
        if self.runtime.max_include_depth == 0 {
            return Err(ConfigError::Validation(
                "runtime.max_include_depth must be at least 1".into(),
            ));
        }
        if self.store.deployment.trim().is_empty() {
            return Err(ConfigError::Validation(
                "store.deployment must not be empty".into(),
            ));
        }
        if self.compile.precompiled_only && self.store.in_memory {
            return Err(ConfigError::Validation(
                "compile.precompiled_only requires a disk-backed store".into(),
            ));
        }
        if self.compile.page_extension.is_empty() {
            return Err(ConfigError::Validation(
                "compile.page_extension must not be empty".into(),
            ));
        }
        if self.compile.fragment_extension.is_empty() {
            return Err(ConfigError::Validation(
                "compile.fragment_extension must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Directory holding this deployment's artifacts.
    pub fn deployment_dir(&self) -> PathBuf {
        self.store.deployment_dir(&self.root)
    }
}

#[cfg(test)]
pub fn test_parse_config(extra: &str) -> EngineConfig {
    let (parsed, ignored) = EngineConfig::parse_with_ignored(extra).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}
