//! Template source access.
//!
//! Units never touch the filesystem directly; they go through a
//! [`SourceProvider`] so the same engine runs against a directory tree or an
//! in-memory set of templates with controlled timestamps.
//!
//! - [`FsSource`]: templates under a root directory, mtime from metadata
//! - [`MemorySource`]: templates held in memory, timestamps set explicitly

mod fs;
mod memory;

pub use fs::FsSource;
pub use memory::MemorySource;

use std::time::SystemTime;

use thiserror::Error;

/// Error type for source access.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Source confirmed absent.
    #[error("source `{path}` not found")]
    NotFound { path: String },

    #[error("IO error when reading `{path}`")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("source `{path}` is not valid UTF-8")]
    Encoding { path: String },
}

impl SourceError {
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Read access to template sources by logical path.
pub trait SourceProvider: Send + Sync {
    /// Modification time of the source.
    fn last_modified(&self, path: &str) -> Result<SystemTime, SourceError>;

    /// Full source contents.
    fn read(&self, path: &str) -> Result<Vec<u8>, SourceError>;

    /// Read contents as UTF-8 text.
    fn read_to_string(&self, path: &str) -> Result<String, SourceError> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|_| SourceError::Encoding {
            path: path.to_string(),
        })
    }
}
