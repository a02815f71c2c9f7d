//! Sources read from a directory tree.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::{SourceError, SourceProvider};
use crate::core::normalize_path;

/// Templates under a root directory; logical `/a/b.tpl` maps to
/// `<root>/a/b.tpl`.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Physical location of a logical path.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let normalized = normalize_path(path);
        self.root.join(normalized.trim_start_matches('/'))
    }

    /// Logical path for a physical file under the root.
    pub fn logical_path(&self, file: &Path) -> Option<String> {
        let rel = file.strip_prefix(&self.root).ok()?;
        Some(normalize_path(&rel.to_string_lossy()))
    }

    fn map_err(path: &str, err: io::Error) -> SourceError {
        if err.kind() == io::ErrorKind::NotFound {
            SourceError::NotFound {
                path: path.to_string(),
            }
        } else {
            SourceError::Io {
                path: path.to_string(),
                source: err,
            }
        }
    }
}

impl SourceProvider for FsSource {
    fn last_modified(&self, path: &str) -> Result<SystemTime, SourceError> {
        let file = self.resolve(path);
        let meta = file.metadata().map_err(|e| Self::map_err(path, e))?;
        if !meta.is_file() {
            return Err(SourceError::NotFound {
                path: path.to_string(),
            });
        }
        meta.modified().map_err(|e| Self::map_err(path, e))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        std::fs::read(self.resolve(path)).map_err(|e| Self::map_err(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_and_mtime() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pages")).unwrap();
        fs::write(dir.path().join("pages/a.tpl"), "hello").unwrap();

        let source = FsSource::new(dir.path());
        assert_eq!(source.read_to_string("/pages/a.tpl").unwrap(), "hello");
        assert!(source.last_modified("pages/a.tpl").is_ok());
    }

    #[test]
    fn test_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let source = FsSource::new(dir.path());

        assert!(source.last_modified("/missing.tpl").unwrap_err().is_not_found());
        assert!(source.read("/missing.tpl").unwrap_err().is_not_found());
    }

    #[test]
    fn test_directory_is_not_a_source() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pages")).unwrap();
        let source = FsSource::new(dir.path());

        assert!(source.last_modified("/pages").unwrap_err().is_not_found());
    }

    #[test]
    fn test_logical_path() {
        let source = FsSource::new("/srv/site");
        assert_eq!(
            source.logical_path(Path::new("/srv/site/blog/a.tpl")),
            Some("/blog/a.tpl".to_string())
        );
        assert_eq!(source.logical_path(Path::new("/etc/passwd")), None);
    }

    #[test]
    fn test_resolve_cannot_escape_root() {
        let source = FsSource::new("/srv/site");
        assert_eq!(source.resolve("/../../etc/passwd"), PathBuf::from("/srv/site/etc/passwd"));
    }
}
