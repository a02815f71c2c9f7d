//! Artifact metadata data structures.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Metadata file extension (next to `<stem>.bin`)
pub const META_EXT: &str = "json";

/// Timestamp of one dependency at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyStamp {
    /// Logical path of the dependency.
    pub path: String,
    /// `None` when the dependency did not exist.
    pub modified: Option<SystemTime>,
}

impl DependencyStamp {
    pub fn new(path: impl Into<String>, modified: Option<SystemTime>) -> Self {
        Self {
            path: path.into(),
            modified,
        }
    }
}

/// Information about a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Qualified type name.
    pub name: String,
    /// Logical template path.
    pub source_path: String,
    /// Source timestamp the artifact was compiled from.
    pub source_stamp: SystemTime,
    /// Dependencies with their timestamps at compile time.
    #[serde(default)]
    pub dependencies: Vec<DependencyStamp>,
    /// Bytecode checksum (blake3 hex).
    pub checksum: String,
    /// When the artifact was written.
    pub stored_at: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_meta_json_preserves_exact_timestamps() {
        let stamp = SystemTime::UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789);
        let meta = ArtifactMeta {
            name: "gen.a_002etpl".into(),
            source_path: "/a.tpl".into(),
            source_stamp: stamp,
            dependencies: vec![DependencyStamp::new("/b.tpf", None)],
            checksum: "00".into(),
            stored_at: stamp,
        };

        let json = serde_json::to_string(&meta).unwrap();
        let parsed: ArtifactMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.source_stamp, stamp);
        assert_eq!(parsed.dependencies[0].modified, None);
    }
}
