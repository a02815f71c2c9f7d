//! `[runtime]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [runtime]
//! unavailable_backoff_ms = 60000   # used when a handler gives no retry hint
//! max_include_depth = 32
//! namespace = "stencil_gen"        # namespace of generated types
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Service-time settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Backoff applied when a handler reports unavailability without a hint.
    pub unavailable_backoff_ms: u64,

    /// Maximum fragment nesting while rendering.
    pub max_include_depth: usize,

    /// Namespace prefix of every generated type name.
    pub namespace: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            unavailable_backoff_ms: 60_000,
            max_include_depth: 32,
            namespace: "stencil_gen".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn unavailable_backoff(&self) -> Duration {
        Duration::from_millis(self.unavailable_backoff_ms)
    }
}
