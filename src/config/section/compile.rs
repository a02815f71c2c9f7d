//! `[compile]` section configuration.
//!
//! Controls when templates are (re)compiled.
//!
//! # Example
//!
//! ```toml
//! [compile]
//! development = true                  # check sources on every request
//! precompiled_only = false            # never compile, only load stored artifacts
//! modification_test_interval_ms = 0   # throttle for timestamp checks
//! check_interval_ms = 0               # background recheck (non-development only)
//! timeout_ms = 0                      # backend time bound (0 = unbounded)
//! page_extension = "tpl"
//! fragment_extension = "tpf"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Compilation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Development ("always check") mode.
    /// - `true` (default): failed units are recompiled on every request
    /// - `false`: failures are cached and replayed until the source changes
    ///   and a recheck runs
    pub development: bool,

    /// Only load artifacts that already exist; never invoke the toolchain.
    pub precompiled_only: bool,

    /// Minimum time between two source timestamp checks of the same unit.
    pub modification_test_interval_ms: u64,

    /// Period of the background recheck thread. Only used outside
    /// development mode; `0` disables it.
    pub check_interval_ms: u64,

    /// Upper bound for one backend invocation; `0` means unbounded.
    pub timeout_ms: u64,

    /// File extension of page templates, used when precompiling a tree.
    pub page_extension: String,

    /// File extension that marks a fragment unit.
    pub fragment_extension: String,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            development: true,
            precompiled_only: false,
            modification_test_interval_ms: 0,
            check_interval_ms: 0,
            timeout_ms: 0,
            page_extension: "tpl".to_string(),
            fragment_extension: "tpf".to_string(),
        }
    }
}

impl CompileConfig {
    pub fn modification_test_interval(&self) -> Duration {
        Duration::from_millis(self.modification_test_interval_ms)
    }

    /// Background recheck period, if the recheck thread should run.
    pub fn check_interval(&self) -> Option<Duration> {
        (!self.development && self.check_interval_ms > 0)
            .then(|| Duration::from_millis(self.check_interval_ms))
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Whether a file extension names a template of either kind.
    pub fn is_template_extension(&self, ext: &str) -> bool {
        ext == self.page_extension || ext == self.fragment_extension
    }
}
