//! Configuration sections of `stencil.toml`.

mod compile;
mod runtime;
mod store;

pub use compile::CompileConfig;
pub use runtime::RuntimeConfig;
pub use store::StoreConfig;

use serde::{Deserialize, Serialize};

/// `[log]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Print `debug!` output.
    pub verbose: bool,
}
