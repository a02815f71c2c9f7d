//! On-demand template compilation with staleness detection, artifact
//! caching and hot reload.
//!
//! A [`Coordinator`] owns one deployment: a source tree, a compile
//! [`Toolchain`], an artifact store and the registry of compilation units.
//! Each request compiles its unit when needed, loads the artifact into a
//! fresh loader and invokes the resulting handler.
//!
//! ```ignore
//! let config = EngineConfig::load_or_default(Path::new("site"))?;
//! let coordinator = Coordinator::builder(config).build()?;
//! match coordinator.handle("/index.tpl", false) {
//!     ServiceResult::Served(response) => println!("{}", response.body),
//!     other => eprintln!("{:?}", other),
//! }
//! ```

pub mod logger;
pub mod builtin;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod coordinator;
pub mod core;
pub mod error;
pub mod loader;
pub mod registry;
pub mod source;
pub mod store;
pub mod unit;

pub use compiler::Toolchain;
pub use config::EngineConfig;
pub use coordinator::{Coordinator, CoordinatorBuilder, ServiceResult, Stats};
pub use error::{CompileError, Diagnostic, EngineError};
pub use loader::{Request, Response};
