//! Compilation plumbing between units and the external toolchain.
//!
//! - [`external`]: translator, generator, backend and definer interfaces
//! - [`session`]: state of one top-level request (active compiles, prototypes)
//! - [`dependency`]: include edges recorded during a pass
//! - [`timeout`]: bounded backend invocation

pub mod dependency;
pub mod external;
pub mod session;
pub mod timeout;

pub use dependency::DependencyEdges;
pub use external::{
    Classpath, CompileBackend, GenerateContext, GenerateMode, GeneratedSource, Generator, Ir,
    Toolchain, Translation, Translator,
};
pub use session::CompileSession;
pub use timeout::{BackendFailure, invoke as invoke_backend};
