//! Reference toolchain.
//!
//! A deliberately small template dialect so the engine can be driven end to
//! end without an external compiler:
//!
//! - [`parse`]: template source → [`Template`] (translator)
//! - [`codegen`]: [`Template`] → line-marked assembly (generator)
//! - [`backend`]: assembly → JSON [`Program`] (compile backend)
//! - [`program`]: bytecode → [`ProgramType`] (definer) and rendering

pub mod backend;
pub mod codegen;
pub mod parse;
pub mod program;

pub use backend::BuiltinBackend;
pub use codegen::BuiltinGenerator;
pub use parse::{BuiltinTranslator, Template};
pub use program::{BuiltinDefiner, Program, ProgramType};

use std::sync::Arc;

use crate::compiler::Toolchain;

/// The builtin toolchain.
pub fn toolchain() -> Toolchain {
    Toolchain::new(
        Arc::new(BuiltinTranslator),
        Arc::new(BuiltinGenerator),
        Arc::new(BuiltinBackend),
        Arc::new(BuiltinDefiner),
    )
}
