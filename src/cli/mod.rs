//! Command-line interface module.

mod args;
pub mod precompile;
pub mod render;

pub use args::{Cli, Commands, parse_param};
