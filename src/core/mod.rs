//! Core types - pure abstractions shared across the codebase.

mod clock;
mod kind;
mod name;

pub use clock::{Clock, ManualClock, SystemClock};
pub use kind::UnitKind;
pub use name::{in_namespace, normalize_path, resolve_relative, type_file_stem, type_name};
