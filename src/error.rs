//! Error taxonomy for compilation, loading and service.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

// ============================================================================
// Diagnostic
// ============================================================================

/// A single diagnostic pointing into a template source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Logical template path the diagnostic refers to.
    pub file: String,
    /// 1-based line, when known.
    pub line: Option<u32>,
    /// 1-based column, when known.
    pub column: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
            message: message.into(),
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        write!(f, ": {}", self.message)
    }
}

/// Join diagnostics one per line.
pub fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// CompileError
// ============================================================================

/// Failure while turning a template into an artifact.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    #[error("translation of `{path}` failed:\n{}", render_diagnostics(.diagnostics))]
    Translation {
        path: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("code generation for `{path}` failed: {message}")]
    Generation { path: String, message: String },

    #[error("compilation of `{path}` failed:\n{}", render_diagnostics(.diagnostics))]
    Backend {
        path: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("compilation of `{path}` exceeded {limit:?}")]
    Timeout { path: String, limit: Duration },

    #[error("`{path}` depends on `{dependency}` which failed to compile")]
    Dependency {
        path: String,
        dependency: String,
        #[source]
        source: Box<CompileError>,
    },

    #[error("storing artifact for `{path}` failed: {message}")]
    Store { path: String, message: String },

    #[error("reading `{path}` failed: {message}")]
    Source { path: String, message: String },
}

impl CompileError {
    /// Whether this error is retained on the unit and replayed.
    ///
    /// Storage and source I/O failures may be transient and are reported
    /// without caching.
    pub fn is_cacheable(&self) -> bool {
        match self {
            Self::Store { .. } | Self::Source { .. } => false,
            Self::Dependency { source, .. } => source.is_cacheable(),
            _ => true,
        }
    }

    /// All diagnostics carried by this error (including nested dependencies).
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            Self::Translation { diagnostics, .. } | Self::Backend { diagnostics, .. } => {
                diagnostics.clone()
            }
            Self::Generation { path, message }
            | Self::Store { path, message }
            | Self::Source { path, message } => {
                vec![Diagnostic::new(path.clone(), message.clone())]
            }
            Self::Timeout { path, limit } => vec![Diagnostic::new(
                path.clone(),
                format!("compilation timed out after {}ms", limit.as_millis()),
            )],
            Self::Dependency { source, .. } => source.diagnostics(),
        }
    }
}

// ============================================================================
// LoadError
// ============================================================================

/// Failure while materializing a compiled type.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("type `{name}` not found")]
    NotFound { name: String },

    #[error("artifact for `{name}` is corrupt: {message}")]
    Corrupt { name: String, message: String },

    #[error("instance of `{name}` failed to initialize: {message}")]
    Init { name: String, message: String },
}

// ============================================================================
// HandlerError
// ============================================================================

/// Error raised by an instantiated handler.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// Transient unavailability; `None` means the default backoff applies.
    #[error("temporarily unavailable")]
    Unavailable { retry_after: Option<Duration> },

    #[error("{0}")]
    Failed(String),
}

// ============================================================================
// EngineError
// ============================================================================

/// Error surfaced to the caller through `ServiceResult::Error`.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("handler for `{path}` failed: {message}")]
    Runtime { path: String, message: String },
}

impl EngineError {
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            Self::Compile(e) => e.diagnostics(),
            Self::Load(e) => vec![Diagnostic::new(String::new(), e.to_string())],
            Self::Runtime { path, message } => vec![Diagnostic::new(path.clone(), message.clone())],
        }
    }
}
