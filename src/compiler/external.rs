//! Interfaces of the external toolchain.
//!
//! The engine never looks inside a template. It drives four collaborators:
//!
//! ```text
//! source ──Translator──▶ Ir ──Generator──▶ GeneratedSource ──CompileBackend──▶ bytecode
//!                                                                    │
//!                                              TypeDefiner ◀── Loader┘
//! ```
//!
//! Only the translator's diagnostics and dependency list, the generator's
//! text and the backend's bytecode or diagnostics are interpreted here.

use std::any::Any;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::type_name;
use crate::error::Diagnostic;
use crate::loader::TypeDefiner;
use crate::store::ArtifactStore;

// ============================================================================
// Translation
// ============================================================================

/// Opaque intermediate representation owned by the translator.
pub struct Ir(Box<dyn Any + Send>);

impl Ir {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// Borrow the IR as the concrete type the generator expects.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl std::fmt::Debug for Ir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Ir(..)")
    }
}

/// Output of one translation.
#[derive(Debug)]
pub struct Translation {
    pub ir: Ir,
    /// Logical paths of the templates this one depends on.
    pub dependencies: Vec<String>,
    /// Non-empty means the translation failed.
    pub diagnostics: Vec<Diagnostic>,
}

impl Translation {
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Template source to IR.
pub trait Translator: Send + Sync {
    /// Translate `source` (the contents of logical `path`).
    ///
    /// In `restricted` mode only the template's interface is needed; its own
    /// dependencies must not be reported.
    fn translate(&self, path: &str, source: &str, restricted: bool) -> Translation;
}

// ============================================================================
// Generation
// ============================================================================

/// What the generator should emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateMode {
    /// Complete handler type.
    Full,
    /// Interface only, enough for dependents to compile against.
    Prototype,
}

/// Inputs to the generator besides the IR.
#[derive(Debug, Clone)]
pub struct GenerateContext<'a> {
    pub path: &'a str,
    pub type_name: &'a str,
    pub namespace: &'a str,
    pub mode: GenerateMode,
}

/// IR to source text.
pub trait Generator: Send + Sync {
    /// Generation failures are reported as a message against the template.
    fn generate(&self, ir: &Ir, context: &GenerateContext<'_>) -> Result<String, String>;
}

// ============================================================================
// Backend
// ============================================================================

/// Generated source text handed to the backend.
#[derive(Debug, Clone)]
pub struct GeneratedSource {
    /// Logical template path, used for diagnostics.
    pub path: String,
    pub type_name: String,
    pub text: String,
}

/// Bytecode visible to a backend invocation.
///
/// Lookups prefer the overlay (prototypes of the current session) over the
/// artifact store.
#[derive(Clone)]
pub struct Classpath {
    namespace: String,
    store: Arc<dyn ArtifactStore>,
    overlay: FxHashMap<String, Arc<[u8]>>,
}

impl Classpath {
    pub fn new(namespace: impl Into<String>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            namespace: namespace.into(),
            store,
            overlay: FxHashMap::default(),
        }
    }

    pub fn with_overlay(mut self, overlay: FxHashMap<String, Arc<[u8]>>) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Qualified type name of a logical path.
    pub fn type_name_for(&self, path: &str) -> String {
        type_name(&self.namespace, path)
    }

    /// Bytecode of `name`, if visible.
    pub fn lookup(&self, name: &str) -> Option<Arc<[u8]>> {
        if let Some(bytes) = self.overlay.get(name) {
            return Some(bytes.clone());
        }
        self.store.load(name).ok().flatten()
    }
}

impl std::fmt::Debug for Classpath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classpath")
            .field("namespace", &self.namespace)
            .field("overlay", &self.overlay.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Source text to bytecode.
///
/// Arguments are owned so an invocation can run on a separate thread under
/// a time bound.
pub trait CompileBackend: Send + Sync {
    /// Diagnostics must already point at template lines.
    fn compile(&self, source: GeneratedSource, classpath: Classpath)
    -> Result<Vec<u8>, Vec<Diagnostic>>;
}

// ============================================================================
// Toolchain
// ============================================================================

/// The set of collaborators a deployment compiles and loads with.
#[derive(Clone)]
pub struct Toolchain {
    pub translator: Arc<dyn Translator>,
    pub generator: Arc<dyn Generator>,
    pub backend: Arc<dyn CompileBackend>,
    pub definer: Arc<dyn TypeDefiner>,
}

impl Toolchain {
    pub fn new(
        translator: Arc<dyn Translator>,
        generator: Arc<dyn Generator>,
        backend: Arc<dyn CompileBackend>,
        definer: Arc<dyn TypeDefiner>,
    ) -> Self {
        Self {
            translator,
            generator,
            backend,
            definer,
        }
    }

    /// The reference toolchain shipped with the crate.
    pub fn builtin() -> Self {
        crate::builtin::toolchain()
    }
}
