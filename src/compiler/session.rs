//! Per-request compilation session.
//!
//! A session is created for one top-level request and threaded through every
//! nested compile it triggers. It knows which templates are currently being
//! compiled (so a dependency on one of them is a cycle), owns the prototypes
//! produced for those cycles, and records the include edges of the pass.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::DependencyEdges;
use crate::core::normalize_path;

/// State shared by all compiles of one top-level request.
#[derive(Debug, Default)]
pub struct CompileSession {
    /// Templates being compiled, innermost last.
    active: Vec<String>,
    /// Interface-only bytecode by type name.
    prototypes: FxHashMap<String, Arc<[u8]>>,
    edges: DependencyEdges,
    prototype_compiles: usize,
}

impl CompileSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` as being compiled.
    pub fn enter(&mut self, path: &str) {
        self.active.push(normalize_path(path));
    }

    /// Mark the innermost compile of `path` as finished.
    pub fn leave(&mut self, path: &str) {
        let path = normalize_path(path);
        if let Some(pos) = self.active.iter().rposition(|p| *p == path) {
            self.active.remove(pos);
        }
    }

    /// Whether `path` is being compiled in this session.
    pub fn is_active(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.active.contains(&path)
    }

    /// Depth of the compile stack.
    pub fn depth(&self) -> usize {
        self.active.len()
    }

    pub fn record_edges(&mut self, from: &str, includes: &[String]) {
        self.edges.record(from, includes);
    }

    /// Include chain that closes a cycle when `from` includes `to`.
    pub fn cycle(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut chain = self.edges.path_between(to, from)?;
        chain.push(normalize_path(to));
        Some(chain)
    }

    pub fn prototype(&self, type_name: &str) -> Option<Arc<[u8]>> {
        self.prototypes.get(type_name).cloned()
    }

    pub fn insert_prototype(&mut self, type_name: impl Into<String>, bytes: Arc<[u8]>) {
        self.prototype_compiles += 1;
        self.prototypes.insert(type_name.into(), bytes);
    }

    /// Prototypes visible to the next backend invocation.
    pub fn overlay(&self) -> FxHashMap<String, Arc<[u8]>> {
        self.prototypes.clone()
    }

    /// Number of prototype compiles performed in this session.
    pub fn prototype_compiles(&self) -> usize {
        self.prototype_compiles
    }
}
