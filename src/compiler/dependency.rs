//! Include edges recorded during one compilation pass.
//!
//! Edges are transient: a [`DependencyEdges`] lives inside a
//! [`CompileSession`](super::CompileSession) and is dropped with it. They are
//! used to report include cycles, never to decide staleness (units keep their
//! own dependency stamps for that).

use rustc_hash::{FxHashMap, FxHashSet};

use crate::core::normalize_path;

type PathSet = FxHashSet<String>;
type PathSetMap = FxHashMap<String, PathSet>;

/// Include graph between logical paths.
///
/// # Invariants
/// - Paths are normalized for reliable matching
/// - Self-references are kept (a template including itself is a cycle)
#[derive(Debug, Default)]
pub struct DependencyEdges {
    /// Template → templates it includes
    forward: PathSetMap,
}

impl DependencyEdges {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the includes of `from`, replacing earlier ones.
    pub fn record<S: AsRef<str>>(&mut self, from: &str, includes: &[S]) {
        let deps: PathSet = includes.iter().map(|p| normalize_path(p.as_ref())).collect();
        self.forward.insert(normalize_path(from), deps);
    }

    /// Shortest include chain from `from` to `to`, both ends included.
    ///
    /// `path_between(b, a)` after recording `a → b` and `b → a` yields
    /// `[b, a]`, which together with the edge `a → b` closes the cycle.
    pub fn path_between(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let from = normalize_path(from);
        let to = normalize_path(to);

        let mut parent: FxHashMap<String, String> = FxHashMap::default();
        let mut seen: PathSet = PathSet::default();
        let mut queue = std::collections::VecDeque::new();
        seen.insert(from.clone());
        queue.push_back(from.clone());

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut chain = vec![current];
                while let Some(prev) = chain.last().and_then(|c| parent.get(c)) {
                    chain.push(prev.clone());
                }
                chain.reverse();
                return Some(chain);
            }
            for next in self.forward.get(&current).into_iter().flatten() {
                if seen.insert(next.clone()) {
                    parent.insert(next.clone(), current.clone());
                    queue.push_back(next.clone());
                }
            }
        }
        None
    }

    /// Number of templates with recorded includes.
    #[inline]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
