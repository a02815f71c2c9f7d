//! Everything one deployment compiles, stores and serves with.

use std::sync::Arc;

use crate::compiler::{Classpath, CompileSession, Toolchain};
use crate::config::EngineConfig;
use crate::core::{Clock, UnitKind, normalize_path, type_name};
use crate::loader::{CodeSpace, Loader};
use crate::registry::Registry;
use crate::source::SourceProvider;
use crate::store::ArtifactStore;
use crate::unit::Unit;

/// Shared context of a deployment.
///
/// Owned by the [`Coordinator`](super::Coordinator) and shared with the
/// recheck thread.
pub struct Deployment {
    pub config: EngineConfig,
    pub sources: Arc<dyn SourceProvider>,
    pub toolchain: Toolchain,
    pub store: Arc<dyn ArtifactStore>,
    /// Parent code space of every loader.
    pub platform: Arc<dyn CodeSpace>,
    pub clock: Arc<dyn Clock>,
    pub registry: Registry,
}

impl Deployment {
    #[inline]
    pub fn namespace(&self) -> &str {
        &self.config.runtime.namespace
    }

    /// Qualified type name generated for a logical path.
    pub fn type_name(&self, path: &str) -> String {
        type_name(self.namespace(), path)
    }

    /// Unit for `path`, created on first use.
    pub fn unit(&self, path: &str) -> Arc<Unit> {
        let path = normalize_path(path);
        self.registry.get_or_create(&path, || {
            let kind = UnitKind::from_path(&path, &self.config.compile.fragment_extension);
            Unit::new(path.clone(), kind, self.type_name(&path))
        })
    }

    /// New isolated code space over the artifact store.
    pub fn new_loader(&self) -> Arc<Loader> {
        Loader::new(
            self.namespace(),
            self.platform.clone(),
            self.store.clone(),
            self.toolchain.definer.clone(),
        )
    }

    /// Classpath for a backend invocation within `session`.
    pub fn classpath(&self, session: &CompileSession) -> Classpath {
        Classpath::new(self.namespace(), self.store.clone()).with_overlay(session.overlay())
    }
}
