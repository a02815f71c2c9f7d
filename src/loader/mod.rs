//! Isolated code spaces for generated types.
//!
//! A [`Loader`] resolves qualified type names to [`HandlerType`]s. It is
//! layered on a parent [`CodeSpace`] (platform types) and reads bytecode from
//! an [`ArtifactStore`](crate::store::ArtifactStore). Resolved types are
//! cached for the loader's lifetime, so a new version of a type always needs
//! a new loader: units create one per reload.

mod handler;
mod platform;

pub use handler::{Handler, HandlerConfig, HandlerType, Request, Response, same_type};
pub use platform::PlatformTypes;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::core::in_namespace;
use crate::error::LoadError;
use crate::store::{ArtifactStore, StoreError};

/// A space that can resolve type names.
pub trait CodeSpace: Send + Sync {
    fn load_type(&self, name: &str) -> Result<Arc<dyn HandlerType>, LoadError>;
}

/// Turns bytecode into a type. Provided by the toolchain that produced the
/// bytecode.
pub trait TypeDefiner: Send + Sync {
    /// Define `name` from `bytes`. `loader` is the space the type lives in;
    /// types that reference other generated types resolve them through it.
    fn define(
        &self,
        name: &str,
        bytes: &[u8],
        loader: &Arc<Loader>,
    ) -> Result<Arc<dyn HandlerType>, LoadError>;
}

static NEXT_LOADER_ID: AtomicU64 = AtomicU64::new(1);

/// Code space for generated types.
pub struct Loader {
    id: u64,
    namespace: String,
    parent: Arc<dyn CodeSpace>,
    store: Arc<dyn ArtifactStore>,
    definer: Arc<dyn TypeDefiner>,
    resolved: DashMap<String, Arc<dyn HandlerType>>,
}

impl Loader {
    pub fn new(
        namespace: impl Into<String>,
        parent: Arc<dyn CodeSpace>,
        store: Arc<dyn ArtifactStore>,
        definer: Arc<dyn TypeDefiner>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_LOADER_ID.fetch_add(1, Ordering::Relaxed),
            namespace: namespace.into(),
            parent,
            store,
            definer,
            resolved: DashMap::new(),
        })
    }

    /// Unique id of this loader (for diagnostics).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resolve a type name.
    ///
    /// Order: already-resolved cache, parent for names outside the generated
    /// namespace, then the artifact store (memory before backing directory).
    pub fn load_type(self: &Arc<Self>, name: &str) -> Result<Arc<dyn HandlerType>, LoadError> {
        if let Some(ty) = self.resolved.get(name) {
            return Ok(ty.clone());
        }

        // Generated code can never shadow platform types
        if !in_namespace(&self.namespace, name) {
            return self.parent.load_type(name);
        }

        let bytes = self
            .store
            .load(name)
            .map_err(|e: StoreError| LoadError::Corrupt {
                name: name.to_string(),
                message: e.to_string(),
            })?
            .ok_or_else(|| LoadError::NotFound {
                name: name.to_string(),
            })?;

        let ty = self.definer.define(name, &bytes, self)?;
        // A concurrent load may have won; keep the first so identity is stable.
        let ty = self
            .resolved
            .entry(name.to_string())
            .or_insert(ty)
            .clone();
        crate::debug!("load"; "defined {} in loader #{}", name, self.id);
        Ok(ty)
    }

    /// Number of types resolved so far.
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("resolved", &self.resolved.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::store::{Artifact, MemoryStore};
    use std::sync::atomic::AtomicUsize;
    use std::time::SystemTime;

    struct Echo {
        name: String,
    }

    impl Handler for Echo {
        fn service(&self, _request: &Request) -> Result<Response, HandlerError> {
            Ok(Response::new(self.name.clone()))
        }
    }

    struct EchoType {
        name: String,
    }

    impl HandlerType for EchoType {
        fn name(&self) -> &str {
            &self.name
        }

        fn instantiate(&self) -> Result<Box<dyn Handler>, LoadError> {
            Ok(Box::new(Echo {
                name: self.name.clone(),
            }))
        }
    }

    /// Defines every artifact as an echo of its bytecode, counting calls.
    #[derive(Default)]
    struct CountingDefiner {
        calls: AtomicUsize,
    }

    impl TypeDefiner for CountingDefiner {
        fn define(
            &self,
            _name: &str,
            bytes: &[u8],
            _loader: &Arc<Loader>,
        ) -> Result<Arc<dyn HandlerType>, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(EchoType {
                name: String::from_utf8_lossy(bytes).into_owned(),
            }))
        }
    }

    fn store_with(name: &str, bytes: &[u8]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .put(Artifact {
                name: name.into(),
                source_path: "/a.tpl".into(),
                bytecode: bytes.to_vec(),
                source_stamp: SystemTime::UNIX_EPOCH,
                dependencies: vec![],
                generated: None,
            })
            .unwrap();
        store
    }

    #[test]
    fn test_resolved_types_are_cached() {
        let definer = Arc::new(CountingDefiner::default());
        let loader = Loader::new(
            "gen",
            Arc::new(PlatformTypes::new()),
            store_with("gen.a", b"v1"),
            definer.clone(),
        );

        let first = loader.load_type("gen.a").unwrap();
        let second = loader.load_type("gen.a").unwrap();
        assert!(same_type(&first, &second));
        assert_eq!(definer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_new_loader_gives_new_identity() {
        let store = store_with("gen.a", b"v1");
        let definer = Arc::new(CountingDefiner::default());
        let parent: Arc<dyn CodeSpace> = Arc::new(PlatformTypes::new());

        let a = Loader::new("gen", parent.clone(), store.clone(), definer.clone());
        let b = Loader::new("gen", parent, store, definer);
        assert_ne!(a.id(), b.id());
        assert!(!same_type(
            &a.load_type("gen.a").unwrap(),
            &b.load_type("gen.a").unwrap()
        ));
    }

    #[test]
    fn test_names_outside_namespace_go_to_parent() {
        let platform = Arc::new(PlatformTypes::new());
        platform.register(Arc::new(EchoType {
            name: "platform.Echo".into(),
        }));
        // Store also has an artifact under the platform name; it must not win
        let store = store_with("platform.Echo", b"shadow");
        let definer = Arc::new(CountingDefiner::default());
        let loader = Loader::new("gen", platform, store, definer.clone());

        let ty = loader.load_type("platform.Echo").unwrap();
        let out = ty.instantiate().unwrap().service(&Request::default()).unwrap();
        assert_eq!(out.body, "platform.Echo");
        assert_eq!(definer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_type_is_not_found() {
        let loader = Loader::new(
            "gen",
            Arc::new(PlatformTypes::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(CountingDefiner::default()),
        );
        assert!(matches!(
            loader.load_type("gen.missing"),
            Err(LoadError::NotFound { .. })
        ));
        assert!(matches!(
            loader.load_type("other.Missing"),
            Err(LoadError::NotFound { .. })
        ));
    }
}
