//! Request entry point.
//!
//! ```text
//! handle(path)
//!   └─ Registry::get_or_create ─▶ [unit lock] ensure_compiled ─▶ ensure_loaded [unlock]
//!                                                                  └─ Handler::service
//! ```
//!
//! Every outcome is a [`ServiceResult`]; compile errors never escape as
//! panics or `Err`.

mod deployment;
pub mod recheck;


pub use deployment::Deployment;
pub use recheck::{RecheckReport, Rechecker};

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::compiler::{CompileSession, Toolchain};
use crate::config::EngineConfig;
use crate::core::{Clock, SystemClock, normalize_path};
use crate::error::{EngineError, HandlerError};
use crate::loader::{CodeSpace, PlatformTypes, Request, Response};
use crate::registry::Registry;
use crate::source::{FsSource, SourceProvider};
use crate::store::{self, ArtifactStore, StoreError};
use crate::unit::{CheckMode, Unit, UnitFailure};

/// Upper bound for a handler's retry hint.
pub const MAX_UNAVAILABLE_BACKOFF: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Result of handling one request.
#[derive(Debug, Clone)]
pub enum ServiceResult {
    Served(Response),
    NotFound,
    /// Retry after the given time.
    Unavailable(SystemTime),
    Error(EngineError),
}

impl ServiceResult {
    #[inline]
    pub fn is_served(&self) -> bool {
        matches!(self, Self::Served(_))
    }

    /// Body of a served response.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Served(response) => Some(&response.body),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&EngineError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }
}

impl From<UnitFailure> for ServiceResult {
    fn from(failure: UnitFailure) -> Self {
        match failure {
            UnitFailure::Removed => Self::NotFound,
            UnitFailure::Unavailable(until) => Self::Unavailable(until),
            UnitFailure::Error(e) => Self::Error(e),
        }
    }
}

/// Unit counts for operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub units: usize,
    pub loaded: usize,
    pub failed: usize,
    pub removed: usize,
    pub compiles: usize,
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`Coordinator`]. Unset parts fall back to the builtin
/// toolchain, the wall clock, an empty platform space and the store selected
/// by the configuration.
pub struct CoordinatorBuilder {
    config: EngineConfig,
    sources: Option<Arc<dyn SourceProvider>>,
    toolchain: Option<Toolchain>,
    store: Option<Arc<dyn ArtifactStore>>,
    platform: Option<Arc<dyn CodeSpace>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoordinatorBuilder {
    pub fn sources(mut self, sources: Arc<dyn SourceProvider>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = Some(toolchain);
        self
    }

    pub fn store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn platform(mut self, platform: Arc<dyn CodeSpace>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Coordinator, StoreError> {
        let store = match self.store {
            Some(store) => store,
            None => store::open(&self.config)?,
        };
        let sources = self
            .sources
            .unwrap_or_else(|| Arc::new(FsSource::new(self.config.root.clone())));
        let check_interval = self.config.compile.check_interval();

        let deployment = Arc::new(Deployment {
            config: self.config,
            sources,
            toolchain: self.toolchain.unwrap_or_else(Toolchain::builtin),
            store,
            platform: self
                .platform
                .unwrap_or_else(|| Arc::new(PlatformTypes::new())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            registry: Registry::new(),
        });

        let recheck = match check_interval {
            Some(interval) => Some(
                Rechecker::spawn(deployment.clone(), interval).map_err(|source| StoreError::Io {
                    path: "stencil-recheck".into(),
                    source,
                })?,
            ),
            None => None,
        };

        Ok(Coordinator {
            deployment,
            _recheck: recheck,
        })
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Serves requests for one deployment.
pub struct Coordinator {
    deployment: Arc<Deployment>,
    /// Stopped and joined on drop.
    _recheck: Option<Rechecker>,
}

impl Coordinator {
    pub fn builder(config: EngineConfig) -> CoordinatorBuilder {
        CoordinatorBuilder {
            config,
            sources: None,
            toolchain: None,
            store: None,
            platform: None,
            clock: None,
        }
    }

    pub fn deployment(&self) -> &Arc<Deployment> {
        &self.deployment
    }

    /// Handle a request for `path` without parameters.
    ///
    /// With `precompile_only` the unit is compiled and loaded but the
    /// instance is not invoked; success is an empty `Served`.
    pub fn handle(&self, path: &str, precompile_only: bool) -> ServiceResult {
        self.handle_request(&Request::new(path), precompile_only)
    }

    pub fn handle_request(&self, request: &Request, precompile_only: bool) -> ServiceResult {
        let deployment = &*self.deployment;
        let unit = deployment.unit(&request.path);

        let instance = {
            let mut state = unit.lock();
            let mut session = CompileSession::new();
            let ready = unit
                .ensure_compiled(&mut state, deployment, &mut session, CheckMode::Request)
                .and_then(|()| unit.ensure_loaded(&mut state, deployment));
            match ready {
                Ok(instance) => instance,
                Err(failure) => return failure.into(),
            }
        };

        if precompile_only {
            return ServiceResult::Served(Response::default());
        }

        let request = Request {
            path: unit.path().to_string(),
            ..request.clone()
        };
        match instance.service(&request) {
            Ok(response) => ServiceResult::Served(response),
            Err(HandlerError::Unavailable { retry_after }) => {
                let backoff = retry_after
                    .unwrap_or_else(|| deployment.config.runtime.unavailable_backoff())
                    .min(MAX_UNAVAILABLE_BACKOFF);
                let now = deployment.clock.now();
                let until = now.checked_add(backoff).unwrap_or(now);
                unit.mark_unavailable(until);
                crate::debug!("load"; "{} unavailable for {:?}", unit.path(), backoff);
                ServiceResult::Unavailable(until)
            }
            Err(HandlerError::Failed(message)) => ServiceResult::Error(EngineError::Runtime {
                path: unit.path().to_string(),
                message,
            }),
        }
    }

    /// Create the unit for `path` ahead of its first request.
    pub fn register(&self, path: &str) -> Arc<Unit> {
        self.deployment.unit(path)
    }

    /// Discard the unit for `path`; the next request starts from scratch.
    ///
    /// This is the only way out of the removed state.
    pub fn invalidate(&self, path: &str) -> bool {
        let removed = self.deployment.registry.remove(&normalize_path(path));
        if removed.is_some() {
            crate::debug!("registry"; "invalidated {}", path);
        }
        removed.is_some()
    }

    /// Run one recheck pass synchronously.
    pub fn check_compile(&self) -> RecheckReport {
        recheck::run_pass(&self.deployment)
    }

    pub fn stats(&self) -> Stats {
        let mut stats = Stats::default();
        for unit in self.deployment.registry.units() {
            let status = unit.status();
            stats.units += 1;
            stats.loaded += usize::from(status.loaded);
            stats.failed += usize::from(status.failed);
            stats.removed += usize::from(status.removed);
            stats.compiles += status.compiles;
        }
        stats
    }

    /// Release every unit, its type and its loader, and drop in-memory
    /// artifacts. Persisted artifacts stay on disk.
    pub fn teardown_all(&self) -> usize {
        let released = self.deployment.registry.teardown_all();
        self.deployment.store.clear();
        crate::debug!("registry"; "teardown released {} units", released);
        released
    }
}
