//! Compilation and runtime state of one template.
//!
//! # State machine
//!
//! ```text
//! Uncompiled ──compile──▶ Compiled ──source newer──▶ Stale ──compile──▶ Compiled
//!      │                     │  ▲                                          │
//!      │                     ▼  │ backoff elapsed                          │
//!      │                 Unavailable                                       │
//!      └──────────── source gone (any state) ──▶ Removed ◀─────────────────┘
//! ```
//!
//! All mutable state lives behind one per-unit lock. The lock is held across
//! [`Unit::ensure_compiled`] and [`Unit::ensure_loaded`], so concurrent
//! requests for the same path compile and instantiate at most once; other
//! paths never wait on it. Handlers are invoked after the lock is released.

mod compile;
mod load;

pub use compile::CheckMode;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::SystemTime;

use parking_lot::{Mutex, MutexGuard};

use crate::core::UnitKind;
use crate::error::{CompileError, EngineError, LoadError};
use crate::loader::{Handler, HandlerType, Loader};
use crate::store::DependencyStamp;

/// Why a unit cannot serve.
#[derive(Debug, Clone)]
pub enum UnitFailure {
    /// Source confirmed missing; terminal until the unit is discarded.
    Removed,
    /// Handler reported unavailability; retry after the given time.
    Unavailable(SystemTime),
    Error(EngineError),
}

impl From<CompileError> for UnitFailure {
    fn from(e: CompileError) -> Self {
        Self::Error(e.into())
    }
}

impl From<LoadError> for UnitFailure {
    fn from(e: LoadError) -> Self {
        Self::Error(e.into())
    }
}

/// A materialized type with its live instance.
pub struct Loaded {
    /// Code space the type was defined in (one per reload).
    pub loader: Arc<Loader>,
    pub ty: Arc<dyn HandlerType>,
    pub instance: Arc<dyn Handler>,
}

/// Timestamps a failed compile was attempted against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FailedStamps {
    pub source: SystemTime,
    pub dependencies: Vec<DependencyStamp>,
}

/// Mutable part of a unit, guarded by the unit lock.
pub struct UnitState {
    pub(crate) loaded: Option<Loaded>,
    pub(crate) source_last_modified: Option<SystemTime>,
    /// Source timestamp the current artifact was compiled from.
    pub(crate) artifact_last_modified: Option<SystemTime>,
    pub(crate) dependencies: Vec<DependencyStamp>,
    pub(crate) needs_reload: bool,
    pub(crate) cached_error: Option<CompileError>,
    pub(crate) failed_stamps: Option<FailedStamps>,
    pub(crate) unavailable_until: Option<SystemTime>,
    pub(crate) first_time: bool,
    pub(crate) last_checked: Option<SystemTime>,
    pub(crate) compiles: usize,
    pub(crate) loads: usize,
}

impl Default for UnitState {
    fn default() -> Self {
        Self {
            loaded: None,
            source_last_modified: None,
            artifact_last_modified: None,
            dependencies: Vec::new(),
            needs_reload: true,
            cached_error: None,
            failed_stamps: None,
            unavailable_until: None,
            first_time: true,
            last_checked: None,
            compiles: 0,
            loads: 0,
        }
    }
}

impl UnitState {
    /// Forget the type and the unit's reference to its instance. The
    /// instance is torn down when the last in-flight request releases it.
    pub(crate) fn drop_type(&mut self) {
        self.loaded = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn cached_error(&self) -> Option<&CompileError> {
        self.cached_error.as_ref()
    }

    pub fn unavailable_until(&self) -> Option<SystemTime> {
        self.unavailable_until
    }

    pub fn artifact_last_modified(&self) -> Option<SystemTime> {
        self.artifact_last_modified
    }

    pub fn dependencies(&self) -> &[DependencyStamp] {
        &self.dependencies
    }

    /// Full compiles attempted (including failed ones).
    pub fn compiles(&self) -> usize {
        self.compiles
    }

    /// Successful type materializations.
    pub fn loads(&self) -> usize {
        self.loads
    }
}

/// Snapshot of a unit for operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitStatus {
    pub path: String,
    pub kind: UnitKind,
    pub loaded: bool,
    pub failed: bool,
    pub removed: bool,
    pub compiles: usize,
}

/// One template path.
pub struct Unit {
    path: String,
    kind: UnitKind,
    type_name: String,
    removed: AtomicBool,
    trip_depth: AtomicUsize,
    state: Mutex<UnitState>,
}

impl Unit {
    /// `path` must already be normalized.
    pub fn new(path: impl Into<String>, kind: UnitKind, type_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            type_name: type_name.into(),
            removed: AtomicBool::new(false),
            trip_depth: AtomicUsize::new(0),
            state: Mutex::new(UnitState::default()),
        }
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    #[inline]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[inline]
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    /// Number of compiles of this unit currently on the stack.
    #[inline]
    pub fn trip_depth(&self) -> usize {
        self.trip_depth.load(Ordering::Acquire)
    }

    /// Acquire the unit lock.
    pub fn lock(&self) -> MutexGuard<'_, UnitState> {
        self.state.lock()
    }

    /// Acquire the unit lock if nobody holds it.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, UnitState>> {
        self.state.try_lock()
    }

    /// Currently installed type, if any.
    pub fn current_type(&self) -> Option<Arc<dyn HandlerType>> {
        self.state.lock().loaded.as_ref().map(|l| l.ty.clone())
    }

    /// Record handler-reported unavailability.
    pub fn mark_unavailable(&self, until: SystemTime) {
        self.state.lock().unavailable_until = Some(until);
    }

    /// Mark the source as gone. Terminal for this unit.
    pub(crate) fn mark_removed(&self, state: &mut UnitState) {
        self.removed.store(true, Ordering::Release);
        state.drop_type();
        crate::debug!("registry"; "{} removed", self.path);
    }

    /// Drop the type and its instance (teardown).
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.drop_type();
        state.needs_reload = true;
    }

    pub fn status(&self) -> UnitStatus {
        let state = self.state.lock();
        UnitStatus {
            path: self.path.clone(),
            kind: self.kind,
            loaded: state.loaded.is_some(),
            failed: state.cached_error.is_some(),
            removed: self.is_removed(),
            compiles: state.compiles,
        }
    }
}

impl std::fmt::Debug for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unit")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("type_name", &self.type_name)
            .field("removed", &self.is_removed())
            .field("trip_depth", &self.trip_depth())
            .finish()
    }
}

/// Keeps `trip_depth` balanced even if a compile unwinds. A non-zero depth
/// marks the unit as being compiled, which turns includes of it into
/// prototype compiles.
struct Trip<'a>(&'a AtomicUsize);

impl<'a> Trip<'a> {
    fn enter(depth: &'a AtomicUsize) -> Self {
        depth.fetch_add(1, Ordering::AcqRel);
        Self(depth)
    }
}

impl Drop for Trip<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
