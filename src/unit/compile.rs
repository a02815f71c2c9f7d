//! `ensure_compiled` and the compile pipeline.
//!
//! ```text
//! read source ─▶ translate ─▶ resolve includes ─▶ generate ─▶ backend ─▶ store
//!                                  │
//!                                  ├─ active in this session ─▶ prototype
//!                                  ├─ locked by another request ─▶ prototype
//!                                  └─ otherwise ─▶ dependency.ensure_compiled
//! ```

use std::time::{Instant, SystemTime};

use super::{FailedStamps, Trip, Unit, UnitFailure, UnitState};
use crate::compiler::{
    BackendFailure, CompileSession, GenerateContext, GenerateMode, GeneratedSource, invoke_backend,
};
use crate::coordinator::Deployment;
use crate::error::{CompileError, Diagnostic, EngineError, LoadError};
use crate::source::SourceError;
use crate::store::{Artifact, DependencyStamp};

/// Who is asking for the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// A request (or precompile) on the serving path.
    Request,
    /// Background recheck: no cached-error replay, no throttling, no
    /// availability gate.
    Recheck,
}

impl Unit {
    /// Make sure the stored artifact is current, compiling if needed.
    ///
    /// Must be called with this unit's lock held (`state`).
    pub fn ensure_compiled(
        &self,
        state: &mut UnitState,
        deployment: &Deployment,
        session: &mut CompileSession,
        mode: CheckMode,
    ) -> Result<(), UnitFailure> {
        let first_time = std::mem::replace(&mut state.first_time, false);
        let compile = &deployment.config.compile;

        if self.is_removed() {
            return Err(UnitFailure::Removed);
        }

        let now = deployment.clock.now();
        if mode == CheckMode::Request {
            if let Some(until) = state.unavailable_until {
                if until > now {
                    return Err(UnitFailure::Unavailable(until));
                }
                state.unavailable_until = None;
            }
        }

        if compile.precompiled_only {
            return self.check_precompiled(state, deployment);
        }

        if mode == CheckMode::Request && !first_time && !compile.development {
            if let Some(error) = &state.cached_error {
                return Err(error.clone().into());
            }
        }

        // Throttled: trust the last check
        if mode == CheckMode::Request && state.cached_error.is_none() {
            if let Some(last) = state.last_checked {
                let interval = compile.modification_test_interval();
                if !interval.is_zero()
                    && now < last + interval
                    && state.artifact_last_modified.is_some()
                {
                    return Ok(());
                }
            }
        }
        state.last_checked = Some(now);

        let source_stamp = match deployment.sources.last_modified(&self.path) {
            Ok(stamp) => stamp,
            Err(SourceError::NotFound { .. }) => {
                self.mark_removed(state);
                return Err(UnitFailure::Removed);
            }
            Err(e) => return Err(source_error(&self.path, e).into()),
        };
        state.source_last_modified = Some(source_stamp);

        if state.artifact_last_modified.is_none() {
            self.adopt_stored(state, deployment);
        }

        if state.cached_error.is_none()
            && state.artifact_last_modified == Some(source_stamp)
            && dependencies_unchanged(&state.dependencies, deployment)
        {
            if state.loaded.is_none() {
                state.needs_reload = true;
            }
            return Ok(());
        }

        // A recheck does not retry a failure nothing has changed for
        if mode == CheckMode::Recheck && !compile.development {
            if let (Some(error), Some(failed)) = (&state.cached_error, &state.failed_stamps) {
                if failed.source == source_stamp
                    && dependencies_unchanged(&failed.dependencies, deployment)
                {
                    return Err(error.clone().into());
                }
            }
        }

        self.compile(state, deployment, session, source_stamp)
    }

    /// Seed staleness information from an artifact persisted earlier.
    fn adopt_stored(&self, state: &mut UnitState, deployment: &Deployment) {
        if let Some(meta) = deployment.store.meta(&self.type_name) {
            crate::debug!("store"; "found stored artifact for {}", self.path);
            state.artifact_last_modified = Some(meta.source_stamp);
            state.dependencies = meta.dependencies;
        }
    }

    fn check_precompiled(
        &self,
        state: &mut UnitState,
        deployment: &Deployment,
    ) -> Result<(), UnitFailure> {
        if state.loaded.is_some() {
            return Ok(());
        }
        let Some(meta) = deployment.store.meta(&self.type_name) else {
            return Err(LoadError::NotFound {
                name: self.type_name.clone(),
            }
            .into());
        };
        state.artifact_last_modified = Some(meta.source_stamp);
        state.dependencies = meta.dependencies;
        state.needs_reload = true;
        Ok(())
    }

    /// Full compile. On failure the error is cached (when cacheable) and any
    /// installed type is dropped.
    fn compile(
        &self,
        state: &mut UnitState,
        deployment: &Deployment,
        session: &mut CompileSession,
        source_stamp: SystemTime,
    ) -> Result<(), UnitFailure> {
        state.compiles += 1;
        let started = Instant::now();

        let trip = Trip::enter(&self.trip_depth);
        session.enter(&self.path);
        let mut dependencies = Vec::new();
        let result = self.run_pipeline(deployment, session, source_stamp, &mut dependencies);
        session.leave(&self.path);
        drop(trip);

        match result {
            Ok(()) => {
                state.artifact_last_modified = Some(source_stamp);
                state.dependencies = dependencies;
                state.cached_error = None;
                state.failed_stamps = None;
                state.needs_reload = true;
                crate::debug!("compile"; "{} ({} ms)", self.path, started.elapsed().as_millis());
                Ok(())
            }
            Err(UnitFailure::Error(EngineError::Compile(error))) => {
                state.drop_type();
                if error.is_cacheable() {
                    state.cached_error = Some(error.clone());
                    state.failed_stamps = Some(FailedStamps {
                        source: source_stamp,
                        dependencies,
                    });
                }
                crate::debug!("compile"; "{} failed: {}", self.path, error);
                Err(error.into())
            }
            Err(UnitFailure::Removed) => {
                self.mark_removed(state);
                Err(UnitFailure::Removed)
            }
            Err(other) => Err(other),
        }
    }

    fn run_pipeline(
        &self,
        deployment: &Deployment,
        session: &mut CompileSession,
        source_stamp: SystemTime,
        dependencies: &mut Vec<DependencyStamp>,
    ) -> Result<(), UnitFailure> {
        let text = match deployment.sources.read_to_string(&self.path) {
            Ok(text) => text,
            Err(SourceError::NotFound { .. }) => return Err(UnitFailure::Removed),
            Err(e) => return Err(source_error(&self.path, e).into()),
        };

        let toolchain = &deployment.toolchain;
        let translation = toolchain.translator.translate(&self.path, &text, false);
        // Stamps are recorded even on failure so a recheck can tell whether
        // retrying is worthwhile.
        dependencies.extend(translation.dependencies.iter().map(|dep| {
            DependencyStamp::new(dep.clone(), deployment.sources.last_modified(dep).ok())
        }));
        if !translation.is_ok() {
            return Err(CompileError::Translation {
                path: self.path.clone(),
                diagnostics: translation.diagnostics,
            }
            .into());
        }

        session.record_edges(&self.path, &translation.dependencies);
        for dep in &translation.dependencies {
            let nested = self.resolve_dependency(deployment, session, dep)?;
            merge_stamps(dependencies, nested);
        }

        let generated = toolchain
            .generator
            .generate(
                &translation.ir,
                &GenerateContext {
                    path: &self.path,
                    type_name: &self.type_name,
                    namespace: deployment.namespace(),
                    mode: GenerateMode::Full,
                },
            )
            .map_err(|message| CompileError::Generation {
                path: self.path.clone(),
                message,
            })?;

        let source = GeneratedSource {
            path: self.path.clone(),
            type_name: self.type_name.clone(),
            text: generated,
        };
        let keep = deployment
            .config
            .store
            .keep_generated
            .then(|| source.text.clone());
        let bytecode = self.run_backend(deployment, session, source)?;

        deployment
            .store
            .put(Artifact {
                name: self.type_name.clone(),
                source_path: self.path.clone(),
                bytecode,
                source_stamp,
                dependencies: dependencies.clone(),
                generated: keep,
            })
            .map_err(|e| CompileError::Store {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    fn run_backend(
        &self,
        deployment: &Deployment,
        session: &CompileSession,
        source: GeneratedSource,
    ) -> Result<Vec<u8>, CompileError> {
        invoke_backend(
            &deployment.toolchain.backend,
            source,
            deployment.classpath(session),
            deployment.config.compile.timeout(),
        )
        .map_err(|failure| match failure {
            BackendFailure::Diagnostics(diagnostics) => CompileError::Backend {
                path: self.path.clone(),
                diagnostics,
            },
            BackendFailure::TimedOut(limit) => CompileError::Timeout {
                path: self.path.clone(),
                limit,
            },
        })
    }

    /// Make an included template available on the classpath.
    ///
    /// Returns the dependency stamps of `dep` itself, so the includer goes
    /// stale when anything below `dep` changes.
    fn resolve_dependency(
        &self,
        deployment: &Deployment,
        session: &mut CompileSession,
        dep: &str,
    ) -> Result<Vec<DependencyStamp>, CompileError> {
        let missing = || CompileError::Translation {
            path: self.path.clone(),
            diagnostics: vec![Diagnostic::new(
                self.path.clone(),
                format!("included template `{dep}` does not exist"),
            )],
        };
        if let Err(SourceError::NotFound { .. }) = deployment.sources.last_modified(dep) {
            return Err(missing());
        }

        let unit = deployment.unit(dep);
        if unit.trip_depth() > 0 {
            if session.is_active(dep) {
                if let Some(cycle) = session.cycle(&self.path, dep) {
                    crate::debug!("compile"; "include cycle {}", cycle.join(" -> "));
                }
                // The active compile records its own stamps
                self.prototype(deployment, session, dep)?;
                return Ok(Vec::new());
            }
            crate::debug!("compile"; "{} being compiled elsewhere, using its interface", dep);
            return self.prototype_of_busy(deployment, session, &unit);
        }

        let Some(mut dep_state) = unit.try_lock() else {
            // Another request holds it; waiting could deadlock on a cycle
            // spanning both requests.
            crate::debug!("compile"; "{} busy, using its interface", dep);
            return self.prototype_of_busy(deployment, session, &unit);
        };

        match unit.ensure_compiled(&mut dep_state, deployment, session, CheckMode::Request) {
            Ok(()) => Ok(dep_state.dependencies.clone()),
            Err(UnitFailure::Removed) => Err(missing()),
            Err(UnitFailure::Error(EngineError::Compile(source))) => {
                Err(CompileError::Dependency {
                    path: self.path.clone(),
                    dependency: dep.to_string(),
                    source: Box::new(source),
                })
            }
            Err(UnitFailure::Error(other)) => Err(CompileError::Dependency {
                path: self.path.clone(),
                dependency: dep.to_string(),
                source: Box::new(CompileError::Source {
                    path: dep.to_string(),
                    message: other.to_string(),
                }),
            }),
            // Availability is a runtime concern; the artifact itself is fine
            Err(UnitFailure::Unavailable(_)) => Ok(dep_state.dependencies.clone()),
        }
    }

    /// Prototype of a unit another request is compiling. Its stamps come
    /// from the last stored artifact, if any.
    fn prototype_of_busy(
        &self,
        deployment: &Deployment,
        session: &mut CompileSession,
        unit: &Unit,
    ) -> Result<Vec<DependencyStamp>, CompileError> {
        self.prototype(deployment, session, unit.path())?;
        Ok(deployment
            .store
            .meta(unit.type_name())
            .map(|meta| meta.dependencies)
            .unwrap_or_default())
    }

    /// Interface-only compile of `dep`, kept in the session only.
    fn prototype(
        &self,
        deployment: &Deployment,
        session: &mut CompileSession,
        dep: &str,
    ) -> Result<(), CompileError> {
        let type_name = deployment.type_name(dep);
        if session.prototype(&type_name).is_some() {
            return Ok(());
        }

        let wrap = |source: CompileError| CompileError::Dependency {
            path: self.path.clone(),
            dependency: dep.to_string(),
            source: Box::new(source),
        };

        let text = deployment
            .sources
            .read_to_string(dep)
            .map_err(|e| wrap(source_error(dep, e)))?;

        let toolchain = &deployment.toolchain;
        let translation = toolchain.translator.translate(dep, &text, true);
        if !translation.is_ok() {
            return Err(wrap(CompileError::Translation {
                path: dep.to_string(),
                diagnostics: translation.diagnostics,
            }));
        }

        let generated = toolchain
            .generator
            .generate(
                &translation.ir,
                &GenerateContext {
                    path: dep,
                    type_name: &type_name,
                    namespace: deployment.namespace(),
                    mode: GenerateMode::Prototype,
                },
            )
            .map_err(|message| {
                wrap(CompileError::Generation {
                    path: dep.to_string(),
                    message,
                })
            })?;

        let source = GeneratedSource {
            path: dep.to_string(),
            type_name: type_name.clone(),
            text: generated,
        };
        let bytes = invoke_backend(
            &toolchain.backend,
            source,
            deployment.classpath(session),
            deployment.config.compile.timeout(),
        )
        .map_err(|failure| {
            wrap(match failure {
                BackendFailure::Diagnostics(diagnostics) => CompileError::Backend {
                    path: dep.to_string(),
                    diagnostics,
                },
                BackendFailure::TimedOut(limit) => CompileError::Timeout {
                    path: dep.to_string(),
                    limit,
                },
            })
        })?;

        crate::debug!("compile"; "prototype of {} for {}", dep, self.path);
        session.insert_prototype(type_name, bytes.into());
        Ok(())
    }
}

/// Failure to read `path`. Undecodable text is permanent, so it is reported
/// like any other malformed template.
fn source_error(path: &str, err: SourceError) -> CompileError {
    match err {
        SourceError::Encoding { .. } => CompileError::Translation {
            path: path.to_string(),
            diagnostics: vec![Diagnostic::new(path, "source is not valid UTF-8")],
        },
        other => CompileError::Source {
            path: path.to_string(),
            message: other.to_string(),
        },
    }
}

/// Add `stamps` for paths not recorded yet.
fn merge_stamps(into: &mut Vec<DependencyStamp>, stamps: Vec<DependencyStamp>) {
    for stamp in stamps {
        if !into.iter().any(|known| known.path == stamp.path) {
            into.push(stamp);
        }
    }
}

/// Whether every recorded dependency still has its recorded timestamp.
fn dependencies_unchanged(stamps: &[DependencyStamp], deployment: &Deployment) -> bool {
    stamps
        .iter()
        .all(|stamp| deployment.sources.last_modified(&stamp.path).ok() == stamp.modified)
}
