//! Background recheck.
//!
//! Outside development mode a failed unit replays its cached error and a
//! stale unit is only noticed when requested. The recheck pass walks every
//! known unit and recompiles what is out of date, so fixes land without a
//! request paying for the compile. Failures go to the operator status line.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};

use super::Deployment;
use crate::compiler::CompileSession;
use crate::error::render_diagnostics;
use crate::logger::{status_error, status_success};
use crate::unit::{CheckMode, UnitFailure};

/// Outcome of one recheck pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecheckReport {
    pub checked: usize,
    pub recompiled: usize,
    pub failed: usize,
    pub removed: usize,
}

/// Check every registered unit once.
pub fn run_pass(deployment: &Deployment) -> RecheckReport {
    let mut report = RecheckReport::default();
    if deployment.config.compile.precompiled_only {
        return report;
    }

    for unit in deployment.registry.units() {
        if unit.is_removed() {
            continue;
        }
        report.checked += 1;

        let mut state = unit.lock();
        let before = state.compiles();
        let mut session = CompileSession::new();
        let result = unit.ensure_compiled(&mut state, deployment, &mut session, CheckMode::Recheck);
        let compiled = state.compiles() > before;
        drop(state);

        match result {
            Ok(()) if compiled => {
                report.recompiled += 1;
                status_success(&format!("recompiled: {}", unit.path()));
            }
            Ok(()) => {}
            Err(UnitFailure::Removed) => {
                report.removed += 1;
                crate::log!("recheck"; "{} removed", unit.path());
            }
            Err(UnitFailure::Error(e)) if compiled => {
                report.failed += 1;
                status_error(
                    &format!("failed: {}", unit.path()),
                    &render_diagnostics(&e.diagnostics()),
                );
            }
            Err(_) => {}
        }
    }

    crate::debug!("recheck"; "{:?}", report);
    report
}

/// Thread running [`run_pass`] periodically until dropped.
pub struct Rechecker {
    shutdown: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Rechecker {
    pub fn spawn(deployment: Arc<Deployment>, interval: Duration) -> std::io::Result<Self> {
        let (shutdown, rx) = channel::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("stencil-recheck".into())
            .spawn(move || {
                crate::debug!("recheck"; "every {:?}", interval);
                loop {
                    match rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            run_pass(&deployment);
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;
        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }
}

impl Drop for Rechecker {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
