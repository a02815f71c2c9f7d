//! Bounded backend invocation.
//!
//! With a limit configured, the backend runs on its own thread and the
//! caller waits on a channel. A late result is discarded together with the
//! thread; nothing from a timed-out compile is ever stored.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError};

use super::external::{Classpath, CompileBackend, GeneratedSource};
use crate::error::Diagnostic;

/// Why a backend invocation produced no bytecode.
#[derive(Debug)]
pub enum BackendFailure {
    Diagnostics(Vec<Diagnostic>),
    TimedOut(Duration),
}

/// Run the backend, bounded by `limit` when set.
pub fn invoke(
    backend: &Arc<dyn CompileBackend>,
    source: GeneratedSource,
    classpath: Classpath,
    limit: Option<Duration>,
) -> Result<Vec<u8>, BackendFailure> {
    let Some(limit) = limit else {
        return backend
            .compile(source, classpath)
            .map_err(BackendFailure::Diagnostics);
    };

    let path = source.path.clone();
    let (tx, rx) = channel::bounded(1);
    let worker = Arc::clone(backend);
    let spawned = thread::Builder::new()
        .name("stencil-compile".into())
        .spawn(move || {
            // Receiver may be gone after a timeout
            let _ = tx.send(worker.compile(source, classpath));
        });

    if let Err(e) = spawned {
        return Err(BackendFailure::Diagnostics(vec![Diagnostic::new(
            path,
            format!("failed to start compiler thread: {e}"),
        )]));
    }

    match rx.recv_timeout(limit) {
        Ok(result) => result.map_err(BackendFailure::Diagnostics),
        Err(RecvTimeoutError::Timeout) => Err(BackendFailure::TimedOut(limit)),
        Err(RecvTimeoutError::Disconnected) => Err(BackendFailure::Diagnostics(vec![
            Diagnostic::new(path, "compiler thread terminated without a result"),
        ])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct Sleepy(Duration);

    impl CompileBackend for Sleepy {
        fn compile(
            &self,
            source: GeneratedSource,
            _classpath: Classpath,
        ) -> Result<Vec<u8>, Vec<Diagnostic>> {
            thread::sleep(self.0);
            Ok(source.text.into_bytes())
        }
    }

    struct Panicky;

    impl CompileBackend for Panicky {
        fn compile(
            &self,
            _source: GeneratedSource,
            _classpath: Classpath,
        ) -> Result<Vec<u8>, Vec<Diagnostic>> {
            panic!("backend crashed");
        }
    }

    fn source() -> GeneratedSource {
        GeneratedSource {
            path: "/a.tpl".into(),
            type_name: "gen.a".into(),
            text: "body".into(),
        }
    }

    fn classpath() -> Classpath {
        Classpath::new("gen", Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_unbounded_runs_inline() {
        let backend: Arc<dyn CompileBackend> = Arc::new(Sleepy(Duration::ZERO));
        let bytes = invoke(&backend, source(), classpath(), None).unwrap();
        assert_eq!(bytes, b"body");
    }

    #[test]
    fn test_within_limit() {
        let backend: Arc<dyn CompileBackend> = Arc::new(Sleepy(Duration::from_millis(5)));
        let bytes = invoke(&backend, source(), classpath(), Some(Duration::from_secs(5))).unwrap();
        assert_eq!(bytes, b"body");
    }

    #[test]
    fn test_exceeding_limit_times_out() {
        let backend: Arc<dyn CompileBackend> = Arc::new(Sleepy(Duration::from_millis(500)));
        let result = invoke(
            &backend,
            source(),
            classpath(),
            Some(Duration::from_millis(20)),
        );
        assert!(matches!(result, Err(BackendFailure::TimedOut(_))));
    }

    #[test]
    fn test_crashed_backend_reports_diagnostic() {
        let backend: Arc<dyn CompileBackend> = Arc::new(Panicky);
        let result = invoke(&backend, source(), classpath(), Some(Duration::from_secs(5)));
        match result {
            Err(BackendFailure::Diagnostics(d)) => assert_eq!(d[0].file, "/a.tpl"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
