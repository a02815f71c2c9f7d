//! `ensure_loaded`: materialize the stored artifact as a live instance.

use std::sync::Arc;

use super::{Loaded, Unit, UnitFailure, UnitState};
use crate::coordinator::Deployment;
use crate::error::{HandlerError, LoadError};
use crate::loader::{Handler, HandlerConfig, Request, Response};

impl Unit {
    /// Return the live instance, reloading it if a newer artifact exists.
    ///
    /// Must be called with this unit's lock held, after a successful
    /// [`ensure_compiled`](Unit::ensure_compiled). Load failures are reported
    /// but never cached.
    pub fn ensure_loaded(
        &self,
        state: &mut UnitState,
        deployment: &Deployment,
    ) -> Result<Arc<dyn Handler>, UnitFailure> {
        if !state.needs_reload {
            if let Some(loaded) = &state.loaded {
                return Ok(loaded.instance.clone());
            }
        }

        let reload = state.loaded.is_some();
        state.drop_type();

        // A fresh code space per reload: the previous one has the old
        // version of this type cached.
        let loader = deployment.new_loader();
        let ty = loader.load_type(&self.type_name)?;
        let mut instance = ty.instantiate()?;
        instance
            .init(&HandlerConfig {
                path: self.path.clone(),
                max_include_depth: deployment.config.runtime.max_include_depth,
            })
            .map_err(|e| LoadError::Init {
                name: self.type_name.clone(),
                message: e.to_string(),
            })?;

        let instance: Arc<dyn Handler> = Arc::new(Live(instance));
        if reload {
            crate::debug!("reload"; "{} (loader #{})", self.path, loader.id());
        } else {
            crate::debug!("load"; "{} (loader #{})", self.path, loader.id());
        }
        state.loaded = Some(Loaded {
            loader,
            ty,
            instance: instance.clone(),
        });
        state.needs_reload = false;
        state.loads += 1;
        Ok(instance)
    }
}

/// Instance installed on a unit. Dropping the last reference runs the
/// teardown hook, so a request still inside `service` finishes on the
/// instance it started with.
struct Live(Box<dyn Handler>);

impl Handler for Live {
    fn init(&mut self, config: &HandlerConfig) -> Result<(), HandlerError> {
        self.0.init(config)
    }

    fn service(&self, request: &Request) -> Result<Response, HandlerError> {
        self.0.service(request)
    }
}

impl Drop for Live {
    fn drop(&mut self) {
        self.0.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    impl Handler for Counting {
        fn service(&self, _request: &Request) -> Result<Response, HandlerError> {
            Ok(Response::new("ok"))
        }

        fn destroy(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_teardown_waits_for_last_reference() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let installed: Arc<dyn Handler> = Arc::new(Live(Box::new(Counting(destroyed.clone()))));
        let in_flight = installed.clone();

        drop(installed);
        assert_eq!(destroyed.load(Ordering::SeqCst), 0);
        assert_eq!(in_flight.service(&Request::new("/a.tpl")).unwrap().body, "ok");

        drop(in_flight);
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }
}
