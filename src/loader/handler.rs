//! Handler types and instances.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{HandlerError, LoadError};

/// A request routed to a handler instance.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// Logical path being served.
    pub path: String,
    pub params: FxHashMap<String, String>,
    /// Nesting depth when rendered as an included fragment.
    pub depth: usize,
}

impl Request {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Derive the request used to render an included fragment.
    pub fn nested(&self, path: impl Into<String>, params: FxHashMap<String, String>) -> Self {
        Self {
            path: path.into(),
            params,
            depth: self.depth + 1,
        }
    }
}

/// Output of a served request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub body: String,
}

impl Response {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

/// Settings passed to a handler's init hook.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Logical path the instance serves.
    pub path: String,
    /// Maximum include nesting.
    pub max_include_depth: usize,
}

/// A long-lived handler instance.
pub trait Handler: Send + Sync {
    /// Initialization hook, run once before the first service call.
    fn init(&mut self, _config: &HandlerConfig) -> Result<(), HandlerError> {
        Ok(())
    }

    fn service(&self, request: &Request) -> Result<Response, HandlerError>;

    /// Teardown hook, run once after the instance was replaced or the
    /// deployment stopped and the last request using it has returned.
    fn destroy(&self) {}
}

/// A materialized type that can produce handler instances.
pub trait HandlerType: Send + Sync {
    /// Qualified type name.
    fn name(&self) -> &str;

    fn instantiate(&self) -> Result<Box<dyn Handler>, LoadError>;
}

/// Types are compared by identity: two loads of the same name from
/// different loaders are different types.
pub fn same_type(a: &Arc<dyn HandlerType>, b: &Arc<dyn HandlerType>) -> bool {
    Arc::ptr_eq(a, b)
}
