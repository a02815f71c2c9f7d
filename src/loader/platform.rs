//! Parent code space for natively registered handler types.

use std::sync::Arc;

use dashmap::DashMap;

use super::{CodeSpace, HandlerType};
use crate::error::LoadError;

/// Registry of platform types, keyed by qualified name.
#[derive(Default)]
pub struct PlatformTypes {
    types: DashMap<String, Arc<dyn HandlerType>>,
}

impl PlatformTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type under its own name, replacing any previous one.
    pub fn register(&self, ty: Arc<dyn HandlerType>) {
        self.types.insert(ty.name().to_string(), ty);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl CodeSpace for PlatformTypes {
    fn load_type(&self, name: &str) -> Result<Arc<dyn HandlerType>, LoadError> {
        self.types
            .get(name)
            .map(|ty| ty.clone())
            .ok_or_else(|| LoadError::NotFound {
                name: name.to_string(),
            })
    }
}
