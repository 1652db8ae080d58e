//! Entry point loaders.
//!
//! The executor asks its loader for a handler on every invocation, so
//! whatever the loader returns at call time is what runs. Swapping a
//! registered handler or editing a handler executable takes effect on the
//! next request without restarting the server.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use lambdev_core::EntryPoint;
use tracing::debug;

use crate::error::{InvokeError, InvokeResult};
use crate::handler::Handler;

/// Resolves an entry point to a callable handler.
pub trait EntryPointLoader: Send + Sync {
    fn load(&self, entry: &EntryPoint) -> InvokeResult<Handler>;
}

/// In-process handlers keyed by `<module>.<symbol>`.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Handler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the handler for `key`.
    pub fn register(&self, key: impl Into<String>, handler: Handler) {
        let key = key.into();
        debug!(%key, "registered handler");
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, handler);
    }

    /// Builder form of [`HandlerRegistry::register`].
    pub fn with(self, key: impl Into<String>, handler: Handler) -> Self {
        self.register(key, handler);
        self
    }

    pub fn unregister(&self, key: &str) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl EntryPointLoader for HandlerRegistry {
    fn load(&self, entry: &EntryPoint) -> InvokeResult<Handler> {
        let key = entry.key();
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
            .ok_or(InvokeError::NotFound(key))
    }
}

/// Tries `primary` first and falls back when it has no such handler.
pub struct FallbackLoader {
    primary: Arc<dyn EntryPointLoader>,
    fallback: Arc<dyn EntryPointLoader>,
}

impl FallbackLoader {
    pub fn new(primary: Arc<dyn EntryPointLoader>, fallback: Arc<dyn EntryPointLoader>) -> Self {
        Self { primary, fallback }
    }
}

impl EntryPointLoader for FallbackLoader {
    fn load(&self, entry: &EntryPoint) -> InvokeResult<Handler> {
        match self.primary.load(entry) {
            Err(InvokeError::NotFound(_)) => self.fallback.load(entry),
            other => other,
        }
    }
}
