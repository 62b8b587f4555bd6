//! Operation registry mapping names to handlers.
//!
//! The embedding application fills an [`OperationRegistryBuilder`] once at
//! start-up and freezes it with [`OperationRegistryBuilder::build`]. The
//! resulting [`OperationRegistry`] is immutable and shared with the host
//! behind an `Arc`. Lookups are exact, case-sensitive matches on the operation
//! name. An optional [`FallbackHandler`] is consulted for names the registry
//! does not contain, which lets two worker variants share one host while
//! exposing different operation sets.

mod handler;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use self::handler::{
    FallbackHandler, HandlerFailure, HandlerFn, OperationHandler, OperationOutcome,
    OperationRequest, Typed, TypedOperation, handler_fn, typed,
};

/// Errors raised while building a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A handler is already registered under this name.
    #[error("operation '{name}' is already registered")]
    Duplicate {
        /// Conflicting operation name.
        name: String,
    },
    /// Operation names must contain a non-whitespace character.
    #[error("operation names must not be empty")]
    EmptyName,
}

/// Immutable mapping from operation name to handler.
#[derive(Default)]
pub struct OperationRegistry {
    handlers: HashMap<String, Arc<dyn OperationHandler>>,
    fallback: Option<Arc<dyn FallbackHandler>>,
}

impl OperationRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> OperationRegistryBuilder {
        OperationRegistryBuilder::default()
    }

    /// Looks up the handler registered under `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn OperationHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Returns the fallback hook, if one was installed.
    #[must_use]
    pub fn fallback(&self) -> Option<Arc<dyn FallbackHandler>> {
        self.fallback.clone()
    }

    /// Returns the registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` when no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.names())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// A registry can serve as another registry's fallback.
///
/// Only the handlers are consulted; the inner registry's own fallback is not
/// chained.
#[async_trait]
impl FallbackHandler for OperationRegistry {
    async fn try_handle(&self, request: OperationRequest) -> Option<OperationOutcome> {
        let handler = self.lookup(&request.name)?;
        Some(handler.execute(request).await)
    }
}

/// Collects handlers before the host starts.
#[derive(Default)]
pub struct OperationRegistryBuilder {
    handlers: HashMap<String, Arc<dyn OperationHandler>>,
    fallback: Option<Arc<dyn FallbackHandler>>,
}

impl OperationRegistryBuilder {
    /// Registers `handler` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if the name is taken and
    /// [`RegistryError::EmptyName`] if it is blank.
    pub fn register<H>(&mut self, name: impl Into<String>, handler: H) -> Result<(), RegistryError>
    where
        H: OperationHandler + 'static,
    {
        self.register_shared(name, Arc::new(handler))
    }

    /// Registers an already shared handler under `name`.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn register_shared(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn OperationHandler>,
    ) -> Result<(), RegistryError> {
        let operation = name.into();
        if operation.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.handlers.contains_key(&operation) {
            return Err(RegistryError::Duplicate { name: operation });
        }
        self.handlers.insert(operation, handler);
        Ok(())
    }

    /// Installs the fallback hook, replacing any previous one.
    pub fn fallback<F>(&mut self, fallback: F) -> &mut Self
    where
        F: FallbackHandler + 'static,
    {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> OperationRegistry {
        OperationRegistry {
            handlers: self.handlers,
            fallback: self.fallback,
        }
    }
}

#[cfg(test)]
mod tests;
