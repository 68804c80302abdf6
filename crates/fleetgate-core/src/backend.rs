//! Backend contract and registry.

use crate::error::{Error, Result};
use crate::value::{Kwargs, Options, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A data backend servicing a fixed catalog of operations.
///
/// Implementations handle their own synchronization; callers invoke them
/// from whatever thread runs the request.
pub trait Backend: Send + Sync {
    /// Operation names this backend services.
    fn operations(&self) -> Vec<String>;

    /// Invoke `operation` with keyword arguments.
    fn invoke(&self, operation: &str, kwargs: &Kwargs) -> Result<Value>;

    fn set_options(&self, options: &Options) -> Result<()>;

    fn get_options(&self) -> Result<Options>;

    /// Release resources. Called only by an explicit broadcast.
    fn exit(&self) -> Result<()>;

    fn has_operation(&self, operation: &str) -> bool {
        self.operations().iter().any(|op| op == operation)
    }
}

/// Shared handle to a registered backend.
pub type BackendHandle = Arc<dyn Backend>;

/// Named, pre-constructed backends.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: BTreeMap<String, BackendHandle>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, name: impl Into<String>, backend: BackendHandle) -> Self {
        self.register(name, backend);
        self
    }

    /// Register `backend` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, backend: BackendHandle) {
        let name = name.into();
        tracing::debug!(backend = %name, "registered backend");
        self.backends.insert(name, backend);
    }

    pub fn get(&self, name: &str) -> Option<&BackendHandle> {
        self.backends.get(name)
    }

    /// Backend registered as `name`, or a configuration error.
    pub fn require(&self, name: &str) -> Result<BackendHandle> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| Error::configuration(format!("backend '{name}' is not registered")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// Registered names in registry order.
    pub fn names(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BackendHandle)> {
        self.backends.iter().map(|(name, backend)| (name.as_str(), backend))
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

/// Set of operation names forming a public surface or a protected set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationCatalog {
    operations: BTreeSet<String>,
}

impl OperationCatalog {
    pub fn new<I, S>(operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operations: operations.into_iter().map(Into::into).collect(),
        }
    }

    /// Union of every registered backend's operations.
    pub fn from_registry(registry: &BackendRegistry) -> Self {
        Self::new(registry.iter().flat_map(|(_, backend)| backend.operations()))
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.operations.contains(operation)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for OperationCatalog {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static [&'static str]);

    impl Backend for Fixed {
        fn operations(&self) -> Vec<String> {
            self.0.iter().map(|s| s.to_string()).collect()
        }
        fn invoke(&self, _operation: &str, _kwargs: &Kwargs) -> Result<Value> {
            Ok(Value::None)
        }
        fn set_options(&self, _options: &Options) -> Result<()> {
            Ok(())
        }
        fn get_options(&self) -> Result<Options> {
            Ok(Options::new())
        }
        fn exit(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_require_unknown_backend_is_configuration_error() {
        let registry = BackendRegistry::new().with_backend("file", Arc::new(Fixed(&[])));
        assert!(registry.require("file").is_ok());
        let err = registry.require("mysql").err().unwrap();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_catalog_from_registry() {
        let registry = BackendRegistry::new()
            .with_backend("file", Arc::new(Fixed(&["host_getObjects", "config_getObjects"])))
            .with_backend("mysql", Arc::new(Fixed(&["host_getObjects"])));
        let catalog = OperationCatalog::from_registry(&registry);
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("config_getObjects"));
        assert!(Fixed(&["a"]).has_operation("a"));
    }
}
