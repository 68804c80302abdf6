//! Call router: fans operations out to backends and merges the results.
//!
//! The public surface is fixed at construction. For every operation in
//! the supplied catalog the dispatch table is consulted once; operations
//! that resolve to no registered backend are left out of the surface.

use crate::backend::{Backend, BackendHandle, BackendRegistry, OperationCatalog};
use crate::error::{Error, Result};
use crate::merge::merge;
use crate::value::{Kwargs, Options, Value};
use fleetgate_policy::{DispatchRuleSpec, DispatchTable, GateConfig};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::Span;

pub const BACKEND_SET_OPTIONS: &str = "backend_setOptions";
pub const BACKEND_GET_OPTIONS: &str = "backend_getOptions";
pub const BACKEND_EXIT: &str = "backend_exit";
pub const DISPATCHER_GET_CONFIG: &str = "dispatcher_getConfig";
pub const DISPATCHER_GET_BACKEND_NAMES: &str = "dispatcher_getBackendNames";

/// Operations the router answers itself, regardless of dispatch rules.
pub const ADMIN_OPERATIONS: [&str; 5] = [
    BACKEND_SET_OPTIONS,
    BACKEND_GET_OPTIONS,
    BACKEND_EXIT,
    DISPATCHER_GET_CONFIG,
    DISPATCHER_GET_BACKEND_NAMES,
];

/// Routes operations to backends according to a dispatch table.
pub struct Router {
    table: DispatchTable,
    registry: Arc<BackendRegistry>,
    surface: BTreeMap<String, Vec<String>>,
    options: Mutex<Options>,
    span: Span,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("rules", &self.table.len())
            .field("registry", &self.registry)
            .field("operations", &self.surface.len())
            .finish()
    }
}

impl Router {
    pub fn new(
        table: DispatchTable,
        registry: Arc<BackendRegistry>,
        catalog: &OperationCatalog,
    ) -> Self {
        let span = tracing::debug_span!("router");
        let mut surface = BTreeMap::new();
        {
            let _entered = span.enter();
            for operation in catalog.iter() {
                if ADMIN_OPERATIONS.contains(&operation) {
                    tracing::debug!(operation, "skipping operation already provided by router");
                    continue;
                }
                let backends: Vec<String> = table
                    .resolve(operation, |name| registry.contains(name))
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                if backends.is_empty() {
                    tracing::trace!(operation, "operation not exposed: no backend");
                    continue;
                }
                surface.insert(operation.to_string(), backends);
            }
            tracing::debug!(operations = surface.len(), "router surface built");
        }

        Self {
            table,
            registry,
            surface,
            options: Mutex::new(Options::new()),
            span,
        }
    }

    /// Router over the dispatch table of `config`.
    pub fn from_config(
        config: &GateConfig,
        registry: Arc<BackendRegistry>,
        catalog: &OperationCatalog,
    ) -> Result<Self> {
        Ok(Self::new(config.dispatch_table()?, registry, catalog))
    }

    /// Replace the logging span entered for every call.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn dispatch_table(&self) -> &DispatchTable {
        &self.table
    }

    /// Backends servicing `operation`: the first matching rule's names that
    /// are registered, in rule order.
    pub fn route(&self, operation: &str) -> Vec<BackendHandle> {
        self.table
            .resolve(operation, |name| self.registry.contains(name))
            .into_iter()
            .filter_map(|name| self.registry.get(name).cloned())
            .collect()
    }

    /// Backend names fixed for `operation` at construction.
    pub fn routed_backend_names(&self, operation: &str) -> Option<&[String]> {
        self.surface.get(operation).map(Vec::as_slice)
    }

    /// Call every backend servicing `operation` in order and merge the
    /// results. The first backend error aborts the fan-out.
    pub fn dispatch(&self, operation: &str, kwargs: &Kwargs) -> Result<Value> {
        let _entered = self.span.enter();
        let names = self
            .surface
            .get(operation)
            .ok_or_else(|| Error::unknown_operation(operation))?;
        tracing::debug!(operation, backends = ?names, "dispatching");

        let mut result = Value::None;
        for name in names {
            let backend = self.registry.require(name)?;
            let res = backend.invoke(operation, kwargs)?;
            tracing::trace!(operation, backend = %name, kind = res.kind(), "backend returned");
            result = merge(result, res);
        }
        Ok(result)
    }

    /// Store `options` on the router and broadcast them to every backend.
    pub fn set_router_options(&self, options: &Options) -> Result<()> {
        let _entered = self.span.enter();
        {
            let mut own = self.options.lock().unwrap_or_else(PoisonError::into_inner);
            own.extend(options.clone());
        }
        for (name, backend) in self.registry.iter() {
            tracing::debug!(backend = %name, "setting options");
            backend.set_options(options)?;
        }
        Ok(())
    }

    /// Router options updated with every backend's options in registry
    /// order.
    pub fn router_options(&self) -> Result<Options> {
        let _entered = self.span.enter();
        let mut options = self
            .options
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for (_, backend) in self.registry.iter() {
            options.extend(backend.get_options()?);
        }
        Ok(options)
    }

    /// Broadcast `exit` to every backend. Unlike [`Router::dispatch`], a
    /// failing backend does not stop the broadcast: all backends are called
    /// and the first failure is returned afterwards.
    pub fn exit_all(&self) -> Result<()> {
        let _entered = self.span.enter();
        let mut first_error = None;
        for (name, backend) in self.registry.iter() {
            if let Err(err) = backend.exit() {
                tracing::warn!(backend = %name, error = %err, "backend exit failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// The dispatch table as configured.
    pub fn dispatcher_get_config(&self) -> Vec<DispatchRuleSpec> {
        self.table.to_specs()
    }

    /// Names of all registered backends.
    pub fn dispatcher_get_backend_names(&self) -> Vec<String> {
        self.registry.names()
    }

    fn invoke_admin(&self, operation: &str, kwargs: &Kwargs) -> Option<Result<Value>> {
        let result = match operation {
            BACKEND_SET_OPTIONS => {
                let options = match kwargs.get("options") {
                    Some(Value::Map(options)) => options.clone(),
                    Some(other) => {
                        return Some(Err(Error::configuration(format!(
                            "options must be a map, got {}",
                            other.kind()
                        ))))
                    }
                    None => Options::new(),
                };
                self.set_router_options(&options).map(|()| Value::None)
            }
            BACKEND_GET_OPTIONS => self.router_options().map(Value::Map),
            BACKEND_EXIT => self.exit_all().map(|()| Value::None),
            DISPATCHER_GET_CONFIG => Ok(Value::List(
                self.dispatcher_get_config()
                    .into_iter()
                    .map(|rule| {
                        Value::Tuple(vec![
                            Value::String(rule.pattern),
                            Value::List(rule.backends.into_iter().map(Value::String).collect()),
                        ])
                    })
                    .collect(),
            )),
            DISPATCHER_GET_BACKEND_NAMES => Ok(Value::List(
                self.dispatcher_get_backend_names()
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            )),
            _ => return None,
        };
        Some(result)
    }
}

impl Backend for Router {
    fn operations(&self) -> Vec<String> {
        self.surface
            .keys()
            .cloned()
            .chain(ADMIN_OPERATIONS.iter().map(|op| op.to_string()))
            .collect()
    }

    fn invoke(&self, operation: &str, kwargs: &Kwargs) -> Result<Value> {
        match self.invoke_admin(operation, kwargs) {
            Some(result) => result,
            None => self.dispatch(operation, kwargs),
        }
    }

    fn set_options(&self, options: &Options) -> Result<()> {
        self.set_router_options(options)
    }

    fn get_options(&self) -> Result<Options> {
        self.router_options()
    }

    fn exit(&self) -> Result<()> {
        self.exit_all()
    }

    fn has_operation(&self, operation: &str) -> bool {
        self.surface.contains_key(operation) || ADMIN_OPERATIONS.contains(&operation)
    }
}
