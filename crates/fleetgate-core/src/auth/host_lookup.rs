use super::HostLookup;
use crate::backend::BackendHandle;
use crate::error::{Error, Result};
use crate::value::{Entity, Kwargs, Value};
use fleetgate_policy::{HostKind, HostRecord};
use std::collections::BTreeMap;

const HOST_GET_OBJECTS: &str = "host_getObjects";
const HOST_KEY_ATTRIBUTE: &str = "opsiHostKey";

/// In-memory host directory.
#[derive(Debug, Clone, Default)]
pub struct StaticHostDirectory {
    hosts: BTreeMap<String, HostRecord>,
}

impl StaticHostDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, record: HostRecord) -> Self {
        self.insert(record);
        self
    }

    /// Insert a record keyed by its lower-cased id.
    pub fn insert(&mut self, record: HostRecord) {
        self.hosts.insert(record.id.to_lowercase(), record);
    }
}

impl HostLookup for StaticHostDirectory {
    fn lookup_host(&self, name: &str) -> Result<Option<HostRecord>> {
        Ok(self.hosts.get(name).cloned())
    }
}

/// Host lookup over a backend's `host_getObjects` operation.
pub struct BackendHostLookup {
    backend: BackendHandle,
}

impl std::fmt::Debug for BackendHostLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendHostLookup").finish_non_exhaustive()
    }
}

impl BackendHostLookup {
    /// Fails if `backend` does not expose `host_getObjects`.
    pub fn new(backend: BackendHandle) -> Result<Self> {
        if !backend.has_operation(HOST_GET_OBJECTS) {
            return Err(Error::configuration(format!(
                "backend has no operation '{HOST_GET_OBJECTS}', cannot authenticate hosts"
            )));
        }
        Ok(Self { backend })
    }
}

fn host_kind(type_name: &str) -> HostKind {
    match type_name {
        "OpsiDepotserver" | "OpsiConfigserver" => HostKind::DepotServer,
        "OpsiClient" => HostKind::Client,
        _ => HostKind::Other,
    }
}

fn host_record(name: &str, entity: &Entity) -> HostRecord {
    let id = entity.get_str("id").unwrap_or(name);
    let record = HostRecord::new(id, host_kind(&entity.type_name));
    match entity.get_str(HOST_KEY_ATTRIBUTE) {
        Some(key) => record.with_secret_key(key),
        None => record,
    }
}

impl HostLookup for BackendHostLookup {
    fn lookup_host(&self, name: &str) -> Result<Option<HostRecord>> {
        let mut kwargs = Kwargs::new();
        kwargs.insert("id".to_string(), Value::from(name));
        let result = self.backend.invoke(HOST_GET_OBJECTS, &kwargs)?;
        Ok(result.first_entity().map(|entity| host_record(name, entity)))
    }
}
