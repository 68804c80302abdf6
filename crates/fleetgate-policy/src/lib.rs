//! Policy tables for fleetgate.
//!
//! This crate holds the declarative half of the gate: principals, the
//! dispatch table that maps operation names to backends, the ACL table
//! that decides what a principal may call, and the YAML configuration
//! that produces both. Runtime routing and enforcement live in
//! `fleetgate-core`.

pub mod acl;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod principal;
pub mod types;

pub use acl::{
    AclEntry, AclEntryType, AclEvaluation, AclRule, AclRuleSpec, AclTable, Grant, GrantDecision,
};
pub use config::GateConfig;
pub use dispatch::{DispatchRule, DispatchRuleSpec, DispatchTable};
pub use error::{PolicyError, PolicyResult};
pub use principal::{HostKind, HostRecord, Principal, PrincipalKind};
pub use types::{TypeCatalog, TYPE_ATTRIBUTE};

/// Administrator group used when none is configured.
pub const DEFAULT_ADMIN_GROUP: &str = "opsiadmin";
