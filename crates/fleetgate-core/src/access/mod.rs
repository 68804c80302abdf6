//! Authorization engine.
//!
//! [`AccessControl`] wraps a backend (usually the [`Router`](crate::Router))
//! for one authenticated principal. It exists only after authentication
//! succeeded, so there is no half-authenticated state to observe.
//!
//! Every operation of the wrapped backend is exposed. Unless a narrower
//! protected catalog is given, all of them are evaluated against the ACL.
//! The router's administrative operations are always evaluated:
//!
//! - full grant: delegated unchanged, result unchanged;
//! - denied: [`Error::PermissionDenied`], the backend is not called;
//! - partial grant: record parameters are filtered (strictly), the call is
//!   delegated, and the result is filtered (leniently). A call that supplied
//!   parameters but has none left after filtering is denied.
//!
//! The engine does not implement [`Backend`](crate::Backend), so one
//! engine can never wrap another.

mod filter;

pub use filter::{ObjectFilter, OWNER_ATTRIBUTES};

use crate::auth::Authenticator;
use crate::backend::{BackendHandle, OperationCatalog};
use crate::error::{Error, Result};
use crate::router::ADMIN_OPERATIONS;
use crate::value::{Kwargs, Value};
use fleetgate_policy::{
    AclTable, GateConfig, GrantDecision, Principal, TypeCatalog, DEFAULT_ADMIN_GROUP,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::Span;

pub const ACCESS_CONTROL_AUTHENTICATED: &str = "accessControl_authenticated";
pub const ACCESS_CONTROL_USER_IS_ADMIN: &str = "accessControl_userIsAdmin";
pub const ACCESS_CONTROL_USER_IS_READ_ONLY_USER: &str = "accessControl_userIsReadOnlyUser";

type Builtin = fn(&AccessControl) -> bool;

#[derive(Clone, Copy)]
enum Handler {
    Protected,
    PassThrough,
    Builtin(Builtin),
}

/// Builder collecting everything an engine needs before authenticating.
pub struct AccessControlBuilder {
    backend: BackendHandle,
    username: String,
    secret: String,
    acl: Option<AclTable>,
    protected: Option<OperationCatalog>,
    types: TypeCatalog,
    admin_group: String,
    read_only_groups: BTreeSet<String>,
    span: Option<Span>,
}

impl AccessControlBuilder {
    pub fn credentials(mut self, username: impl Into<String>, secret: impl Into<String>) -> Self {
        self.username = username.into();
        self.secret = secret.into();
        self
    }

    /// ACL to enforce. Without one, or with an empty one, only members of
    /// the administrative group are granted access.
    pub fn acl(mut self, acl: AclTable) -> Self {
        self.acl = Some(acl);
        self
    }

    /// Take ACL, type catalog and group settings from `config`.
    pub fn config(self, config: &GateConfig) -> Result<Self> {
        Ok(self
            .acl(config.acl_table()?)
            .types(config.type_catalog().clone())
            .admin_group(config.admin_group.clone())
            .read_only_groups(config.read_only_groups.iter().cloned()))
    }

    /// Operations subject to ACL evaluation. Defaults to every operation of
    /// the wrapped backend; administrative operations are protected either way.
    pub fn protected(mut self, catalog: OperationCatalog) -> Self {
        self.protected = Some(catalog);
        self
    }

    pub fn types(mut self, types: TypeCatalog) -> Self {
        self.types = types;
        self
    }

    pub fn admin_group(mut self, group: impl Into<String>) -> Self {
        self.admin_group = group.into();
        self
    }

    pub fn read_only_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.read_only_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Span entered for every call. Defaults to one carrying the user.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Authenticate the configured credentials and build the engine.
    pub fn authenticate(self, authenticator: &Authenticator) -> Result<AccessControl> {
        let principal = authenticator.authenticate(&self.username, &self.secret)?;

        let acl = self
            .acl
            .unwrap_or_default()
            .or_admin_only(&self.admin_group);

        let mut handlers = BTreeMap::new();
        for operation in self.backend.operations() {
            let protected = match &self.protected {
                Some(catalog) => {
                    catalog.contains(&operation) || ADMIN_OPERATIONS.contains(&operation.as_str())
                }
                None => true,
            };
            let handler = if protected {
                Handler::Protected
            } else {
                Handler::PassThrough
            };
            handlers.insert(operation, handler);
        }
        let builtins: [(&str, Builtin); 3] = [
            (ACCESS_CONTROL_AUTHENTICATED, AccessControl::is_authenticated),
            (ACCESS_CONTROL_USER_IS_ADMIN, AccessControl::user_is_admin),
            (ACCESS_CONTROL_USER_IS_READ_ONLY_USER, AccessControl::user_is_read_only),
        ];
        for (name, builtin) in builtins {
            handlers.insert(name.to_string(), Handler::Builtin(builtin));
        }

        let span = self
            .span
            .unwrap_or_else(|| tracing::info_span!("access_control", user = %principal.name()));
        tracing::debug!(
            parent: &span,
            operations = handlers.len(),
            rules = acl.len(),
            "access control ready"
        );

        Ok(AccessControl {
            backend: self.backend,
            principal,
            acl,
            types: self.types,
            admin_group: self.admin_group,
            read_only_groups: self.read_only_groups,
            handlers,
            span,
        })
    }
}

/// ACL-enforcing wrapper around a backend for one principal.
pub struct AccessControl {
    backend: BackendHandle,
    principal: Principal,
    acl: AclTable,
    types: TypeCatalog,
    admin_group: String,
    read_only_groups: BTreeSet<String>,
    handlers: BTreeMap<String, Handler>,
    span: Span,
}

impl std::fmt::Debug for AccessControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessControl")
            .field("principal", &self.principal)
            .field("rules", &self.acl.len())
            .field("operations", &self.handlers.len())
            .finish()
    }
}

impl AccessControl {
    pub fn builder(backend: BackendHandle) -> AccessControlBuilder {
        AccessControlBuilder {
            backend,
            username: String::new(),
            secret: String::new(),
            acl: None,
            protected: None,
            types: TypeCatalog::default(),
            admin_group: DEFAULT_ADMIN_GROUP.to_string(),
            read_only_groups: BTreeSet::new(),
            span: None,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn acl(&self) -> &AclTable {
        &self.acl
    }

    /// Exposed operation names.
    pub fn operations(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    pub fn is_protected(&self, operation: &str) -> bool {
        matches!(self.handlers.get(operation), Some(Handler::Protected))
    }

    /// Always true: an engine only exists once authenticated.
    pub fn is_authenticated(&self) -> bool {
        true
    }

    /// Member of the administrative group, or a depot-server host.
    pub fn user_is_admin(&self) -> bool {
        self.principal
            .is_member_of(std::iter::once(&self.admin_group))
            || self.principal.is_depot_server(&BTreeSet::new())
    }

    /// Member of a configured read-only group.
    pub fn user_is_read_only(&self) -> bool {
        !self.read_only_groups.is_empty() && self.principal.is_member_of(&self.read_only_groups)
    }

    /// ACL decision for `operation` without calling anything.
    pub fn authorize(&self, operation: &str) -> GrantDecision {
        self.acl.evaluate(operation, &self.principal)
    }

    /// Call `operation` through the access-control layer.
    pub fn call(&self, operation: &str, kwargs: Kwargs) -> Result<Value> {
        let _entered = self.span.enter();
        let handler = self
            .handlers
            .get(operation)
            .copied()
            .ok_or_else(|| Error::unknown_operation(operation))?;
        match handler {
            Handler::Builtin(builtin) => Ok(Value::Bool(builtin(self))),
            Handler::PassThrough => {
                tracing::trace!(operation, "not protected, delegating");
                self.backend.invoke(operation, &kwargs)
            }
            Handler::Protected => self.call_protected(operation, kwargs),
        }
    }

    fn denied(&self, operation: &str, reason: Option<&str>) -> Error {
        let user = self.principal.name();
        let mut message = format!("access to method '{operation}' denied for user '{user}'");
        if let Some(reason) = reason {
            message.push_str(": ");
            message.push_str(reason);
        }
        Error::permission_denied(message)
    }

    fn call_protected(&self, operation: &str, kwargs: Kwargs) -> Result<Value> {
        let evaluation = self.acl.explain(operation, &self.principal);
        let user = self.principal.name();

        let entries = match evaluation.decision {
            GrantDecision::Full => {
                tracing::debug!(
                    operation,
                    user = %user,
                    rule = ?evaluation.rule_index,
                    "full access granted"
                );
                return self.backend.invoke(operation, &kwargs);
            }
            GrantDecision::Denied => {
                tracing::info!(
                    operation,
                    user = %user,
                    rule = ?evaluation.rule_index,
                    "access denied"
                );
                return Err(self.denied(operation, None));
            }
            GrantDecision::Partial(entries) => entries,
        };
        tracing::debug!(
            operation,
            user = %user,
            entries = entries.len(),
            "partial access granted"
        );

        let filter = ObjectFilter::new(&entries, user, &self.types);
        let supplied = !kwargs.is_empty();
        let kwargs = filter.filter_params(kwargs).map_err(|err| {
            tracing::info!(operation, user = %user, error = %err, "parameters rejected by acl");
            match err {
                Error::PermissionDenied { message } => {
                    self.denied(operation, Some(message.as_str()))
                }
                other => other,
            }
        })?;
        if supplied && kwargs.is_empty() {
            return Err(self.denied(operation, Some("no allowed param supplied")));
        }

        let result = self.backend.invoke(operation, &kwargs)?;
        Ok(filter.filter_result(result))
    }
}
