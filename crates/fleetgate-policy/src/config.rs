//! Gate configuration loaded from YAML.
//!
//! ```yaml
//! dispatch:
//!   - pattern: "^host_.*"
//!     backends: [mysql]
//!   - pattern: ".*"
//!     backends: [file]
//! acl:
//!   - pattern: ".*"
//!     entries:
//!       - type: sys_group
//!         ids: [opsiadmin]
//! read_only_groups: [opsireadonly]
//! types:
//!   OpsiClient: [id]
//! ```

use crate::acl::{AclRuleSpec, AclTable};
use crate::dispatch::{DispatchRuleSpec, DispatchTable};
use crate::error::{PolicyError, PolicyResult};
use crate::types::TypeCatalog;
use crate::DEFAULT_ADMIN_GROUP;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_admin_group() -> String {
    DEFAULT_ADMIN_GROUP.to_string()
}

/// Complete configuration for a routing and authorization stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    /// Ordered dispatch rules.
    #[serde(default)]
    pub dispatch: Vec<DispatchRuleSpec>,

    /// Ordered ACL rules. Empty means admin group only.
    #[serde(default)]
    pub acl: Vec<AclRuleSpec>,

    /// Group whose members are administrators.
    #[serde(default = "default_admin_group")]
    pub admin_group: String,

    /// Groups marking a user as read-only.
    #[serde(default)]
    pub read_only_groups: Vec<String>,

    /// When set, replaces the operating-system groups of every user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_groups: Option<Vec<String>>,

    /// Mandatory attributes per object type.
    #[serde(default)]
    pub types: TypeCatalog,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            dispatch: Vec::new(),
            acl: Vec::new(),
            admin_group: default_admin_group(),
            read_only_groups: Vec::new(),
            force_groups: None,
            types: TypeCatalog::default(),
        }
    }
}

impl GateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> PolicyResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> PolicyResult<Self> {
        Self::parse(yaml, "configuration")
    }

    fn parse(yaml: &str, origin: &str) -> PolicyResult<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|source| PolicyError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        tracing::debug!(
            origin,
            dispatch_rules = config.dispatch.len(),
            acl_rules = config.acl.len(),
            "loaded gate configuration"
        );
        Ok(config)
    }

    pub fn dispatch_table(&self) -> PolicyResult<DispatchTable> {
        DispatchTable::compile(&self.dispatch)
    }

    /// Compiled ACL, falling back to admin-only when none is configured.
    pub fn acl_table(&self) -> PolicyResult<AclTable> {
        Ok(AclTable::compile(&self.acl)?.or_admin_only(&self.admin_group))
    }

    pub fn type_catalog(&self) -> &TypeCatalog {
        &self.types
    }

    /// Compile every table, reporting the first error.
    pub fn validate(&self) -> PolicyResult<()> {
        self.dispatch_table()?;
        self.acl_table()?;
        Ok(())
    }
}
