//! Dispatch table: which backends service which operations.
//!
//! Rules are scanned in order and the **first** rule whose pattern matches
//! the operation name decides. Later rules are never consulted, even when
//! the first match resolves to no available backend.

use crate::error::{PolicyError, PolicyResult};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Uncompiled dispatch rule as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRuleSpec {
    pub pattern: String,
    pub backends: Vec<String>,
}

impl DispatchRuleSpec {
    pub fn new<I, S>(pattern: impl Into<String>, backends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pattern: pattern.into(),
            backends: backends.into_iter().map(Into::into).collect(),
        }
    }
}

/// Compiled dispatch rule.
#[derive(Debug, Clone)]
pub struct DispatchRule {
    pattern: Regex,
    backends: Vec<String>,
}

impl DispatchRule {
    pub fn compile(spec: &DispatchRuleSpec) -> PolicyResult<Self> {
        if spec.backends.is_empty() {
            return Err(PolicyError::EmptyBackendList {
                pattern: spec.pattern.clone(),
            });
        }
        if spec.backends.iter().any(|b| b.trim().is_empty()) {
            return Err(PolicyError::EmptyBackendName {
                pattern: spec.pattern.clone(),
            });
        }
        let pattern = Regex::new(&spec.pattern).map_err(|source| PolicyError::InvalidPattern {
            pattern: spec.pattern.clone(),
            source,
        })?;
        Ok(Self {
            pattern,
            backends: spec.backends.clone(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn backends(&self) -> &[String] {
        &self.backends
    }

    /// Unanchored search, so `^`/`$` must be spelled out in the pattern.
    pub fn matches(&self, operation: &str) -> bool {
        self.pattern.is_match(operation)
    }

    pub fn to_spec(&self) -> DispatchRuleSpec {
        DispatchRuleSpec {
            pattern: self.pattern.as_str().to_string(),
            backends: self.backends.clone(),
        }
    }
}

/// Ordered list of dispatch rules.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    rules: Vec<DispatchRule>,
}

impl DispatchTable {
    /// Compile every rule once. An empty table is a configuration error.
    pub fn compile(specs: &[DispatchRuleSpec]) -> PolicyResult<Self> {
        if specs.is_empty() {
            return Err(PolicyError::EmptyDispatchTable);
        }
        let rules = specs
            .iter()
            .map(DispatchRule::compile)
            .collect::<PolicyResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[DispatchRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule whose pattern matches `operation`.
    pub fn rule_for(&self, operation: &str) -> Option<&DispatchRule> {
        self.rules.iter().find(|rule| rule.matches(operation))
    }

    /// Backend names servicing `operation`: the first matching rule's list,
    /// in order, restricted to names for which `is_available` holds.
    pub fn resolve<F>(&self, operation: &str, is_available: F) -> Vec<&str>
    where
        F: Fn(&str) -> bool,
    {
        let Some(rule) = self.rule_for(operation) else {
            tracing::trace!(operation, "no dispatch rule matches");
            return Vec::new();
        };

        let mut resolved = Vec::with_capacity(rule.backends.len());
        for name in &rule.backends {
            if is_available(name) {
                resolved.push(name.as_str());
            } else {
                tracing::debug!(
                    operation,
                    backend = %name,
                    "ignoring backend: not available"
                );
            }
        }
        tracing::debug!(
            operation,
            pattern = rule.pattern(),
            backends = ?resolved,
            "dispatch rule matched"
        );
        resolved
    }

    /// Every backend name referenced by the table, first occurrence order.
    pub fn backend_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for rule in &self.rules {
            for name in &rule.backends {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    pub fn to_specs(&self) -> Vec<DispatchRuleSpec> {
        self.rules.iter().map(DispatchRule::to_spec).collect()
    }
}
