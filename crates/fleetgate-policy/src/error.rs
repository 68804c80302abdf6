//! Error types for policy tables and configuration.

use std::path::PathBuf;

/// Errors raised while loading or compiling dispatch and ACL tables.
///
/// Every variant is a configuration problem: tables are compiled once, up
/// front, so a bad pattern or an empty backend list fails at load time
/// instead of leaving a silent routing or authorization gap.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// A rule pattern is not a valid regular expression.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A dispatch rule names no backends.
    #[error("dispatch rule '{pattern}' has no target backends")]
    EmptyBackendList { pattern: String },

    /// A dispatch rule names an empty backend.
    #[error("dispatch rule '{pattern}' has an empty target backend")]
    EmptyBackendName { pattern: String },

    /// The dispatch table has no rules at all.
    #[error("dispatcher not configured: dispatch table is empty")]
    EmptyDispatchTable,

    /// Configuration file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be parsed.
    #[error("failed to parse {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
