//! Error types for routing, authentication and access control.

use fleetgate_policy::PolicyError;

/// Error raised by a backend implementation.
///
/// Backend errors travel through the router and the access-control layer
/// unchanged.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Core errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed tables, unknown backends, missing collaborators.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Identity could not be established.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// Call rejected by the ACL. Scoped to the single call.
    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    /// Operation is not part of the exposed surface.
    #[error("unknown operation: {operation}")]
    UnknownOperation { operation: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    pub fn unknown_operation(operation: impl Into<String>) -> Self {
        Self::UnknownOperation {
            operation: operation.into(),
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration { .. } => 2,
            Self::PermissionDenied { .. } => 3,
            Self::Authentication { .. } => 4,
            Self::UnknownOperation { .. } => 1,
            Self::Backend(_) => 1,
        }
    }
}

impl From<PolicyError> for Error {
    fn from(err: PolicyError) -> Self {
        Self::Configuration {
            message: err.to_string(),
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
