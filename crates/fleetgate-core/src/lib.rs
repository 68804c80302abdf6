//! Routing and authorization core for fleetgate.
//!
//! A call enters through [`AccessControl`], which evaluates the ACL for the
//! authenticated [`Principal`](fleetgate_policy::Principal), filters
//! arguments and results for partial grants, and delegates to a
//! [`Backend`]. The usual delegate is the [`Router`], which fans the call
//! out to the registered backends chosen by the dispatch table and merges
//! their results.
//!
//! ```text
//! (operation, kwargs) ─► AccessControl ─► Router ─► backend, backend, ...
//!                              ▲                          │
//!                              └──── filtered result ◄────┘ merged
//! ```

pub mod access;
pub mod auth;
pub mod backend;
pub mod error;
pub mod merge;
pub mod router;
pub mod value;

pub use access::{AccessControl, AccessControlBuilder, ObjectFilter};
pub use auth::{
    Authenticator, BackendHostLookup, CredentialVerifier, HostLookup, StaticCredentials,
    StaticHostDirectory, UnsupportedVerifier,
};
pub use backend::{Backend, BackendHandle, BackendRegistry, OperationCatalog};
pub use error::{BackendError, Error, Result};
pub use merge::{merge, merge_all};
pub use router::Router;
pub use value::{Attributes, Entity, Kwargs, Options, Value};

pub use fleetgate_policy as policy;
