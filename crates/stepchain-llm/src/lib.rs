//! Query port abstraction for stepchain
//!
//! This crate defines the uniform interface every workflow phase uses to
//! talk to a model backend. Concrete providers implement [`QueryPort`] and
//! are injected per run; the orchestrator never constructs one itself.

mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod script;

pub use stepchain_utils::error::QueryError;
pub use types::{QueryOptions, QueryPort, QueryResponse};

#[cfg(any(test, feature = "test-utils"))]
pub use script::{RecordedCall, ScriptedPort};
