//! Shared plumbing for the handoff workspace.

pub mod config;
pub mod tracing;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type BoxResult<T> = Result<T, BoxError>;
