//! Per-invocation correlation state and logging setup.

pub mod context;
pub mod logging;

pub use context::ExecutionContext;
