//! atelier: middleware between a command-dispatch front end and pluggable
//! tool handlers that automate external creative applications.
//!
//! The pipeline turns a (tool name, input payload) pair into a validated,
//! policy-checked, executed, and durably-recorded result. Every failure mode
//! is normalized into one of two wire envelopes, and each invocation writes
//! exactly one audit manifest.

pub mod config;
pub mod error;
pub mod execution;
pub mod observability;
pub mod policy;
pub mod registry;
pub mod storage;
pub mod system_tools;

pub use crate::config::Settings;
pub use crate::error::{CoreError, CoreResult};
pub use crate::execution::{ExecuteOptions, ToolExecutor};
pub use crate::observability::ExecutionContext;
pub use crate::policy::PolicyEngine;
pub use crate::registry::{HandlerContext, ToolDescriptor, ToolRegistry};
pub use crate::storage::ArtifactStore;

pub use atelier_protocol as protocol;
