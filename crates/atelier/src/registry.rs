//! Tool catalog: the name → descriptor mapping, populated once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use atelier_protocol::{ToolError, ToolResult};

use crate::config::Settings;
use crate::error::{CoreError, CoreResult};

/// Per-call view handed to handlers. Introspection tools reach the catalog
/// and active settings through this instead of process-wide state.
#[derive(Clone)]
pub struct HandlerContext {
    pub registry: Arc<ToolRegistry>,
    pub settings: Arc<Settings>,
}

impl HandlerContext {
    pub fn new(registry: Arc<ToolRegistry>, settings: Arc<Settings>) -> Self {
        Self { registry, settings }
    }
}

/// Handler contract: validated JSON input plus context, resolving to the
/// domain outcome as a value. Expected domain failures come back as
/// [`ToolError`], never as panics. Dropping the returned future is the
/// cancellation signal; the executor does so when a deadline elapses.
pub type ToolHandler = Box<
    dyn Fn(Value, HandlerContext) -> BoxFuture<'static, Result<ToolResult, ToolError>>
        + Send
        + Sync,
>;

/// Registration input for one tool.
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema the caller's payload must satisfy.
    pub input_schema: Value,
    /// Destructive tools are additionally gated by policy.
    pub destructive: bool,
    pub handler: ToolHandler,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: ToolHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            destructive: false,
            handler,
        }
    }

    pub fn destructive(mut self, destructive: bool) -> Self {
        self.destructive = destructive;
        self
    }
}

/// A cataloged tool. The input schema is compiled once at registration;
/// descriptors are immutable afterwards.
pub struct RegisteredTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub destructive: bool,
    pub(crate) handler: ToolHandler,
    compiled: JSONSchema,
}

impl RegisteredTool {
    /// Validate a caller payload against the compiled input schema.
    pub fn validate_input(&self, input: &Value) -> CoreResult<()> {
        if let Err(errors) = self.compiled.validate(input) {
            let first = errors
                .into_iter()
                .next()
                .map(|error| error.to_string())
                .unwrap_or_else(|| "input does not match schema".to_string());
            return Err(CoreError::Validation(first));
        }
        Ok(())
    }
}

/// The catalog. Not safe for concurrent mutation: populate before serving
/// concurrent traffic, then share behind `Arc`.
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, compiling its input schema.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> CoreResult<()> {
        if self.tools.contains_key(&descriptor.name) {
            return Err(CoreError::AlreadyRegistered(descriptor.name));
        }
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&descriptor.input_schema)
            .map_err(|error| CoreError::InvalidSchema(error.to_string()))?;

        let ToolDescriptor {
            name,
            description,
            input_schema,
            destructive,
            handler,
        } = descriptor;
        self.tools.insert(
            name.clone(),
            RegisteredTool {
                name,
                description,
                input_schema,
                destructive,
                handler,
                compiled,
            },
        );
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// All tools, sorted lexicographically by name for deterministic
    /// catalog listings.
    pub fn list(&self) -> Vec<&RegisteredTool> {
        let mut tools: Vec<&RegisteredTool> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
