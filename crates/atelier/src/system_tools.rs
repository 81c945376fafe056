//! Built-in introspection tools registered alongside the domain tools.

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use atelier_protocol::{ToolError, ToolResult};

use crate::error::CoreResult;
use crate::execution::redact::{is_sensitive_key, redact_value, REDACTED};
use crate::registry::{HandlerContext, ToolDescriptor, ToolRegistry};

pub const LIST_COMMANDS: &str = "atelier.list_commands";
pub const HELP: &str = "atelier.help";
pub const CONFIG_GET: &str = "atelier.config_get";
pub const CONFIG_SET: &str = "atelier.config_set";
pub const RESET_CONFIG: &str = "atelier.reset_config";

/// Register the built-in tools. Idempotent, so front ends can call it
/// unconditionally during startup wiring.
pub fn register_system_tools(registry: &mut ToolRegistry) -> CoreResult<()> {
    if registry.get(LIST_COMMANDS).is_some() {
        return Ok(());
    }

    registry.register(ToolDescriptor::new(
        LIST_COMMANDS,
        "List all available tools and their input schemas.",
        json!({"type": "object"}),
        Box::new(list_commands),
    ))?;
    registry.register(ToolDescriptor::new(
        HELP,
        "Get detailed help for a specific tool.",
        json!({
            "type": "object",
            "required": ["command_name"],
            "properties": {"command_name": {"type": "string"}}
        }),
        Box::new(help),
    ))?;
    registry.register(ToolDescriptor::new(
        CONFIG_GET,
        "Get a configuration value by dot-separated key.",
        json!({
            "type": "object",
            "required": ["key"],
            "properties": {"key": {"type": "string"}}
        }),
        Box::new(config_get),
    ))?;
    registry.register(ToolDescriptor::new(
        CONFIG_SET,
        "Set a configuration value (not implemented).",
        json!({
            "type": "object",
            "required": ["key", "value"],
            "properties": {"key": {"type": "string"}, "value": {}}
        }),
        Box::new(config_set),
    ))?;
    registry.register(ToolDescriptor::new(
        RESET_CONFIG,
        "Reset configuration to defaults (not implemented).",
        json!({
            "type": "object",
            "properties": {"confirm": {"type": "boolean"}}
        }),
        Box::new(reset_config),
    ))?;
    Ok(())
}

fn parse_input<T: DeserializeOwned>(tool: &str, input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input)
        .map_err(|error| ToolError::new(tool, "VALIDATION_ERROR", format!("invalid input: {error}")))
}

fn list_commands(
    _input: Value,
    ctx: HandlerContext,
) -> BoxFuture<'static, Result<ToolResult, ToolError>> {
    Box::pin(async move {
        let tools: Vec<Value> = ctx
            .registry
            .list()
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema,
                })
            })
            .collect();
        Ok(ToolResult::new(LIST_COMMANDS, json!({ "tools": tools })))
    })
}

#[derive(Deserialize)]
struct HelpInput {
    command_name: String,
}

fn help(input: Value, ctx: HandlerContext) -> BoxFuture<'static, Result<ToolResult, ToolError>> {
    Box::pin(async move {
        let input: HelpInput = parse_input(HELP, input)?;
        match ctx.registry.get(&input.command_name) {
            Some(tool) => Ok(ToolResult::new(
                HELP,
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema,
                    "destructive": tool.destructive,
                }),
            )),
            None => Err(ToolError::new(
                HELP,
                "TOOL_NOT_FOUND",
                format!("tool '{}' is not registered", input.command_name),
            )),
        }
    })
}

#[derive(Deserialize)]
struct ConfigGetInput {
    key: String,
}

fn config_get(
    input: Value,
    ctx: HandlerContext,
) -> BoxFuture<'static, Result<ToolResult, ToolError>> {
    Box::pin(async move {
        let input: ConfigGetInput = parse_input(CONFIG_GET, input)?;
        let snapshot = serde_json::to_value(ctx.settings.as_ref()).map_err(|error| {
            ToolError::new(CONFIG_GET, "INTERNAL_ERROR", format!("settings serialize: {error}"))
        })?;

        let mut cursor = &snapshot;
        for segment in input.key.split('.') {
            match cursor.get(segment) {
                Some(next) => cursor = next,
                None => {
                    return Err(ToolError::new(
                        CONFIG_GET,
                        "CONFIG_KEY_NOT_FOUND",
                        format!("key '{}' not found in configuration", input.key),
                    ))
                }
            }
        }

        let value = if input.key.split('.').any(is_sensitive_key) {
            Value::String(REDACTED.to_string())
        } else {
            redact_value(cursor)
        };
        Ok(ToolResult::new(
            CONFIG_GET,
            json!({"key": input.key, "value": value}),
        ))
    })
}

// Settings are sourced from file and environment and immutable at runtime;
// a mutable backing store would be required to honor these two.
fn config_set(
    _input: Value,
    _ctx: HandlerContext,
) -> BoxFuture<'static, Result<ToolResult, ToolError>> {
    Box::pin(async {
        Err(ToolError::new(
            CONFIG_SET,
            "NOT_IMPLEMENTED",
            "runtime configuration modification is not supported; use the config file or environment variables",
        ))
    })
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ResetConfigInput {
    confirm: bool,
}

fn reset_config(
    input: Value,
    _ctx: HandlerContext,
) -> BoxFuture<'static, Result<ToolResult, ToolError>> {
    Box::pin(async move {
        let input: ResetConfigInput = parse_input(RESET_CONFIG, input)?;
        if !input.confirm {
            return Err(ToolError::new(
                RESET_CONFIG,
                "CONFIRMATION_REQUIRED",
                "pass confirm=true to reset configuration",
            ));
        }
        Err(ToolError::new(
            RESET_CONFIG,
            "NOT_IMPLEMENTED",
            "runtime configuration reset is not supported",
        ))
    })
}
