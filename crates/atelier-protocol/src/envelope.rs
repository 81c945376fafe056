//! Wire envelopes wrapping the outcome of one tool invocation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol revision stamped on every envelope.
pub const PROTOCOL_VERSION: &str = "1.0";

fn protocol_version() -> String {
    PROTOCOL_VERSION.to_string()
}

fn ok_status() -> String {
    "ok".to_string()
}

fn error_status() -> String {
    "error".to_string()
}

/// A named output blob or file produced during a tool run.
///
/// Invariant in persisted state: `content` and `uri` are mutually exclusive.
/// An artifact carrying inline content has `content` cleared and `uri` set
/// once it is written through the artifact store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Artifact {
    /// An artifact carrying inline content, to be persisted by the store.
    pub fn inline(kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            uri: None,
            content: Some(content.into()),
            metadata: None,
        }
    }

    /// An artifact referencing an already-existing location.
    pub fn reference(kind: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            uri: Some(uri.into()),
            content: None,
            metadata: None,
        }
    }

    /// Attach a metadata entry, creating the map if absent.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }
}

/// Successful invocation outcome, `status = "ok"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default = "protocol_version")]
    pub protocol_version: String,
    pub tool: String,
    pub request_id: String,
    pub run_id: String,
    #[serde(default = "ok_status")]
    pub status: String,
    pub result: Value,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ToolResult {
    /// Build a result for a handler to return. The `request_id` and `run_id`
    /// fields are left empty; the pipeline stamps the authoritative
    /// identifiers before the envelope reaches the caller.
    pub fn new(tool: impl Into<String>, result: Value) -> Self {
        Self {
            protocol_version: protocol_version(),
            tool: tool.into(),
            request_id: String::new(),
            run_id: String::new(),
            status: ok_status(),
            result,
            artifacts: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// The `error` member of a [`ToolError`] envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub retriable: bool,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl ToolErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retriable: false,
            details: Map::new(),
        }
    }
}

/// Failed invocation outcome, `status = "error"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    #[serde(default = "protocol_version")]
    pub protocol_version: String,
    pub tool: String,
    pub request_id: String,
    pub run_id: String,
    #[serde(default = "error_status")]
    pub status: String,
    pub error: ToolErrorDetail,
}

impl ToolError {
    /// Build an error for a handler to return. Identifiers are stamped by
    /// the pipeline, as with [`ToolResult::new`].
    pub fn new(
        tool: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            protocol_version: protocol_version(),
            tool: tool.into(),
            request_id: String::new(),
            run_id: String::new(),
            status: error_status(),
            error: ToolErrorDetail::new(code, message),
        }
    }

    /// Build an error envelope around an existing detail.
    pub fn from_detail(tool: impl Into<String>, detail: ToolErrorDetail) -> Self {
        Self {
            protocol_version: protocol_version(),
            tool: tool.into(),
            request_id: String::new(),
            run_id: String::new(),
            status: error_status(),
            error: detail,
        }
    }

    pub fn retriable(mut self, retriable: bool) -> Self {
        self.error.retriable = retriable;
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.error.details.insert(key.into(), value);
        self
    }
}

/// Discriminated success/error union returned by the executor.
///
/// The arms carry disjoint members (`result` vs `error`), so untagged serde
/// resolution is unambiguous.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Ok(ToolResult),
    Err(ToolError),
}

impl Envelope {
    pub fn is_ok(&self) -> bool {
        matches!(self, Envelope::Ok(_))
    }

    pub fn tool(&self) -> &str {
        match self {
            Envelope::Ok(r) => &r.tool,
            Envelope::Err(e) => &e.tool,
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            Envelope::Ok(r) => &r.request_id,
            Envelope::Err(e) => &e.request_id,
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            Envelope::Ok(r) => &r.run_id,
            Envelope::Err(e) => &e.run_id,
        }
    }
}

impl From<Result<ToolResult, ToolError>> for Envelope {
    fn from(outcome: Result<ToolResult, ToolError>) -> Self {
        match outcome {
            Ok(result) => Envelope::Ok(result),
            Err(error) => Envelope::Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn result_wire_shape() {
        let mut result = ToolResult::new("scene.generate", json!({"objects": 3}));
        result.request_id = "req-1".to_string();
        result.run_id = "run-1".to_string();
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["protocol_version"], "1.0");
        assert_eq!(value["status"], "ok");
        assert_eq!(value["tool"], "scene.generate");
        assert_eq!(value["request_id"], "req-1");
        assert_eq!(value["run_id"], "run-1");
        assert_eq!(value["result"]["objects"], 3);
        assert_eq!(value["artifacts"], json!([]));
        assert_eq!(value["warnings"], json!([]));
    }

    #[test]
    fn error_wire_shape() {
        let mut error = ToolError::new("scene.generate", "VALIDATION_ERROR", "missing field")
            .retriable(false)
            .with_detail("field", json!("description"));
        error.request_id = "req-2".to_string();
        error.run_id = "run-2".to_string();
        let value = serde_json::to_value(&error).unwrap();

        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(value["error"]["retriable"], false);
        assert_eq!(value["error"]["details"]["field"], "description");
    }

    #[test]
    fn inline_artifact_omits_absent_fields() {
        let artifact = Artifact::inline("text/plain", "hello");
        let value = serde_json::to_value(&artifact).unwrap();

        assert_eq!(value["type"], "text/plain");
        assert_eq!(value["content"], "hello");
        assert!(value.get("uri").is_none());
        assert!(value.get("metadata").is_none());
    }

    #[test]
    fn artifact_metadata_roundtrip() {
        let artifact =
            Artifact::inline("text/plain", "x").with_metadata("filename", json!("out.txt"));
        let value = serde_json::to_value(&artifact).unwrap();
        let back: Artifact = serde_json::from_value(value).unwrap();
        assert_eq!(back, artifact);
    }

    #[test]
    fn envelope_untagged_resolution() {
        let ok = json!({
            "protocol_version": "1.0",
            "tool": "t",
            "request_id": "r",
            "run_id": "x",
            "status": "ok",
            "result": {},
            "artifacts": [],
            "warnings": []
        });
        let err = json!({
            "protocol_version": "1.0",
            "tool": "t",
            "request_id": "r",
            "run_id": "x",
            "status": "error",
            "error": {"code": "INTERNAL_ERROR", "message": "boom", "retriable": false, "details": {}}
        });

        assert!(matches!(
            serde_json::from_value::<Envelope>(ok).unwrap(),
            Envelope::Ok(_)
        ));
        assert!(matches!(
            serde_json::from_value::<Envelope>(err).unwrap(),
            Envelope::Err(_)
        ));
    }
}
