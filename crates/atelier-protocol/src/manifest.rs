//! Durable audit record of one tool invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::{Artifact, ToolErrorDetail};

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Success,
    Error,
}

/// Audit record of one invocation. Created with status [`RunStatus::Pending`]
/// at call start, mutated through the call, written to storage exactly once
/// at finalization regardless of outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub request_id: String,
    pub tool_name: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub inputs: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolErrorDetail>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,
}

impl RunManifest {
    /// A fresh manifest at invocation start.
    pub fn pending(
        run_id: impl Into<String>,
        request_id: impl Into<String>,
        tool_name: impl Into<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            request_id: request_id.into(),
            tool_name: tool_name.into(),
            status: RunStatus::Pending,
            start_time,
            end_time: None,
            duration_seconds: 0.0,
            inputs: Value::Object(serde_json::Map::new()),
            outputs: None,
            error: None,
            artifacts: Vec::new(),
            config_hash: None,
            tool_version: None,
        }
    }

    /// Record the successful outcome.
    pub fn mark_success(&mut self, outputs: Value) {
        self.status = RunStatus::Success;
        self.outputs = Some(outputs);
    }

    /// Record the failure detail.
    pub fn mark_error(&mut self, detail: ToolErrorDetail) {
        self.status = RunStatus::Error;
        self.error = Some(detail);
    }

    /// Stamp the end timestamp and derived duration.
    pub fn finalize(&mut self, end_time: DateTime<Utc>) {
        self.end_time = Some(end_time);
        self.duration_seconds =
            (end_time - self.start_time).num_milliseconds().max(0) as f64 / 1000.0;
    }
}
