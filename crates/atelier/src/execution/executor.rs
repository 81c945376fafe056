//! Orchestrates one invocation lifecycle: bind context, look up, validate,
//! policy-check, invoke, persist artifacts, write the manifest, return an
//! envelope. Every failure mode normalizes into a `ToolError` envelope; no
//! panic escapes to the caller.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use serde_json::Value;
use uuid::Uuid;

use atelier_protocol::{Envelope, RunManifest, ToolError, ToolResult};

use crate::config::Settings;
use crate::error::CoreError;
use crate::execution::redact::redact_value;
use crate::observability::context::ExecutionContext;
use crate::policy::PolicyEngine;
use crate::registry::{HandlerContext, ToolRegistry};
use crate::storage::ArtifactStore;

/// Per-call knobs supplied by the front end.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Caller-supplied correlation id, echoed verbatim when present.
    pub request_id: Option<String>,
    /// Parent trace id to join; fresh when absent.
    pub trace_id: Option<String>,
    /// Deadline for the handler future. Elapsing cancels the handler by
    /// dropping its future and yields a retriable `DEADLINE_EXCEEDED`.
    pub timeout: Option<Duration>,
}

/// Pipeline failures split by origin: handler-reported errors pass through
/// unchanged, everything else carries a typed [`CoreError`].
enum PipelineError {
    Reported(ToolError),
    Core(CoreError),
}

impl From<CoreError> for PipelineError {
    fn from(error: CoreError) -> Self {
        PipelineError::Core(error)
    }
}

impl PipelineError {
    fn into_tool_error(self, tool_name: &str) -> ToolError {
        match self {
            PipelineError::Reported(error) => error,
            PipelineError::Core(error) => ToolError::from_detail(tool_name, error.to_detail()),
        }
    }
}

/// The invocation pipeline. One instance serves many concurrent calls; all
/// collaborators are injected at construction.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    policy: PolicyEngine,
    store: ArtifactStore,
    settings: Arc<Settings>,
}

impl ToolExecutor {
    pub fn new(
        registry: Arc<ToolRegistry>,
        policy: PolicyEngine,
        store: ArtifactStore,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            registry,
            policy,
            store,
            settings,
        }
    }

    /// Execute one tool invocation end to end. Always returns a well-formed
    /// envelope and attempts exactly one manifest write, success or failure.
    pub async fn execute(&self, tool_name: &str, input: Value, options: ExecuteOptions) -> Envelope {
        let run_id = Uuid::new_v4().to_string();
        let request_id = options
            .request_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let trace_id = options
            .trace_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let context = ExecutionContext {
            request_id: request_id.clone(),
            run_id: run_id.clone(),
            trace_id,
            tool_name: tool_name.to_string(),
        };

        context
            .scope(self.execute_bound(tool_name, input, options.timeout, run_id, request_id))
            .await
    }

    async fn execute_bound(
        &self,
        tool_name: &str,
        input: Value,
        timeout: Option<Duration>,
        run_id: String,
        request_id: String,
    ) -> Envelope {
        let start_time = Utc::now();
        tracing::info!(
            tool = %tool_name,
            run_id = %run_id,
            request_id = %request_id,
            "starting tool execution"
        );

        let mut manifest = RunManifest::pending(&run_id, &request_id, tool_name, start_time);
        manifest.tool_version = Some(self.settings.protocol_version.clone());
        manifest.config_hash = Some(self.settings.config_hash());

        // Single outermost barrier: a panic anywhere below becomes an
        // INTERNAL_ERROR envelope, with full detail in the log only.
        let outcome =
            std::panic::AssertUnwindSafe(self.run_pipeline(tool_name, input, timeout, &mut manifest))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let message = panic_message(panic);
                    tracing::error!(tool = %tool_name, run_id = %run_id, "handler panicked: {message}");
                    Err(PipelineError::Core(CoreError::Internal(message)))
                });

        // Identifiers on the envelope are pipeline-authoritative.
        let envelope = match outcome {
            Ok(mut result) => {
                result.run_id = run_id.clone();
                result.request_id = request_id.clone();
                tracing::info!(tool = %tool_name, run_id = %run_id, "tool execution successful");
                Envelope::Ok(result)
            }
            Err(failure) => {
                let mut error = failure.into_tool_error(tool_name);
                error.run_id = run_id.clone();
                error.request_id = request_id.clone();
                manifest.mark_error(error.error.clone());
                tracing::error!(
                    tool = %tool_name,
                    run_id = %run_id,
                    code = %error.error.code,
                    "tool execution failed: {}",
                    error.error.message
                );
                Envelope::Err(error)
            }
        };

        manifest.finalize(Utc::now());

        // A manifest-write failure must never alter the computed envelope.
        if let Err(error) = self.store.write_run_manifest(&manifest).await {
            tracing::error!(run_id = %run_id, "failed to write run manifest: {error}");
        }

        envelope
    }

    async fn run_pipeline(
        &self,
        tool_name: &str,
        input: Value,
        timeout: Option<Duration>,
        manifest: &mut RunManifest,
    ) -> Result<ToolResult, PipelineError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| CoreError::ToolNotFound(tool_name.to_string()))?;

        tool.validate_input(&input)?;
        manifest.inputs = redact_value(&input);

        self.policy.check_tool_allowed(tool_name)?;
        self.policy
            .check_destructive_allowed(tool_name, tool.destructive)?;

        let handler_context =
            HandlerContext::new(self.registry.clone(), self.settings.clone());
        let handler_future = (tool.handler)(input, handler_context);
        let outcome = match timeout {
            Some(limit) => tokio::time::timeout(limit, handler_future)
                .await
                .map_err(|_| CoreError::DeadlineExceeded(limit))?,
            None => handler_future.await,
        };

        let mut result = outcome.map_err(PipelineError::Reported)?;
        manifest.mark_success(result.result.clone());

        // Declaration order, one at a time; a storage failure fails the run.
        let mut stored = Vec::with_capacity(result.artifacts.len());
        for artifact in result.artifacts.drain(..) {
            stored.push(self.store.store_artifact(&manifest.run_id, artifact).await?);
        }
        result.artifacts = stored.clone();
        manifest.artifacts = stored;

        Ok(result)
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
