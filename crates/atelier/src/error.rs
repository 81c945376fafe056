//! Unified error type for the atelier crate.

use atelier_protocol::ToolErrorDetail;

/// Crate-wide error, tagged per failure site so the wire code for each
/// failure class survives to the envelope.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("tool '{0}' not found")]
    ToolNotFound(String),

    #[error("input validation failed: {0}")]
    Validation(String),

    #[error("policy denied: {0}")]
    PolicyDenied(String),

    #[error("tool '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("invalid input schema: {0}")]
    InvalidSchema(String),

    #[error("deadline of {}ms exceeded", .0.as_millis())]
    DeadlineExceeded(std::time::Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias using [`CoreError`].
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// The `error.code` this failure carries on the wire.
    pub fn wire_code(&self) -> &'static str {
        match self {
            CoreError::ToolNotFound(_) => "TOOL_NOT_FOUND",
            CoreError::Validation(_) | CoreError::InvalidSchema(_) => "VALIDATION_ERROR",
            CoreError::PolicyDenied(_) => "POLICY_DENIED",
            CoreError::DeadlineExceeded(_) => "DEADLINE_EXCEEDED",
            CoreError::AlreadyRegistered(_) | CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a caller may reasonably retry the same request.
    pub fn retriable(&self) -> bool {
        matches!(self, CoreError::DeadlineExceeded(_))
    }

    /// Convert into the wire-level error detail.
    pub fn to_detail(&self) -> ToolErrorDetail {
        let mut detail = ToolErrorDetail::new(self.wire_code(), self.to_string());
        detail.retriable = self.retriable();
        detail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn wire_codes_map_per_failure_site() {
        assert_eq!(
            CoreError::ToolNotFound("x".into()).wire_code(),
            "TOOL_NOT_FOUND"
        );
        assert_eq!(
            CoreError::Validation("missing field".into()).wire_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            CoreError::PolicyDenied("nope".into()).wire_code(),
            "POLICY_DENIED"
        );
        assert_eq!(
            CoreError::Internal("boom".into()).wire_code(),
            "INTERNAL_ERROR"
        );
    }

    #[test]
    fn deadline_is_retriable_others_are_not() {
        assert!(CoreError::DeadlineExceeded(Duration::from_secs(1)).retriable());
        assert!(!CoreError::Internal("boom".into()).retriable());
        assert!(!CoreError::PolicyDenied("nope".into()).retriable());
    }

    #[test]
    fn detail_preserves_message() {
        let detail = CoreError::ToolNotFound("scene.generate".into()).to_detail();
        assert_eq!(detail.code, "TOOL_NOT_FOUND");
        assert!(detail.message.contains("scene.generate"));
        assert!(!detail.retriable);
    }
}
