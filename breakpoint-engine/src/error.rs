// Engine error types
//
// Structural failures are returned as EngineError; per-hit failures are folded
// into filter chain verdicts and never escape the session context.

use crate::types::{BreakpointId, RequestId};
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid breakpoint {0}: {1}")]
    InvalidBreakpoint(BreakpointId, String),

    #[error("Evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("No {member_kind} '{member}' in {type_name}")]
    MissingMember {
        member_kind: &'static str,
        member: String,
        type_name: String,
    },

    #[error("Request registration failed: {0}")]
    RequestRegistration(String),

    #[error("Unknown breakpoint category: {0}")]
    UnknownCategory(String),

    #[error("Unknown breakpoint: {0}")]
    UnknownBreakpoint(BreakpointId),

    #[error("Dependency rule {master} -> {slave} would form a cycle")]
    DependencyCycle {
        master: BreakpointId,
        slave: BreakpointId,
    },

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Malformed breakpoint data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session closed")]
    SessionClosed,
}

/// Failures reported by the runtime collaborator
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Target disconnected")]
    Disconnected,

    #[error("Runtime does not support {0}")]
    NotSupported(&'static str),

    #[error("Invalid type id {0}")]
    InvalidType(u64),

    #[error("Unknown request {0}")]
    UnknownRequest(RequestId),

    #[error("{0}")]
    Other(String),
}

/// Failures while compiling or evaluating a condition / log expression
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Target disconnected during evaluation")]
    Disconnected,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl EvaluationError {
    pub fn failed(message: impl Into<String>) -> Self {
        EvaluationError::Failed(anyhow::anyhow!(message.into()))
    }

    pub fn is_disconnect(&self) -> bool {
        matches!(self, EvaluationError::Disconnected)
    }
}

impl From<RuntimeError> for EvaluationError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Disconnected => EvaluationError::Disconnected,
            other => EvaluationError::Failed(anyhow::Error::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_disconnect_maps_to_evaluation_disconnect() {
        let err: EvaluationError = RuntimeError::Disconnected.into();
        assert!(err.is_disconnect());

        let err: EvaluationError = RuntimeError::Other("boom".to_string()).into();
        assert!(!err.is_disconnect());
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_error_messages() {
        let err = EngineError::MissingMember {
            member_kind: "field",
            member: "count".to_string(),
            type_name: "com.foo.Bar".to_string(),
        };
        assert_eq!(err.to_string(), "No field 'count' in com.foo.Bar");

        let err = EngineError::DependencyCycle {
            master: BreakpointId(1),
            slave: BreakpointId(2),
        };
        assert_eq!(err.to_string(), "Dependency rule bp_1 -> bp_2 would form a cycle");
    }
}
