// Expression evaluator collaborator
//
// Compiles condition and log expressions against a suspended frame. The engine
// only consumes this interface; compiled expressions are cached per request.

use crate::error::EvaluationError;
use crate::types::{Frame, SourcePosition, ThreadId, Value};
use std::sync::Arc;

/// Where an expression runs
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub thread: ThreadId,
    pub frame: Frame,
}

pub trait CompiledExpression: Send + Sync {
    fn evaluate(&self, context: &EvaluationContext) -> Result<Value, EvaluationError>;
}

pub trait ExpressionEvaluator: Send {
    fn compile(
        &self,
        expression: &str,
        frame: &Frame,
        position: Option<&SourcePosition>,
    ) -> Result<Arc<dyn CompiledExpression>, EvaluationError>;
}
