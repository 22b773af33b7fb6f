// Hit filter chain
//
// Decides whether a request hit should stop. Checks run in a fixed order and
// the first failing check wins. Per-hit failures are folded into the verdict.

use crate::breakpoint::Breakpoint;
use crate::error::{EvaluationError, RuntimeError};
use crate::evaluator::{EvaluationContext, ExpressionEvaluator};
use crate::events::{EventKind, Hit};
use crate::filter::caller_matches;
use crate::requests::RequestManager;
use crate::runtime::Runtime;
use crate::types::{Frame, ObjectId, Value};
use std::fmt;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Target gone, or the evaluation was interrupted by a disconnect
    Detached,
    /// Breakpoint invalid or the request is no longer owned by it
    Stale,
    /// Event is for a different member than the breakpoint watches
    EventMismatch,
    CallerFilter,
    InstanceFilter,
    ClassFilter,
    Condition,
    Count,
}

/// Chain step that could not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStep {
    Frames,
    ClassFilter,
    Condition,
}

#[derive(Debug)]
pub enum Verdict {
    Stop,
    Skip(SkipReason),
    Error(FailedStep, EvaluationError),
}

impl Verdict {
    pub fn is_stop(&self) -> bool {
        matches!(self, Verdict::Stop)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Stop => f.write_str("stop"),
            Verdict::Skip(reason) => write!(f, "skip ({:?})", reason),
            Verdict::Error(step, err) => write!(f, "error in {:?} ({})", step, err),
        }
    }
}

fn runtime_failure(step: FailedStep, err: RuntimeError) -> Verdict {
    match err {
        RuntimeError::Disconnected => Verdict::Skip(SkipReason::Detached),
        other => Verdict::Error(step, other.into()),
    }
}

/// Everything the chain needs besides the breakpoint and the hit
pub struct FilterChain<'a> {
    pub runtime: &'a dyn Runtime,
    pub evaluator: &'a dyn ExpressionEvaluator,
    pub requests: &'a mut RequestManager,
}

impl<'a> FilterChain<'a> {
    pub fn evaluate(&mut self, bp: &Breakpoint, hit: &Hit) -> Verdict {
        let verdict = self.run(bp, hit);
        debug!("{} hit by {} on thread {}: {}", bp.id, hit.request, hit.thread, verdict);
        verdict
    }

    fn run(&mut self, bp: &Breakpoint, hit: &Hit) -> Verdict {
        if !self.runtime.is_attached() {
            return Verdict::Skip(SkipReason::Detached);
        }
        if bp.verified().is_invalid() || self.requests.owner_of(hit.request) != Some(bp.id) {
            return Verdict::Skip(SkipReason::Stale);
        }

        let frames = match self.runtime.frames(hit.thread) {
            Ok(frames) => frames,
            Err(err) => return runtime_failure(FailedStep::Frames, err),
        };
        let Some(top) = frames.first() else {
            return Verdict::Error(
                FailedStep::Frames,
                EvaluationError::failed(format!("Thread {} has no frames", hit.thread)),
            );
        };
        if !bp.behavior().matches_event(&hit.kind, top) {
            return Verdict::Skip(SkipReason::EventMismatch);
        }

        let props = &bp.properties;
        let condition = props.active_condition();
        let count_only = props.count_filter.enabled && condition.is_none();

        if !count_only {
            if let Some(reason) = self.check_filters(bp, hit, &frames) {
                return reason;
            }
            if let Some(condition) = condition {
                match self.check_condition(bp, hit, top, &condition.expression) {
                    Ok(true) => {}
                    Ok(false) => return Verdict::Skip(SkipReason::Condition),
                    Err(err) if err.is_disconnect() => return Verdict::Skip(SkipReason::Detached),
                    Err(err) => return Verdict::Error(FailedStep::Condition, err),
                }
            }
        }

        let counter = self.requests.record_hit(hit.request);
        if props.count_filter.passes(counter) {
            Verdict::Stop
        } else {
            trace!("{} count {} does not pass", bp.id, counter);
            Verdict::Skip(SkipReason::Count)
        }
    }

    /// Caller, instance and class filters
    fn check_filters(&self, bp: &Breakpoint, hit: &Hit, frames: &[Frame]) -> Option<Verdict> {
        let props = &bp.properties;
        let top = &frames[0];

        if props.caller_filters_enabled {
            if let Some(filters) = props.caller_filters.as_ref().filter(|f| !f.is_empty()) {
                let passes = match frames.get(1) {
                    Some(caller) => {
                        caller_matches(&caller.method_key(), &caller.short_method_key(), filters)
                    }
                    // no caller: only an exclude-only filter lets it through
                    None => !filters.include.iter().any(|f| f.enabled),
                };
                if !passes {
                    return Some(Verdict::Skip(SkipReason::CallerFilter));
                }
            }
        }

        if props.instance_filters_enabled && !props.instance_filters.is_empty() {
            if let Some(receiver) = receiver_of(&hit.kind, top) {
                if !props.instance_filters.contains(&receiver) {
                    return Some(Verdict::Skip(SkipReason::InstanceFilter));
                }
            }
        }

        if props.class_filters_enabled && !props.class_filters.is_empty() {
            let class_name = match bp.behavior().event_class(&hit.kind, top, self.runtime) {
                Ok(name) => name,
                Err(err) => return Some(runtime_failure(FailedStep::ClassFilter, err)),
            };
            if !props.class_filters.matches(&class_name) {
                return Some(Verdict::Skip(SkipReason::ClassFilter));
            }
        }
        None
    }

    fn check_condition(
        &mut self,
        bp: &Breakpoint,
        hit: &Hit,
        top: &Frame,
        expression: &str,
    ) -> Result<bool, EvaluationError> {
        let value = evaluate_expression(self.evaluator, self.requests, bp, hit, top, expression)?;
        match value {
            Value::Boolean(result) => Ok(result),
            other => Err(EvaluationError::failed(format!(
                "Condition '{}' must be boolean, got {}",
                expression,
                other.format()
            ))),
        }
    }
}

/// Object an instance filter is tested against: the thrown object for
/// exception events, `this` of the top frame otherwise
fn receiver_of(event: &EventKind, top: &Frame) -> Option<ObjectId> {
    match event {
        EventKind::Exception { exception, .. } => Some(*exception),
        _ => top.this_object,
    }
}

/// Evaluate `expression` in the hit's top frame, going through the request's
/// compiled expression cache
pub fn evaluate_expression(
    evaluator: &dyn ExpressionEvaluator,
    requests: &mut RequestManager,
    bp: &Breakpoint,
    hit: &Hit,
    top: &Frame,
    expression: &str,
) -> Result<Value, EvaluationError> {
    let compiled = requests.compiled(hit.request, &top.location, expression, || {
        evaluator.compile(expression, top, bp.behavior().position())
    })?;
    let context = EvaluationContext {
        thread: hit.thread,
        frame: top.clone(),
    };
    compiled.evaluate(&context)
}
