// Breakpoint data model
//
// A breakpoint is a shared property record (filters, condition, suspend policy,
// actions) plus one closed category variant that knows how to turn itself into
// runtime requests.

use crate::category::Category;
use crate::error::{EngineError, EngineResult, RuntimeResult};
use crate::eventrequest::{RequestKind, SuspendPolicy};
use crate::events::EventKind;
use crate::exception::{AnyExceptionBreakpoint, ExceptionBreakpoint};
use crate::field::FieldBreakpoint;
use crate::filter::{ClassFilter, FilterSet};
use crate::line::LineBreakpoint;
use crate::method::MethodBreakpoint;
use crate::runtime::Runtime;
use crate::source::SourceIndex;
use crate::types::{BreakpointId, Frame, ObjectId, SourcePosition, TypeInfo};
use crate::wildcard::WildcardMethodBreakpoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Condition expression attached to a breakpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub expression: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Condition {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            enabled: true,
        }
    }

    /// Enabled and not blank
    pub fn is_active(&self) -> bool {
        self.enabled && !self.expression.trim().is_empty()
    }
}

/// Logging actions performed on every accepted hit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogOptions {
    #[serde(default)]
    pub message: bool,
    #[serde(default)]
    pub expression: Option<Condition>,
    #[serde(default)]
    pub stack: bool,
}

impl LogOptions {
    pub fn is_empty(&self) -> bool {
        !self.message && !self.stack && !self.expression.as_ref().is_some_and(|e| e.is_active())
    }
}

/// Pass every Nth hit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountFilter {
    pub threshold: u32,
    pub enabled: bool,
}

impl CountFilter {
    pub fn every(threshold: u32) -> Self {
        Self {
            threshold,
            enabled: true,
        }
    }

    /// Whether the `counter`th hit passes
    pub fn passes(&self, counter: u64) -> bool {
        !self.enabled || self.threshold == 0 || counter % u64::from(self.threshold) == 0
    }
}

fn default_true() -> bool {
    true
}

/// Properties shared by every category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakpointProperties {
    pub enabled: bool,
    pub suspend_policy: SuspendPolicy,
    pub condition: Option<Condition>,
    pub log: LogOptions,
    pub count_filter: CountFilter,
    pub class_filters_enabled: bool,
    pub class_filters: FilterSet,
    pub instance_filters_enabled: bool,
    pub instance_filters: BTreeSet<ObjectId>,
    pub caller_filters_enabled: bool,
    pub caller_filters: Option<FilterSet>,
    pub remove_after_hit: bool,
}

impl Default for BreakpointProperties {
    fn default() -> Self {
        Self {
            enabled: true,
            suspend_policy: SuspendPolicy::All,
            condition: None,
            log: LogOptions::default(),
            count_filter: CountFilter::default(),
            class_filters_enabled: false,
            class_filters: FilterSet::default(),
            instance_filters_enabled: false,
            instance_filters: BTreeSet::new(),
            caller_filters_enabled: false,
            caller_filters: None,
            remove_after_hit: false,
        }
    }
}

impl BreakpointProperties {
    pub fn active_condition(&self) -> Option<&Condition> {
        self.condition.as_ref().filter(|c| c.is_active())
    }

    pub fn with_class_filters(mut self, include: &[&str], exclude: &[&str]) -> Self {
        self.class_filters_enabled = true;
        self.class_filters = FilterSet::new(
            include.iter().map(|p| ClassFilter::new(*p)).collect(),
            exclude.iter().map(|p| ClassFilter::new(*p)).collect(),
        );
        self
    }

    pub fn with_caller_filters(mut self, include: &[&str], exclude: &[&str]) -> Self {
        self.caller_filters_enabled = true;
        self.caller_filters = Some(FilterSet::new(
            include.iter().map(|p| ClassFilter::new(*p)).collect(),
            exclude.iter().map(|p| ClassFilter::new(*p)).collect(),
        ));
        self
    }

    pub fn with_instance_filters(mut self, ids: &[ObjectId]) -> Self {
        self.instance_filters_enabled = true;
        self.instance_filters = ids.iter().copied().collect();
        self
    }
}

/// Cached verification marker shown next to the breakpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VerifiedState {
    #[default]
    Unverified,
    /// Armed, waiting for a matching type to load
    Pending,
    /// At least one request is installed
    Verified,
    Invalid(String),
}

impl VerifiedState {
    pub fn is_invalid(&self) -> bool {
        matches!(self, VerifiedState::Invalid(_))
    }
}

/// What a deferred wait is waiting for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitTarget {
    /// One type name; resolved once
    Exact(String),
    /// Any type whose name matches; never resolved
    Pattern(ClassFilter),
    /// Any type that extends/implements the named type; never resolved
    SubtypeOf(String),
}

impl WaitTarget {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WaitTarget::Exact(_))
    }

    pub fn matches(&self, ty: &TypeInfo) -> bool {
        match self {
            WaitTarget::Exact(name) => ty.name == *name,
            WaitTarget::Pattern(filter) => filter.matches(&ty.name),
            WaitTarget::SubtypeOf(name) => ty.name != *name && ty.is_subtype_of(name),
        }
    }
}

/// Per-category behaviour
pub trait CategoryBehavior {
    fn category(&self) -> Category;

    /// Short human readable description, e.g. `Foo.java:10`
    fn describe(&self) -> String;

    /// Types the breakpoint needs; empty for type-less breakpoints.
    /// `Err` carries the reason the breakpoint cannot be resolved.
    fn wait_targets(&self) -> Result<Vec<WaitTarget>, String>;

    /// Requests for one prepared type reached through `target`
    fn create_requests(
        &self,
        runtime: &dyn Runtime,
        ty: &TypeInfo,
        target: &WaitTarget,
    ) -> EngineResult<Vec<RequestKind>>;

    /// Requests that need no type at all
    fn untargeted_requests(&self, _runtime: &dyn Runtime) -> Vec<RequestKind> {
        Vec::new()
    }

    /// Category specific check of an event against the breakpoint
    fn matches_event(&self, _event: &EventKind, _top: &Frame) -> bool {
        true
    }

    /// Name tested by class filters
    fn event_class(
        &self,
        _event: &EventKind,
        top: &Frame,
        runtime: &dyn Runtime,
    ) -> RuntimeResult<String> {
        match top.this_object {
            Some(object) => runtime.object_type_name(object),
            None => Ok(top.declaring_type.clone()),
        }
    }

    /// Source position for expression compilation
    fn position(&self) -> Option<&SourcePosition> {
        None
    }

    /// Re-resolve against the source index
    fn reload(&mut self, _index: &dyn SourceIndex) -> Result<(), String> {
        Ok(())
    }
}

/// Category variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum BreakpointKind {
    Line(LineBreakpoint),
    Method(MethodBreakpoint),
    Field(FieldBreakpoint),
    Exception(ExceptionBreakpoint),
    AnyException(AnyExceptionBreakpoint),
    WildcardMethod(WildcardMethodBreakpoint),
}

impl BreakpointKind {
    pub fn behavior(&self) -> &dyn CategoryBehavior {
        match self {
            BreakpointKind::Line(bp) => bp,
            BreakpointKind::Method(bp) => bp,
            BreakpointKind::Field(bp) => bp,
            BreakpointKind::Exception(bp) => bp,
            BreakpointKind::AnyException(bp) => bp,
            BreakpointKind::WildcardMethod(bp) => bp,
        }
    }

    pub fn behavior_mut(&mut self) -> &mut dyn CategoryBehavior {
        match self {
            BreakpointKind::Line(bp) => bp,
            BreakpointKind::Method(bp) => bp,
            BreakpointKind::Field(bp) => bp,
            BreakpointKind::Exception(bp) => bp,
            BreakpointKind::AnyException(bp) => bp,
            BreakpointKind::WildcardMethod(bp) => bp,
        }
    }

    pub fn category(&self) -> Category {
        self.behavior().category()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub id: BreakpointId,
    #[serde(flatten)]
    pub kind: BreakpointKind,
    #[serde(flatten)]
    pub properties: BreakpointProperties,
    #[serde(skip)]
    verified: VerifiedState,
    #[serde(skip)]
    generation: u64,
}

impl Breakpoint {
    pub fn new(id: BreakpointId, kind: BreakpointKind) -> Self {
        Self::with_properties(id, kind, BreakpointProperties::default())
    }

    pub fn with_properties(
        id: BreakpointId,
        kind: BreakpointKind,
        properties: BreakpointProperties,
    ) -> Self {
        Self {
            id,
            kind,
            properties,
            verified: VerifiedState::Unverified,
            generation: 0,
        }
    }

    /// Deserialize a persisted breakpoint; unknown categories are a hard error
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let category = value
            .get("category")
            .and_then(|c| c.as_str())
            .ok_or_else(|| EngineError::UnknownCategory("<missing>".to_string()))?;
        Category::from_str(category)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn category(&self) -> Category {
        self.kind.category()
    }

    pub fn behavior(&self) -> &dyn CategoryBehavior {
        self.kind.behavior()
    }

    pub fn is_enabled(&self) -> bool {
        self.properties.enabled
    }

    pub fn verified(&self) -> &VerifiedState {
        &self.verified
    }

    pub fn set_verified(&mut self, state: VerifiedState) -> bool {
        if self.verified == state {
            return false;
        }
        self.verified = state;
        true
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Re-resolve the source position; clears or sets the invalid marker
    pub fn reload(&mut self, index: &dyn SourceIndex) {
        self.bump_generation();
        match self.kind.behavior_mut().reload(index) {
            Ok(()) => {
                if self.verified.is_invalid() {
                    self.verified = VerifiedState::Unverified;
                }
            }
            Err(reason) => self.verified = VerifiedState::Invalid(reason),
        }
    }

    pub fn describe(&self) -> String {
        self.behavior().describe()
    }
}
