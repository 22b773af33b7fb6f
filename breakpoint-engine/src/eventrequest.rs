// Event request descriptions
//
// What the engine asks the runtime to install: breakpoints, watches,
// method entry/exit and exception requests.

use crate::types::{FieldId, Location, MethodId, ReferenceTypeId, ThreadId};
use serde::{Deserialize, Serialize};

/// Suspend policy for events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SuspendPolicy {
    None = 0,
    #[serde(alias = "thread")]
    EventThread = 1,
    #[default]
    All = 2,
}

/// The kind of hook a request installs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestKind {
    Breakpoint {
        location: Location,
    },
    MethodEntry {
        class_id: ReferenceTypeId,
        method_id: Option<MethodId>,
    },
    MethodExit {
        class_id: ReferenceTypeId,
        method_id: Option<MethodId>,
    },
    FieldAccess {
        class_id: ReferenceTypeId,
        field_id: FieldId,
    },
    FieldModification {
        class_id: ReferenceTypeId,
        field_id: FieldId,
    },
    Exception {
        /// `None` catches every throwable
        class_id: Option<ReferenceTypeId>,
        caught: bool,
        uncaught: bool,
    },
}

impl RequestKind {
    pub fn describe(&self) -> &'static str {
        match self {
            RequestKind::Breakpoint { .. } => "breakpoint",
            RequestKind::MethodEntry { .. } => "method entry",
            RequestKind::MethodExit { .. } => "method exit",
            RequestKind::FieldAccess { .. } => "field access watch",
            RequestKind::FieldModification { .. } => "field modification watch",
            RequestKind::Exception { .. } => "exception",
        }
    }

    /// The type this request is bound to, if any
    pub fn class_id(&self) -> Option<ReferenceTypeId> {
        match self {
            RequestKind::Breakpoint { location } => Some(location.class_id),
            RequestKind::MethodEntry { class_id, .. }
            | RequestKind::MethodExit { class_id, .. }
            | RequestKind::FieldAccess { class_id, .. }
            | RequestKind::FieldModification { class_id, .. } => Some(*class_id),
            RequestKind::Exception { class_id, .. } => *class_id,
        }
    }
}

/// A fully described request, ready to hand to the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub kind: RequestKind,
    pub suspend_policy: SuspendPolicy,
    pub thread: Option<ThreadId>,
}

impl RequestSpec {
    pub fn new(kind: RequestKind, suspend_policy: SuspendPolicy) -> Self {
        Self {
            kind,
            suspend_policy,
            thread: None,
        }
    }
}
