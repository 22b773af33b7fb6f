// Runtime events
//
// Events are sent from the runtime to notify about class loading, request hits
// and disconnection. Several events can arrive together in one set.

use crate::eventrequest::SuspendPolicy;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Composite event packet (can contain multiple events)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSet {
    pub suspend_policy: SuspendPolicy,
    pub events: Vec<Event>,
}

impl EventSet {
    pub fn new(suspend_policy: SuspendPolicy, events: Vec<Event>) -> Self {
        Self {
            suspend_policy,
            events,
        }
    }

    pub fn single(suspend_policy: SuspendPolicy, event: Event) -> Self {
        Self::new(suspend_policy, vec![event])
    }

    /// Thread the runtime suspended for this set (first event's thread)
    pub fn thread(&self) -> Option<ThreadId> {
        self.events.iter().find_map(|e| e.kind.thread())
    }
}

/// Single event within an event set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Request that produced the event; `None` for unsolicited events
    pub request_id: Option<RequestId>,
    pub kind: EventKind,
}

impl Event {
    pub fn new(request_id: RequestId, kind: EventKind) -> Self {
        Self {
            request_id: Some(request_id),
            kind,
        }
    }

    pub fn unsolicited(kind: EventKind) -> Self {
        Self {
            request_id: None,
            kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    VMDeath,
    VMDisconnected,
    ClassPrepare {
        thread: ThreadId,
        ref_type: TypeInfo,
    },
    Breakpoint {
        thread: ThreadId,
        location: Location,
    },
    MethodEntry {
        thread: ThreadId,
        location: Location,
    },
    MethodExit {
        thread: ThreadId,
        location: Location,
        return_value: Option<Value>,
    },
    FieldAccess {
        thread: ThreadId,
        location: Location,
        field: String,
        object: Option<ObjectId>,
    },
    FieldModification {
        thread: ThreadId,
        location: Location,
        field: String,
        object: Option<ObjectId>,
        new_value: Value,
    },
    Exception {
        thread: ThreadId,
        location: Location,
        exception: ObjectId,
        exception_type: String,
        catch_location: Option<Location>,
    },
}

impl EventKind {
    pub fn thread(&self) -> Option<ThreadId> {
        match self {
            EventKind::VMDeath | EventKind::VMDisconnected => None,
            EventKind::ClassPrepare { thread, .. }
            | EventKind::Breakpoint { thread, .. }
            | EventKind::MethodEntry { thread, .. }
            | EventKind::MethodExit { thread, .. }
            | EventKind::FieldAccess { thread, .. }
            | EventKind::FieldModification { thread, .. }
            | EventKind::Exception { thread, .. } => Some(*thread),
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            EventKind::Breakpoint { location, .. }
            | EventKind::MethodEntry { location, .. }
            | EventKind::MethodExit { location, .. }
            | EventKind::FieldAccess { location, .. }
            | EventKind::FieldModification { location, .. }
            | EventKind::Exception { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Object whose field was touched, for watchpoint events
    pub fn field_object(&self) -> Option<ObjectId> {
        match self {
            EventKind::FieldAccess { object, .. } | EventKind::FieldModification { object, .. } => {
                *object
            }
            _ => None,
        }
    }
}

/// A request hit, as handed to the filter chain
#[derive(Debug, Clone)]
pub struct Hit {
    pub request: RequestId,
    pub thread: ThreadId,
    pub kind: EventKind,
}

impl Hit {
    /// Build a hit from an event; `None` for events that are not request hits
    pub fn from_event(event: &Event) -> Option<Self> {
        let request = event.request_id?;
        let thread = event.kind.thread()?;
        event.kind.location()?;
        Some(Self {
            request,
            thread,
            kind: event.kind.clone(),
        })
    }

    pub fn location(&self) -> Option<&Location> {
        self.kind.location()
    }
}
