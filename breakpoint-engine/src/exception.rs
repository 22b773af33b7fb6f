// Exception breakpoints
//
// One exception request per exception class, or a single untyped request
// that catches every throwable.

use crate::breakpoint::{CategoryBehavior, WaitTarget};
use crate::category::Category;
use crate::error::{EngineResult, RuntimeResult};
use crate::eventrequest::RequestKind;
use crate::events::EventKind;
use crate::runtime::Runtime;
use crate::types::{Frame, TypeInfo};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionBreakpoint {
    pub class_name: String,
    #[serde(default = "default_true")]
    pub notify_caught: bool,
    #[serde(default = "default_true")]
    pub notify_uncaught: bool,
}

impl ExceptionBreakpoint {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            notify_caught: true,
            notify_uncaught: true,
        }
    }
}

/// Exception events are filtered by the thrown type, not the throwing frame
fn thrown_type(event: &EventKind, top: &Frame) -> String {
    match event {
        EventKind::Exception { exception_type, .. } => exception_type.clone(),
        _ => top.declaring_type.clone(),
    }
}

impl CategoryBehavior for ExceptionBreakpoint {
    fn category(&self) -> Category {
        Category::Exception
    }

    fn describe(&self) -> String {
        self.class_name.clone()
    }

    fn wait_targets(&self) -> Result<Vec<WaitTarget>, String> {
        if self.class_name.is_empty() {
            return Err("Exception breakpoint has no exception class".to_string());
        }
        Ok(vec![WaitTarget::Exact(self.class_name.clone())])
    }

    fn create_requests(
        &self,
        _runtime: &dyn Runtime,
        ty: &TypeInfo,
        _target: &WaitTarget,
    ) -> EngineResult<Vec<RequestKind>> {
        Ok(vec![RequestKind::Exception {
            class_id: Some(ty.type_id),
            caught: self.notify_caught,
            uncaught: self.notify_uncaught,
        }])
    }

    fn event_class(&self, event: &EventKind, top: &Frame, _runtime: &dyn Runtime) -> RuntimeResult<String> {
        Ok(thrown_type(event, top))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnyExceptionBreakpoint {
    #[serde(default)]
    pub notify_caught: bool,
    #[serde(default = "default_true")]
    pub notify_uncaught: bool,
}

impl Default for AnyExceptionBreakpoint {
    fn default() -> Self {
        Self {
            notify_caught: false,
            notify_uncaught: true,
        }
    }
}

impl CategoryBehavior for AnyExceptionBreakpoint {
    fn category(&self) -> Category {
        Category::AnyException
    }

    fn describe(&self) -> String {
        "Any exception".to_string()
    }

    fn wait_targets(&self) -> Result<Vec<WaitTarget>, String> {
        Ok(Vec::new())
    }

    fn create_requests(
        &self,
        _runtime: &dyn Runtime,
        _ty: &TypeInfo,
        _target: &WaitTarget,
    ) -> EngineResult<Vec<RequestKind>> {
        Ok(Vec::new())
    }

    fn untargeted_requests(&self, _runtime: &dyn Runtime) -> Vec<RequestKind> {
        vec![RequestKind::Exception {
            class_id: None,
            caught: self.notify_caught,
            uncaught: self.notify_uncaught,
        }]
    }

    fn event_class(&self, event: &EventKind, top: &Frame, _runtime: &dyn Runtime) -> RuntimeResult<String> {
        Ok(thrown_type(event, top))
    }
}
