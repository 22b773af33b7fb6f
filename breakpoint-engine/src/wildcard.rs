// Wildcard method breakpoints
//
// A class glob plus a method glob. The class wait never resolves, every
// prepared class is tested for the lifetime of the breakpoint.

use crate::breakpoint::{CategoryBehavior, WaitTarget};
use crate::category::Category;
use crate::error::EngineResult;
use crate::eventrequest::RequestKind;
use crate::events::EventKind;
use crate::filter::ClassFilter;
use crate::method::entry_exit_requests;
use crate::runtime::Runtime;
use crate::types::{Frame, TypeInfo};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WildcardMethodBreakpoint {
    pub class_pattern: ClassFilter,
    pub method_pattern: ClassFilter,
    #[serde(default = "default_true")]
    pub watch_entry: bool,
    #[serde(default)]
    pub watch_exit: bool,
}

impl WildcardMethodBreakpoint {
    pub fn new(class_pattern: &str, method_pattern: &str) -> Self {
        Self {
            class_pattern: ClassFilter::new(class_pattern),
            method_pattern: ClassFilter::new(method_pattern),
            watch_entry: true,
            watch_exit: false,
        }
    }
}

impl CategoryBehavior for WildcardMethodBreakpoint {
    fn category(&self) -> Category {
        Category::WildcardMethod
    }

    fn describe(&self) -> String {
        format!("{}.{}", self.class_pattern.pattern, self.method_pattern.pattern)
    }

    fn wait_targets(&self) -> Result<Vec<WaitTarget>, String> {
        if self.class_pattern.pattern.is_empty() {
            return Err("Wildcard method breakpoint has no class pattern".to_string());
        }
        Ok(vec![WaitTarget::Pattern(self.class_pattern.clone())])
    }

    fn create_requests(
        &self,
        runtime: &dyn Runtime,
        ty: &TypeInfo,
        _target: &WaitTarget,
    ) -> EngineResult<Vec<RequestKind>> {
        let declares_match = runtime
            .methods(ty)?
            .iter()
            .any(|m| self.method_pattern.matches(&m.name));
        if !declares_match {
            return Ok(Vec::new());
        }
        entry_exit_requests(runtime, ty, None, self.watch_entry, self.watch_exit)
    }

    fn matches_event(&self, event: &EventKind, top: &Frame) -> bool {
        match event {
            EventKind::MethodEntry { .. } | EventKind::MethodExit { .. } => {
                self.method_pattern.matches(&top.method_name)
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;
    use crate::mock::MockRuntime;

    #[test]
    fn test_only_types_declaring_a_match_get_requests() {
        let mut runtime = MockRuntime::new();
        let with = runtime.load_class("com.app.UserService");
        runtime.add_method(&with, "getName", "()Ljava/lang/String;", 0);
        let without = runtime.load_class("com.app.Util");
        runtime.add_method(&without, "format", "()V", 0);

        let bp = WildcardMethodBreakpoint::new("com.app.*", "get*");
        let target = bp.wait_targets().unwrap().remove(0);
        assert!(!target.is_terminal());
        assert_eq!(bp.create_requests(&runtime, &with, &target).unwrap().len(), 1);
        assert!(bp.create_requests(&runtime, &without, &target).unwrap().is_empty());
    }

    #[test]
    fn test_entry_events_filtered_by_method_name() {
        let bp = WildcardMethodBreakpoint::new("com.app.*", "get*");
        let location = Location {
            class_id: 1,
            method_id: 1,
            index: 0,
            line: None,
        };
        let mut frame = Frame {
            frame_id: 1,
            location: location.clone(),
            declaring_type: "com.app.UserService".to_string(),
            method_name: "getName".to_string(),
            method_signature: "()Ljava/lang/String;".to_string(),
            source_file: None,
            this_object: Some(1),
        };
        let event = EventKind::MethodEntry {
            thread: 1,
            location,
        };
        assert!(bp.matches_event(&event, &frame));
        frame.method_name = "setName".to_string();
        assert!(!bp.matches_event(&event, &frame));
    }
}
