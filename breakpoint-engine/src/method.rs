// Method breakpoints
//
// Entry/exit requests scoped to the declaring class. Overrides in subclasses get
// their own requests unless the method cannot be overridden.

use crate::breakpoint::{CategoryBehavior, WaitTarget};
use crate::category::Category;
use crate::error::{EngineError, EngineResult};
use crate::eventrequest::RequestKind;
use crate::events::EventKind;
use crate::runtime::Runtime;
use crate::source::SourceIndex;
use crate::types::{Frame, MethodInfo, SourcePosition, TypeInfo};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodBreakpoint {
    #[serde(default)]
    pub position: Option<SourcePosition>,
    pub class_name: String,
    pub method_name: String,
    /// JVM descriptor, e.g. `(I)V`; `None` matches every overload
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default = "default_true")]
    pub watch_entry: bool,
    #[serde(default)]
    pub watch_exit: bool,
}

impl MethodBreakpoint {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            position: None,
            class_name: class_name.into(),
            method_name: method_name.into(),
            signature: None,
            watch_entry: true,
            watch_exit: false,
        }
    }

    fn is_target(&self, method: &MethodInfo) -> bool {
        method.name == self.method_name
            && self
                .signature
                .as_ref()
                .map_or(true, |sig| *sig == method.signature)
    }

    /// Whether the declared method can be overridden by `sub`
    fn propagates_to(&self, runtime: &dyn Runtime, sub: &TypeInfo) -> EngineResult<bool> {
        for declaring in runtime.classes_by_name(&self.class_name) {
            if declaring.is_final() {
                return Ok(false);
            }
            let methods = runtime.methods(&declaring)?;
            if let Some(method) = methods.iter().find(|m| self.is_target(m)) {
                let closed = method.is_private() || method.is_final() || method.is_static();
                if closed {
                    debug!(
                        "{}.{} is not overridable, skipping {}",
                        self.class_name, self.method_name, sub.name
                    );
                }
                return Ok(!closed);
            }
        }
        Ok(false)
    }
}

/// Entry/exit requests for one type, dropping kinds the runtime cannot install
pub(crate) fn entry_exit_requests(
    runtime: &dyn Runtime,
    ty: &TypeInfo,
    method: Option<&MethodInfo>,
    watch_entry: bool,
    watch_exit: bool,
) -> EngineResult<Vec<RequestKind>> {
    let method_id = method.map(|m| m.method_id);
    let mut requests = Vec::new();
    if watch_entry {
        requests.push(RequestKind::MethodEntry {
            class_id: ty.type_id,
            method_id,
        });
    }
    if watch_exit {
        if runtime.capabilities().can_request_method_exit {
            requests.push(RequestKind::MethodExit {
                class_id: ty.type_id,
                method_id,
            });
        } else {
            warn!("Target cannot report method exit, skipping exit watch in {}", ty.name);
        }
    }
    if requests.is_empty() && (watch_entry || watch_exit) {
        return Err(EngineError::RequestRegistration(format!(
            "no supported method watch for {}",
            ty.name
        )));
    }
    Ok(requests)
}

impl CategoryBehavior for MethodBreakpoint {
    fn category(&self) -> Category {
        Category::Method
    }

    fn describe(&self) -> String {
        format!("{}.{}", self.class_name, self.method_name)
    }

    fn wait_targets(&self) -> Result<Vec<WaitTarget>, String> {
        if self.class_name.is_empty() || self.method_name.is_empty() {
            return Err("Method breakpoint has no class or method".to_string());
        }
        Ok(vec![
            WaitTarget::Exact(self.class_name.clone()),
            WaitTarget::SubtypeOf(self.class_name.clone()),
        ])
    }

    fn create_requests(
        &self,
        runtime: &dyn Runtime,
        ty: &TypeInfo,
        target: &WaitTarget,
    ) -> EngineResult<Vec<RequestKind>> {
        let methods = runtime.methods(ty)?;
        let method = methods.iter().find(|m| self.is_target(m));

        match target {
            WaitTarget::SubtypeOf(_) => {
                let Some(method) = method else {
                    // inherits the declaring implementation
                    return Ok(Vec::new());
                };
                if !self.propagates_to(runtime, ty)? {
                    return Ok(Vec::new());
                }
                entry_exit_requests(runtime, ty, Some(method), self.watch_entry, self.watch_exit)
            }
            _ => {
                let method = method.ok_or_else(|| EngineError::MissingMember {
                    member_kind: "method",
                    member: self.method_name.clone(),
                    type_name: ty.name.clone(),
                })?;
                entry_exit_requests(runtime, ty, Some(method), self.watch_entry, self.watch_exit)
            }
        }
    }

    fn matches_event(&self, event: &EventKind, top: &Frame) -> bool {
        match event {
            EventKind::MethodEntry { .. } | EventKind::MethodExit { .. } => {
                top.method_name == self.method_name
                    && self
                        .signature
                        .as_ref()
                        .map_or(true, |sig| *sig == top.method_signature)
            }
            _ => true,
        }
    }

    fn position(&self) -> Option<&SourcePosition> {
        self.position.as_ref()
    }

    fn reload(&mut self, index: &dyn SourceIndex) -> Result<(), String> {
        let Some(position) = &self.position else {
            return Ok(());
        };
        let resolved = index
            .resolve(position)
            .ok_or_else(|| format!("No method found at {}", position))?;
        let method_name = resolved
            .method_name
            .ok_or_else(|| format!("No method found at {}", position))?;
        self.class_name = resolved.class_name;
        self.method_name = method_name;
        self.signature = resolved.method_signature;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRuntime;
    use crate::types::{ACC_FINAL, ACC_PRIVATE};

    #[test]
    fn test_entry_request_for_declaring_type() {
        let mut runtime = MockRuntime::new();
        let ty = runtime.load_class("pkg.Service");
        runtime.add_method(&ty, "handle", "()V", 0);

        let bp = MethodBreakpoint::new("pkg.Service", "handle");
        let requests = bp
            .create_requests(&runtime, &ty, &WaitTarget::Exact("pkg.Service".to_string()))
            .unwrap();
        assert_eq!(requests.len(), 1);
        assert!(matches!(requests[0], RequestKind::MethodEntry { .. }));
    }

    #[test]
    fn test_missing_method_is_reported() {
        let mut runtime = MockRuntime::new();
        let ty = runtime.load_class("pkg.Service");

        let bp = MethodBreakpoint::new("pkg.Service", "handle");
        let err = bp
            .create_requests(&runtime, &ty, &WaitTarget::Exact("pkg.Service".to_string()))
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingMember { member_kind: "method", .. }));
    }

    #[test]
    fn test_entry_and_exit_pair() {
        let mut runtime = MockRuntime::new();
        let ty = runtime.load_class("pkg.Service");
        runtime.add_method(&ty, "handle", "()V", 0);

        let mut bp = MethodBreakpoint::new("pkg.Service", "handle");
        bp.watch_exit = true;
        let requests = bp
            .create_requests(&runtime, &ty, &WaitTarget::Exact("pkg.Service".to_string()))
            .unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[test]
    fn test_exit_only_without_capability_fails_registration() {
        let mut runtime = MockRuntime::new();
        runtime.capabilities.can_request_method_exit = false;
        let ty = runtime.load_class("pkg.Service");
        runtime.add_method(&ty, "handle", "()V", 0);

        let mut bp = MethodBreakpoint::new("pkg.Service", "handle");
        bp.watch_entry = false;
        bp.watch_exit = true;
        let err = bp
            .create_requests(&runtime, &ty, &WaitTarget::Exact("pkg.Service".to_string()))
            .unwrap_err();
        assert!(matches!(err, EngineError::RequestRegistration(_)));
    }

    #[test]
    fn test_overrides_propagate_unless_closed() {
        let mut runtime = MockRuntime::new();
        let base = runtime.load_class("pkg.Base");
        runtime.add_method(&base, "open", "()V", 0);
        runtime.add_method(&base, "hidden", "()V", ACC_PRIVATE);
        runtime.add_method(&base, "sealed", "()V", ACC_FINAL);
        let sub = runtime.load_subclass("pkg.Sub", &["pkg.Base"]);
        runtime.add_method(&sub, "open", "()V", 0);
        runtime.add_method(&sub, "hidden", "()V", 0);
        runtime.add_method(&sub, "sealed", "()V", 0);

        let target = WaitTarget::SubtypeOf("pkg.Base".to_string());
        let open = MethodBreakpoint::new("pkg.Base", "open");
        assert_eq!(open.create_requests(&runtime, &sub, &target).unwrap().len(), 1);

        let hidden = MethodBreakpoint::new("pkg.Base", "hidden");
        assert!(hidden.create_requests(&runtime, &sub, &target).unwrap().is_empty());

        let sealed = MethodBreakpoint::new("pkg.Base", "sealed");
        assert!(sealed.create_requests(&runtime, &sub, &target).unwrap().is_empty());
    }

    #[test]
    fn test_subclass_without_override_gets_nothing() {
        let mut runtime = MockRuntime::new();
        let base = runtime.load_class("pkg.Base");
        runtime.add_method(&base, "open", "()V", 0);
        let sub = runtime.load_subclass("pkg.Sub", &["pkg.Base"]);

        let bp = MethodBreakpoint::new("pkg.Base", "open");
        let target = WaitTarget::SubtypeOf("pkg.Base".to_string());
        assert!(bp.create_requests(&runtime, &sub, &target).unwrap().is_empty());
    }
}
