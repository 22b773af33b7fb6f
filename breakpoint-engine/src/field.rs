// Field watchpoints
//
// Access and modification watches on one field. Subclasses that redeclare the
// field are watched too, unless the declared field is private or final.

use crate::breakpoint::{CategoryBehavior, WaitTarget};
use crate::category::Category;
use crate::error::{EngineError, EngineResult, RuntimeResult};
use crate::eventrequest::RequestKind;
use crate::events::EventKind;
use crate::runtime::Runtime;
use crate::source::SourceIndex;
use crate::types::{FieldInfo, Frame, SourcePosition, TypeInfo};
use serde::{Deserialize, Serialize};
use tracing::warn;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldBreakpoint {
    #[serde(default)]
    pub position: Option<SourcePosition>,
    pub class_name: String,
    pub field_name: String,
    #[serde(default)]
    pub watch_access: bool,
    #[serde(default = "default_true")]
    pub watch_modification: bool,
}

impl FieldBreakpoint {
    pub fn new(class_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            position: None,
            class_name: class_name.into(),
            field_name: field_name.into(),
            watch_access: false,
            watch_modification: true,
        }
    }

    fn find_field(&self, runtime: &dyn Runtime, ty: &TypeInfo) -> RuntimeResult<Option<FieldInfo>> {
        Ok(runtime
            .fields(ty)?
            .into_iter()
            .find(|f| f.name == self.field_name))
    }

    fn propagates(&self, runtime: &dyn Runtime) -> EngineResult<bool> {
        for declaring in runtime.classes_by_name(&self.class_name) {
            if declaring.is_final() {
                return Ok(false);
            }
            if let Some(field) = self.find_field(runtime, &declaring)? {
                return Ok(!field.is_private() && !field.is_final());
            }
        }
        Ok(false)
    }

    fn watches(&self, runtime: &dyn Runtime, ty: &TypeInfo, field: &FieldInfo) -> EngineResult<Vec<RequestKind>> {
        let caps = runtime.capabilities();
        let mut requests = Vec::new();
        if self.watch_access {
            if caps.can_watch_field_access {
                requests.push(RequestKind::FieldAccess {
                    class_id: ty.type_id,
                    field_id: field.field_id,
                });
            } else {
                warn!("Target cannot watch field access, skipping {}.{}", ty.name, field.name);
            }
        }
        if self.watch_modification {
            if caps.can_watch_field_modification {
                requests.push(RequestKind::FieldModification {
                    class_id: ty.type_id,
                    field_id: field.field_id,
                });
            } else {
                warn!(
                    "Target cannot watch field modification, skipping {}.{}",
                    ty.name, field.name
                );
            }
        }
        if requests.is_empty() && (self.watch_access || self.watch_modification) {
            return Err(EngineError::RequestRegistration(format!(
                "no supported field watch for {}.{}",
                ty.name, field.name
            )));
        }
        Ok(requests)
    }
}

impl CategoryBehavior for FieldBreakpoint {
    fn category(&self) -> Category {
        Category::Field
    }

    fn describe(&self) -> String {
        format!("{}.{}", self.class_name, self.field_name)
    }

    fn wait_targets(&self) -> Result<Vec<WaitTarget>, String> {
        if self.class_name.is_empty() || self.field_name.is_empty() {
            return Err("Field watchpoint has no class or field".to_string());
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
        let field = self.find_field(runtime, ty)?;
        match target {
            WaitTarget::SubtypeOf(_) => match field {
                Some(field) if self.propagates(runtime)? => self.watches(runtime, ty, &field),
                _ => Ok(Vec::new()),
            },
            _ => {
                let field = field.ok_or_else(|| EngineError::MissingMember {
                    member_kind: "field",
                    member: self.field_name.clone(),
                    type_name: ty.name.clone(),
                })?;
                self.watches(runtime, ty, &field)
            }
        }
    }

    fn event_class(&self, event: &EventKind, _top: &Frame, runtime: &dyn Runtime) -> RuntimeResult<String> {
        match event.field_object() {
            Some(object) => runtime.object_type_name(object),
            // static field
            None => Ok(self.class_name.clone()),
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
            .ok_or_else(|| format!("No field found at {}", position))?;
        let field_name = resolved
            .field_name
            .ok_or_else(|| format!("No field found at {}", position))?;
        self.class_name = resolved.class_name;
        self.field_name = field_name;
        Ok(())
    }
}
