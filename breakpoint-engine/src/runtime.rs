// Runtime collaborator
//
// The debuggee side of the engine: type enumeration, request registration,
// thread and frame inspection, suspend/resume. Implemented by the wire client
// in production and by `MockRuntime` in tests.

use crate::error::RuntimeResult;
use crate::eventrequest::RequestSpec;
use crate::types::{
    FieldInfo, Frame, Location, MethodInfo, ObjectId, RequestId, ThreadId, TypeInfo,
};
use serde::{Deserialize, Serialize};

/// Optional request kinds a target may or may not support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_watch_field_access: bool,
    pub can_watch_field_modification: bool,
    pub can_request_method_exit: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            can_watch_field_access: true,
            can_watch_field_modification: true,
            can_request_method_exit: true,
        }
    }
}

pub trait Runtime: Send {
    fn is_attached(&self) -> bool;

    fn capabilities(&self) -> Capabilities;

    /// Loaded types with exactly this name (several class loaders may define it)
    fn classes_by_name(&self, name: &str) -> Vec<TypeInfo>;

    /// Every loaded type
    fn all_classes(&self) -> Vec<TypeInfo>;

    fn methods(&self, ty: &TypeInfo) -> RuntimeResult<Vec<MethodInfo>>;

    fn fields(&self, ty: &TypeInfo) -> RuntimeResult<Vec<FieldInfo>>;

    /// Code locations of `line` inside `ty` (empty if the line has no code there)
    fn line_locations(&self, ty: &TypeInfo, line: u32) -> RuntimeResult<Vec<Location>>;

    /// Frames of a suspended thread, top first
    fn frames(&self, thread: ThreadId) -> RuntimeResult<Vec<Frame>>;

    /// Runtime type name of an object
    fn object_type_name(&self, object: ObjectId) -> RuntimeResult<String>;

    fn create_request(&mut self, spec: &RequestSpec) -> RuntimeResult<RequestId>;

    fn set_request_enabled(&mut self, request: RequestId, enabled: bool) -> RuntimeResult<()>;

    /// Restrict (or un-restrict) a disabled request to one thread
    fn set_request_thread(&mut self, request: RequestId, thread: Option<ThreadId>)
        -> RuntimeResult<()>;

    fn delete_request(&mut self, request: RequestId) -> RuntimeResult<()>;

    fn suspend_thread(&mut self, thread: ThreadId) -> RuntimeResult<()>;

    fn resume_thread(&mut self, thread: ThreadId) -> RuntimeResult<()>;

    fn suspend_all(&mut self) -> RuntimeResult<()>;

    fn resume_all(&mut self) -> RuntimeResult<()>;
}
