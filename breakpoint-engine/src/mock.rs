// In-memory collaborators
//
// Deterministic stand-ins for the runtime, the expression evaluator and the
// source index. Every runtime call is recorded so ordering can be asserted.

use crate::error::{EvaluationError, RuntimeError, RuntimeResult};
use crate::evaluator::{CompiledExpression, EvaluationContext, ExpressionEvaluator};
use crate::eventrequest::{RequestKind, RequestSpec};
use crate::runtime::{Capabilities, Runtime};
use crate::source::{ResolvedPosition, SourceIndex};
use crate::types::*;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A request as the mock runtime holds it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRequest {
    pub spec: RequestSpec,
    pub enabled: bool,
}

/// Mutating runtime calls, in the order they were made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeCall {
    Create(RequestId),
    Enable(RequestId, bool),
    SetThread(RequestId, Option<ThreadId>),
    Delete(RequestId),
    SuspendThread(ThreadId),
    ResumeThread(ThreadId),
    SuspendAll,
    ResumeAll,
}

#[derive(Debug)]
pub struct MockRuntime {
    pub capabilities: Capabilities,
    pub requests: BTreeMap<RequestId, MockRequest>,
    pub calls: Vec<RuntimeCall>,
    /// Requests whose thread restriction the target refuses to change
    pub reject_thread_filter: HashSet<RequestId>,
    attached: bool,
    next_type_id: ReferenceTypeId,
    next_member_id: u64,
    next_request_id: i32,
    classes: Vec<TypeInfo>,
    methods: HashMap<ReferenceTypeId, Vec<MethodInfo>>,
    fields: HashMap<ReferenceTypeId, Vec<FieldInfo>>,
    lines: HashMap<(ReferenceTypeId, u32), Vec<Location>>,
    frames: HashMap<ThreadId, Vec<Frame>>,
    object_types: HashMap<ObjectId, String>,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRuntime {
    pub fn new() -> Self {
        Self {
            capabilities: Capabilities::default(),
            requests: BTreeMap::new(),
            calls: Vec::new(),
            reject_thread_filter: HashSet::new(),
            attached: true,
            next_type_id: 1,
            next_member_id: 1,
            next_request_id: 1,
            classes: Vec::new(),
            methods: HashMap::new(),
            fields: HashMap::new(),
            lines: HashMap::new(),
            frames: HashMap::new(),
            object_types: HashMap::new(),
        }
    }

    /// Register a loaded class and return its descriptor (for class-prepare events)
    pub fn define_class(&mut self, name: &str, supertypes: &[&str], mod_bits: i32) -> TypeInfo {
        let ty = TypeInfo {
            type_id: self.next_type_id,
            name: name.to_string(),
            supertypes: supertypes.iter().map(|s| s.to_string()).collect(),
            mod_bits,
        };
        self.next_type_id += 1;
        self.classes.push(ty.clone());
        ty
    }

    pub fn load_class(&mut self, name: &str) -> TypeInfo {
        self.define_class(name, &["java.lang.Object"], 0)
    }

    pub fn load_subclass(&mut self, name: &str, supertypes: &[&str]) -> TypeInfo {
        self.define_class(name, supertypes, 0)
    }

    /// Give `line` of `ty` `count` code locations
    pub fn add_line(&mut self, ty: &TypeInfo, line: u32, count: usize) {
        let method_id = self.next_member_id;
        self.next_member_id += 1;
        let locations = (0..count)
            .map(|i| Location {
                class_id: ty.type_id,
                method_id,
                index: i as u64 * 4,
                line: Some(line),
            })
            .collect();
        self.lines.insert((ty.type_id, line), locations);
    }

    pub fn add_method(&mut self, ty: &TypeInfo, name: &str, signature: &str, mod_bits: i32) -> MethodInfo {
        let method = MethodInfo {
            method_id: self.next_member_id,
            name: name.to_string(),
            signature: signature.to_string(),
            mod_bits,
        };
        self.next_member_id += 1;
        self.methods.entry(ty.type_id).or_default().push(method.clone());
        method
    }

    pub fn add_field(&mut self, ty: &TypeInfo, name: &str, signature: &str, mod_bits: i32) -> FieldInfo {
        let field = FieldInfo {
            field_id: self.next_member_id,
            name: name.to_string(),
            signature: signature.to_string(),
            mod_bits,
        };
        self.next_member_id += 1;
        self.fields.entry(ty.type_id).or_default().push(field.clone());
        field
    }

    pub fn set_frames(&mut self, thread: ThreadId, frames: Vec<Frame>) {
        self.frames.insert(thread, frames);
    }

    pub fn set_object_type(&mut self, object: ObjectId, type_name: &str) {
        self.object_types.insert(object, type_name.to_string());
    }

    /// Simulate the target going away
    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn reattach(&mut self) {
        self.attached = true;
        self.requests.clear();
    }

    /// Requests currently installed whose spec is bound to `class_id`
    pub fn requests_for_class(&self, class_id: ReferenceTypeId) -> Vec<RequestId> {
        self.requests
            .iter()
            .filter(|(_, r)| r.spec.kind.class_id() == Some(class_id))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn check_attached(&self) -> RuntimeResult<()> {
        if self.attached {
            Ok(())
        } else {
            Err(RuntimeError::Disconnected)
        }
    }

    fn check_type(&self, ty: &TypeInfo) -> RuntimeResult<()> {
        self.check_attached()?;
        if self.classes.iter().any(|c| c.type_id == ty.type_id) {
            Ok(())
        } else {
            Err(RuntimeError::InvalidType(ty.type_id))
        }
    }

    fn request_mut(&mut self, request: RequestId) -> RuntimeResult<&mut MockRequest> {
        self.requests
            .get_mut(&request)
            .ok_or(RuntimeError::UnknownRequest(request))
    }
}

impl Runtime for MockRuntime {
    fn is_attached(&self) -> bool {
        self.attached
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn classes_by_name(&self, name: &str) -> Vec<TypeInfo> {
        self.classes.iter().filter(|c| c.name == name).cloned().collect()
    }

    fn all_classes(&self) -> Vec<TypeInfo> {
        self.classes.clone()
    }

    fn methods(&self, ty: &TypeInfo) -> RuntimeResult<Vec<MethodInfo>> {
        self.check_type(ty)?;
        Ok(self.methods.get(&ty.type_id).cloned().unwrap_or_default())
    }

    fn fields(&self, ty: &TypeInfo) -> RuntimeResult<Vec<FieldInfo>> {
        self.check_type(ty)?;
        Ok(self.fields.get(&ty.type_id).cloned().unwrap_or_default())
    }

    fn line_locations(&self, ty: &TypeInfo, line: u32) -> RuntimeResult<Vec<Location>> {
        self.check_type(ty)?;
        Ok(self.lines.get(&(ty.type_id, line)).cloned().unwrap_or_default())
    }

    fn frames(&self, thread: ThreadId) -> RuntimeResult<Vec<Frame>> {
        self.check_attached()?;
        self.frames
            .get(&thread)
            .cloned()
            .ok_or_else(|| RuntimeError::Other(format!("no frames for thread {}", thread)))
    }

    fn object_type_name(&self, object: ObjectId) -> RuntimeResult<String> {
        self.check_attached()?;
        self.object_types
            .get(&object)
            .cloned()
            .ok_or_else(|| RuntimeError::Other(format!("unknown object {}", object)))
    }

    fn create_request(&mut self, spec: &RequestSpec) -> RuntimeResult<RequestId> {
        self.check_attached()?;
        let caps = self.capabilities;
        match spec.kind {
            RequestKind::MethodExit { .. } if !caps.can_request_method_exit => {
                return Err(RuntimeError::NotSupported("method exit"));
            }
            RequestKind::FieldAccess { .. } if !caps.can_watch_field_access => {
                return Err(RuntimeError::NotSupported("field access"));
            }
            RequestKind::FieldModification { .. } if !caps.can_watch_field_modification => {
                return Err(RuntimeError::NotSupported("field modification"));
            }
            _ => {}
        }
        let id = RequestId(self.next_request_id);
        self.next_request_id += 1;
        self.requests.insert(
            id,
            MockRequest {
                spec: spec.clone(),
                enabled: true,
            },
        );
        self.calls.push(RuntimeCall::Create(id));
        Ok(id)
    }

    fn set_request_enabled(&mut self, request: RequestId, enabled: bool) -> RuntimeResult<()> {
        self.check_attached()?;
        self.request_mut(request)?.enabled = enabled;
        self.calls.push(RuntimeCall::Enable(request, enabled));
        Ok(())
    }

    fn set_request_thread(&mut self, request: RequestId, thread: Option<ThreadId>) -> RuntimeResult<()> {
        self.check_attached()?;
        if self.reject_thread_filter.contains(&request) {
            return Err(RuntimeError::Other(format!(
                "request {} cannot be restricted to a thread",
                request
            )));
        }
        let entry = self.request_mut(request)?;
        if entry.enabled {
            return Err(RuntimeError::Other(format!(
                "request {} must be disabled before changing its thread",
                request
            )));
        }
        entry.spec.thread = thread;
        self.calls.push(RuntimeCall::SetThread(request, thread));
        Ok(())
    }

    fn delete_request(&mut self, request: RequestId) -> RuntimeResult<()> {
        self.check_attached()?;
        self.requests
            .remove(&request)
            .ok_or(RuntimeError::UnknownRequest(request))?;
        self.calls.push(RuntimeCall::Delete(request));
        Ok(())
    }

    fn suspend_thread(&mut self, thread: ThreadId) -> RuntimeResult<()> {
        self.check_attached()?;
        self.calls.push(RuntimeCall::SuspendThread(thread));
        Ok(())
    }

    fn resume_thread(&mut self, thread: ThreadId) -> RuntimeResult<()> {
        self.check_attached()?;
        self.calls.push(RuntimeCall::ResumeThread(thread));
        Ok(())
    }

    fn suspend_all(&mut self) -> RuntimeResult<()> {
        self.check_attached()?;
        self.calls.push(RuntimeCall::SuspendAll);
        Ok(())
    }

    fn resume_all(&mut self) -> RuntimeResult<()> {
        self.check_attached()?;
        self.calls.push(RuntimeCall::ResumeAll);
        Ok(())
    }
}

/// Build a frame for `declaring_type.method_name` at `line`
pub fn frame(declaring_type: &str, method_name: &str, line: u32) -> Frame {
    Frame {
        frame_id: u64::from(line),
        location: Location {
            class_id: 0,
            method_id: 0,
            index: 0,
            line: Some(line),
        },
        declaring_type: declaring_type.to_string(),
        method_name: method_name.to_string(),
        method_signature: "()V".to_string(),
        source_file: declaring_type
            .rsplit('.')
            .next()
            .map(|name| format!("{}.java", name.split('$').next().unwrap_or(name))),
        this_object: None,
    }
}

/// Scripted outcome of an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Scripted {
    Value(Value),
    Fail(String),
    Disconnect,
}

impl Scripted {
    fn into_result(self) -> Result<Value, EvaluationError> {
        match self {
            Scripted::Value(value) => Ok(value),
            Scripted::Fail(message) => Err(EvaluationError::failed(message)),
            Scripted::Disconnect => Err(EvaluationError::Disconnected),
        }
    }
}

#[derive(Debug, Default)]
struct EvaluatorState {
    // the last entry of a queue is sticky
    results: HashMap<String, VecDeque<Scripted>>,
    uncompilable: HashSet<String>,
    evaluations: Vec<String>,
}

/// Expression evaluator returning scripted values. Clones share their script,
/// so a test can keep a handle after giving one to the engine.
#[derive(Debug, Clone, Default)]
pub struct MockEvaluator {
    state: Arc<Mutex<EvaluatorState>>,
    compiles: Arc<AtomicUsize>,
}

impl MockEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut EvaluatorState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    /// Every evaluation of `expression` yields `result`
    pub fn set_result(&self, expression: &str, result: Scripted) {
        self.with_state(|s| {
            s.results
                .insert(expression.to_string(), VecDeque::from([result]));
        });
    }

    /// Successive evaluations yield `results` in order, then repeat the last one
    pub fn set_sequence(&self, expression: &str, results: Vec<Scripted>) {
        self.with_state(|s| {
            s.results
                .insert(expression.to_string(), results.into_iter().collect());
        });
    }

    pub fn set_value(&self, expression: &str, value: Value) {
        self.set_result(expression, Scripted::Value(value));
    }

    pub fn fail_compile(&self, expression: &str) {
        self.with_state(|s| {
            s.uncompilable.insert(expression.to_string());
        });
    }

    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    /// Expressions evaluated so far, in order
    pub fn evaluations(&self) -> Vec<String> {
        self.with_state(|s| s.evaluations.clone())
    }
}

impl ExpressionEvaluator for MockEvaluator {
    fn compile(
        &self,
        expression: &str,
        _frame: &Frame,
        _position: Option<&SourcePosition>,
    ) -> Result<Arc<dyn CompiledExpression>, EvaluationError> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        if self.with_state(|s| s.uncompilable.contains(expression)) {
            return Err(EvaluationError::failed(format!(
                "Cannot compile '{}'",
                expression
            )));
        }
        Ok(Arc::new(MockCompiled {
            expression: expression.to_string(),
            evaluator: self.clone(),
        }))
    }
}

struct MockCompiled {
    expression: String,
    evaluator: MockEvaluator,
}

impl CompiledExpression for MockCompiled {
    fn evaluate(&self, _context: &EvaluationContext) -> Result<Value, EvaluationError> {
        let scripted = self.evaluator.with_state(|s| {
            s.evaluations.push(self.expression.clone());
            let queue = s.results.get_mut(&self.expression)?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        });
        match scripted {
            Some(scripted) => scripted.into_result(),
            None => Err(EvaluationError::failed(format!(
                "Cannot evaluate '{}'",
                self.expression
            ))),
        }
    }
}

/// Source index backed by a map
#[derive(Debug, Clone, Default)]
pub struct MockSourceIndex {
    positions: HashMap<SourcePosition, ResolvedPosition>,
}

impl MockSourceIndex {
    pub fn insert(&mut self, position: SourcePosition, resolved: ResolvedPosition) {
        self.positions.insert(position, resolved);
    }

    pub fn remove(&mut self, position: &SourcePosition) {
        self.positions.remove(position);
    }
}

impl SourceIndex for MockSourceIndex {
    fn resolve(&self, position: &SourcePosition) -> Option<ResolvedPosition> {
        self.positions.get(position).cloned()
    }
}
