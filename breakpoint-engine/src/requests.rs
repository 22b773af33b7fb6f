// Request manager
//
// Owns every runtime request created for a breakpoint, the deferred waits for
// types that are not loaded yet, and per-request metadata (hit counter and
// compiled expression cache).

use crate::breakpoint::{Breakpoint, WaitTarget};
use crate::category::Category;
use crate::error::{EngineError, EngineResult, EvaluationError, RuntimeError, RuntimeResult};
use crate::evaluator::CompiledExpression;
use crate::eventrequest::{RequestKind, RequestSpec, SuspendPolicy};
use crate::registry::Registry;
use crate::runtime::Runtime;
use crate::types::{BreakpointId, Location, MethodId, ReferenceTypeId, RequestId, ThreadId, TypeInfo};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Compiled expressions are specific to the code location they were compiled at
type EvaluatorKey = (ReferenceTypeId, MethodId, String);

/// Side-table entry for one request
pub struct RequestMeta {
    pub breakpoint: BreakpointId,
    pub spec: RequestSpec,
    pub hits: u64,
    evaluators: HashMap<EvaluatorKey, Arc<dyn CompiledExpression>>,
}

impl RequestMeta {
    fn new(breakpoint: BreakpointId, spec: RequestSpec) -> Self {
        Self {
            breakpoint,
            spec,
            hits: 0,
            evaluators: HashMap::new(),
        }
    }
}

impl fmt::Debug for RequestMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestMeta")
            .field("breakpoint", &self.breakpoint)
            .field("spec", &self.spec)
            .field("hits", &self.hits)
            .field("cached_evaluators", &self.evaluators.len())
            .finish()
    }
}

/// Outcome of creating requests for a breakpoint
#[derive(Debug, Default)]
pub struct Resolution {
    pub created: Vec<RequestId>,
    pub failures: Vec<EngineError>,
}

impl Resolution {
    /// First missing-member failure, which invalidates the breakpoint
    pub fn missing_member(&self) -> Option<&EngineError> {
        self.failures
            .iter()
            .find(|e| matches!(e, EngineError::MissingMember { .. }))
    }
}

/// Policy used when registering a request. Anything short of ALL suspends the
/// event thread so frames can be inspected before deciding.
pub(crate) fn request_policy(policy: SuspendPolicy) -> SuspendPolicy {
    match policy {
        SuspendPolicy::All => SuspendPolicy::All,
        SuspendPolicy::EventThread | SuspendPolicy::None => SuspendPolicy::EventThread,
    }
}

/// The runtime only accepts filter changes on disabled requests
fn apply_thread_filter(
    runtime: &mut dyn Runtime,
    request: RequestId,
    thread: Option<ThreadId>,
) -> RuntimeResult<()> {
    runtime.set_request_enabled(request, false)?;
    runtime.set_request_thread(request, thread)?;
    runtime.set_request_enabled(request, true)
}

#[derive(Debug, Default)]
pub struct RequestManager {
    owned: BTreeMap<BreakpointId, Vec<RequestId>>,
    meta: HashMap<RequestId, RequestMeta>,
    armed: BTreeSet<BreakpointId>,
    exact_waits: HashMap<String, BTreeSet<BreakpointId>>,
    open_waits: Vec<(BreakpointId, WaitTarget)>,
    served: HashSet<(BreakpointId, ReferenceTypeId)>,
    thread_filter: Option<ThreadId>,
    disabled_categories: BTreeSet<Category>,
}

impl RequestManager {
    pub fn new(disabled_categories: BTreeSet<Category>) -> Self {
        Self {
            disabled_categories,
            ..Default::default()
        }
    }

    pub fn is_category_active(&self, category: Category) -> bool {
        !self.disabled_categories.contains(&category)
    }

    pub fn set_category_active(&mut self, category: Category, active: bool) {
        if active {
            self.disabled_categories.remove(&category);
        } else {
            self.disabled_categories.insert(category);
        }
    }

    pub fn is_armed(&self, id: BreakpointId) -> bool {
        self.armed.contains(&id)
    }

    fn can_arm(&self, bp: &Breakpoint, runtime: &dyn Runtime) -> bool {
        if self.armed.contains(&bp.id) {
            debug!("{} already armed", bp.id);
            return false;
        }
        if !bp.is_enabled() || bp.verified().is_invalid() {
            return false;
        }
        if !self.is_category_active(bp.category()) {
            debug!("{} category {} is not active", bp.id, bp.category());
            return false;
        }
        runtime.is_attached()
    }

    /// Create requests for every loaded matching type and wait for the rest.
    /// Returns `None` when the breakpoint is not eligible (already armed,
    /// disabled, invalid, inactive category, detached).
    pub fn arm(&mut self, bp: &Breakpoint, runtime: &mut dyn Runtime) -> EngineResult<Option<Resolution>> {
        if !self.can_arm(bp, runtime) {
            return Ok(None);
        }
        let targets = bp
            .behavior()
            .wait_targets()
            .map_err(|reason| EngineError::InvalidBreakpoint(bp.id, reason))?;

        info!("Arming {} ({})", bp.id, bp.describe());
        self.armed.insert(bp.id);
        self.owned.entry(bp.id).or_default();

        let mut resolution = Resolution::default();
        for kind in bp.behavior().untargeted_requests(runtime) {
            self.register(bp, kind, runtime, &mut resolution);
        }

        for target in targets {
            match &target {
                WaitTarget::Exact(name) => {
                    // other class loaders may define the same name later
                    self.exact_waits
                        .entry(name.clone())
                        .or_default()
                        .insert(bp.id);
                    let loaded = runtime.classes_by_name(name);
                    if loaded.is_empty() {
                        debug!("{} waiting for {} to load", bp.id, name);
                    }
                    for ty in &loaded {
                        self.serve(bp, ty, &target, runtime, &mut resolution);
                    }
                }
                WaitTarget::Pattern(_) | WaitTarget::SubtypeOf(_) => {
                    let matching: Vec<TypeInfo> = runtime
                        .all_classes()
                        .into_iter()
                        .filter(|ty| target.matches(ty))
                        .collect();
                    for ty in &matching {
                        self.serve(bp, ty, &target, runtime, &mut resolution);
                    }
                    self.open_waits.push((bp.id, target));
                }
            }
        }
        Ok(Some(resolution))
    }

    /// Resolve the waits a newly prepared type satisfies
    pub fn on_class_prepared(
        &mut self,
        ty: &TypeInfo,
        registry: &Registry,
        runtime: &mut dyn Runtime,
    ) -> Vec<(BreakpointId, Resolution)> {
        let mut matched = Vec::new();
        if let Some(ids) = self.exact_waits.get(&ty.name) {
            matched.extend(ids.iter().map(|id| (*id, WaitTarget::Exact(ty.name.clone()))));
        }
        matched.extend(
            self.open_waits
                .iter()
                .filter(|(_, target)| target.matches(ty))
                .cloned(),
        );
        if matched.is_empty() {
            return Vec::new();
        }
        debug!("{} satisfies {} wait(s)", ty.name, matched.len());

        let mut results: BTreeMap<BreakpointId, Resolution> = BTreeMap::new();
        for (id, target) in matched {
            let Some(bp) = registry.get(id) else {
                continue;
            };
            if self.served.contains(&(id, ty.type_id)) {
                continue;
            }
            let resolution = results.entry(id).or_default();
            self.serve(bp, ty, &target, runtime, resolution);
        }
        results.into_iter().collect()
    }

    fn serve(
        &mut self,
        bp: &Breakpoint,
        ty: &TypeInfo,
        target: &WaitTarget,
        runtime: &mut dyn Runtime,
        resolution: &mut Resolution,
    ) {
        if !self.served.insert((bp.id, ty.type_id)) {
            return;
        }
        match bp.behavior().create_requests(runtime, ty, target) {
            Ok(kinds) => {
                for kind in kinds {
                    self.register(bp, kind, runtime, resolution);
                }
            }
            Err(err) => {
                warn!("Cannot create requests for {} in {}: {}", bp.id, ty.name, err);
                resolution.failures.push(err);
            }
        }
    }

    fn register(
        &mut self,
        bp: &Breakpoint,
        kind: RequestKind,
        runtime: &mut dyn Runtime,
        resolution: &mut Resolution,
    ) {
        let mut spec = RequestSpec::new(kind, request_policy(bp.properties.suspend_policy));
        spec.thread = self.thread_filter;
        match runtime.create_request(&spec) {
            Ok(request) => {
                debug!("Created {} {} for {}", spec.kind.describe(), request, bp.id);
                self.owned.entry(bp.id).or_default().push(request);
                self.meta.insert(request, RequestMeta::new(bp.id, spec));
                resolution.created.push(request);
            }
            Err(err) => {
                warn!("Failed to create {} for {}: {}", spec.kind.describe(), bp.id, err);
                resolution.failures.push(EngineError::RequestRegistration(format!(
                    "{} for {}: {}",
                    spec.kind.describe(),
                    bp.id,
                    err
                )));
            }
        }
    }

    /// Remove every request and wait owned by `id`. Returns the number of
    /// requests deleted.
    pub fn delete(&mut self, id: BreakpointId, runtime: &mut dyn Runtime) -> usize {
        self.armed.remove(&id);
        for ids in self.exact_waits.values_mut() {
            ids.remove(&id);
        }
        self.exact_waits.retain(|_, ids| !ids.is_empty());
        self.open_waits.retain(|(owner, _)| *owner != id);
        self.served.retain(|(owner, _)| *owner != id);

        let requests = self.owned.remove(&id).unwrap_or_default();
        for request in &requests {
            self.meta.remove(request);
            self.delete_runtime_request(*request, runtime);
        }
        if !requests.is_empty() {
            debug!("Deleted {} request(s) of {}", requests.len(), id);
        }
        requests.len()
    }

    /// Delete a request nobody owns any more
    pub fn delete_runtime_request(&mut self, request: RequestId, runtime: &mut dyn Runtime) {
        if !runtime.is_attached() {
            return;
        }
        if let Err(err) = runtime.delete_request(request) {
            warn!("Failed to delete {}: {}", request, err);
        }
    }

    pub fn find_requests(&self, id: BreakpointId) -> &[RequestId] {
        self.owned.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn owner_of(&self, request: RequestId) -> Option<BreakpointId> {
        self.meta.get(&request).map(|meta| meta.breakpoint)
    }

    pub fn meta(&self, request: RequestId) -> Option<&RequestMeta> {
        self.meta.get(&request)
    }

    /// Whether `id` still waits for any type to load
    pub fn has_waits(&self, id: BreakpointId) -> bool {
        self.exact_waits.values().any(|ids| ids.contains(&id))
            || self.open_waits.iter().any(|(owner, _)| *owner == id)
    }

    pub fn request_count(&self) -> usize {
        self.meta.len()
    }

    pub fn thread_filter(&self) -> Option<ThreadId> {
        self.thread_filter
    }

    /// Restrict all current and future requests to `thread`
    pub fn set_thread_filter(&mut self, thread: Option<ThreadId>, runtime: &mut dyn Runtime) -> EngineResult<()> {
        if self.thread_filter == thread {
            return Ok(());
        }
        info!("Thread filter set to {:?}", thread);
        self.thread_filter = thread;
        if !runtime.is_attached() {
            return Ok(());
        }
        let mut requests: Vec<RequestId> = self.meta.keys().copied().collect();
        requests.sort();
        for request in requests {
            match apply_thread_filter(runtime, request, thread) {
                Ok(()) => {
                    if let Some(meta) = self.meta.get_mut(&request) {
                        meta.spec.thread = thread;
                    }
                }
                Err(RuntimeError::Disconnected) => return Err(RuntimeError::Disconnected.into()),
                Err(err) => {
                    warn!("Cannot change thread filter of {}: {}", request, err);
                    // never leave it disabled halfway through
                    if let Err(err) = runtime.set_request_enabled(request, true) {
                        debug!("{} could not be re-enabled: {}", request, err);
                    }
                }
            }
        }
        Ok(())
    }

    /// Forget everything without talking to the runtime (it is gone)
    pub fn invalidate_all(&mut self) {
        self.owned.clear();
        self.meta.clear();
        self.armed.clear();
        self.exact_waits.clear();
        self.open_waits.clear();
        self.served.clear();
        self.thread_filter = None;
    }

    /// Count a hit that reached the count filter; returns the new counter
    pub fn record_hit(&mut self, request: RequestId) -> u64 {
        match self.meta.get_mut(&request) {
            Some(meta) => {
                meta.hits += 1;
                meta.hits
            }
            None => 0,
        }
    }

    /// Cached compiled expression for `request` at `location`, compiling on miss
    pub fn compiled(
        &mut self,
        request: RequestId,
        location: &Location,
        expression: &str,
        compile: impl FnOnce() -> Result<Arc<dyn CompiledExpression>, EvaluationError>,
    ) -> Result<Arc<dyn CompiledExpression>, EvaluationError> {
        let key = (location.class_id, location.method_id, expression.to_string());
        if let Some(compiled) = self
            .meta
            .get(&request)
            .and_then(|meta| meta.evaluators.get(&key))
        {
            return Ok(Arc::clone(compiled));
        }
        let compiled = compile()?;
        if let Some(meta) = self.meta.get_mut(&request) {
            meta.evaluators.insert(key, Arc::clone(&compiled));
        }
        Ok(compiled)
    }

    /// Drop cached expressions of every request owned by `id`
    pub fn invalidate_evaluators(&mut self, id: BreakpointId) {
        for meta in self.meta.values_mut().filter(|meta| meta.breakpoint == id) {
            meta.evaluators.clear();
        }
    }
}
