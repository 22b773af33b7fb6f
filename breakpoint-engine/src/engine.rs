// Breakpoint engine
//
// Per-session core. Owns the registry, the request manager, dependency rules
// and the suspend coordinator, and turns runtime event sets into stop
// decisions. Not thread safe; the session task serializes access.

use crate::breakpoint::{Breakpoint, BreakpointKind, BreakpointProperties, VerifiedState};
use crate::category::Category;
use crate::config::EngineSettings;
use crate::dependency::{DependencyRule, DependencyRules};
use crate::error::{EngineError, EngineResult, RuntimeError};
use crate::evaluator::ExpressionEvaluator;
use crate::eventrequest::SuspendPolicy;
use crate::events::{EventKind, EventSet, Hit};
use crate::filter_chain::{evaluate_expression, FailedStep, FilterChain, SkipReason, Verdict};
use crate::line::LineBreakpoint;
use crate::registry::Registry;
use crate::requests::{RequestManager, Resolution};
use crate::runtime::Runtime;
use crate::source::SourceIndex;
use crate::suspend::{ArmState, SuspendCoordinator, SuspendScope};
use crate::types::{BreakpointId, Frame, SourcePosition, ThreadId, TypeInfo};
use tracing::{debug, info, trace, warn};

/// Change notifications for the UI
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    BreakpointChanged(BreakpointId),
    VerifiedChanged {
        id: BreakpointId,
        state: VerifiedState,
    },
    /// Program output produced by a breakpoint (log actions, evaluation errors)
    Output {
        breakpoint: Option<BreakpointId>,
        text: String,
    },
    Stopped {
        thread: Option<ThreadId>,
        breakpoints: Vec<BreakpointId>,
        scope: SuspendScope,
    },
    Removed(BreakpointId),
}

/// A filter chain verdict together with the state it was computed against
#[derive(Debug)]
pub struct PendingVerdict {
    pub breakpoint: BreakpointId,
    pub hit: Hit,
    pub generation: u64,
    pub epoch: u64,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Copy)]
struct RunToCursor {
    id: BreakpointId,
    /// The session was muted for this run and is unmuted when it ends
    muted_session: bool,
}

pub struct BreakpointEngine<R: Runtime> {
    runtime: R,
    evaluator: Box<dyn ExpressionEvaluator>,
    settings: EngineSettings,
    registry: Registry,
    requests: RequestManager,
    rules: DependencyRules,
    suspend: SuspendCoordinator,
    notifications: Vec<Notification>,
    epoch: u64,
    attached: bool,
    muted: bool,
    run_to_cursor: Option<RunToCursor>,
}

/// `pkg.Type.method(File.java:12)`
pub fn describe_frame(frame: &Frame) -> String {
    let file = frame.source_file.as_deref().unwrap_or("Unknown Source");
    match frame.location.line {
        Some(line) => format!(
            "{}.{}({}:{})",
            frame.declaring_type, frame.method_name, file, line
        ),
        None => format!("{}.{}({})", frame.declaring_type, frame.method_name, file),
    }
}

impl<R: Runtime> BreakpointEngine<R> {
    pub fn new(
        runtime: R,
        evaluator: impl ExpressionEvaluator + 'static,
        settings: EngineSettings,
    ) -> Self {
        Self {
            runtime,
            evaluator: Box::new(evaluator),
            requests: RequestManager::new(settings.disabled_categories.clone()),
            settings,
            registry: Registry::new(),
            rules: DependencyRules::new(),
            suspend: SuspendCoordinator::new(),
            notifications: Vec::new(),
            epoch: 0,
            attached: false,
            muted: false,
            run_to_cursor: None,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn breakpoint(&self, id: BreakpointId) -> Option<&Breakpoint> {
        self.registry.get(id)
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = &Breakpoint> {
        self.registry.iter()
    }

    pub fn requests(&self) -> &RequestManager {
        &self.requests
    }

    pub fn rules(&self) -> &DependencyRules {
        &self.rules
    }

    pub fn arm_state(&self, id: BreakpointId) -> ArmState {
        self.suspend.state(id)
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_suspended(&self) -> bool {
        self.suspend.is_suspended()
    }

    pub fn run_to_cursor_id(&self) -> Option<BreakpointId> {
        self.run_to_cursor.map(|rtc| rtc.id)
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn notify(&mut self, notification: Notification) {
        trace!("Notification: {:?}", notification);
        self.notifications.push(notification);
    }

    fn is_run_to_cursor(&self, id: BreakpointId) -> bool {
        self.run_to_cursor.is_some_and(|rtc| rtc.id == id)
    }

    fn set_verified(&mut self, id: BreakpointId, state: VerifiedState) {
        let Some(bp) = self.registry.get_mut(id) else {
            return;
        };
        if bp.set_verified(state.clone()) {
            debug!("{} is now {:?}", id, state);
            self.notify(Notification::VerifiedChanged { id, state });
        }
    }

    // ---- lifecycle ----

    /// Start a new attach cycle and arm every eligible breakpoint
    pub fn attach(&mut self) -> EngineResult<()> {
        if !self.runtime.is_attached() {
            return Err(RuntimeError::Disconnected.into());
        }
        if !self.attached {
            self.epoch += 1;
            self.attached = true;
            info!("Attached (epoch {}), arming {} breakpoint(s)", self.epoch, self.registry.len());
        }
        self.arm_all()
    }

    /// Forget every request; breakpoints stay and are re-armed on next attach
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        info!(
            "Detached, dropping {} request(s)",
            self.requests.request_count()
        );
        self.epoch += 1;
        self.attached = false;
        self.requests.invalidate_all();
        self.suspend.reset();
        for id in self.registry.ids() {
            let invalid = self
                .registry
                .get(id)
                .is_some_and(|bp| bp.verified().is_invalid());
            if !invalid {
                self.set_verified(id, VerifiedState::Unverified);
            }
        }
        if let Err(err) = self.flush_removals() {
            warn!("Failed to remove temporary breakpoints on detach: {}", err);
        }
        if let Some(rtc) = self.run_to_cursor {
            if let Err(err) = self.remove_breakpoint(rtc.id) {
                warn!("Failed to cancel run to cursor on detach: {}", err);
            }
        }
    }

    fn arm_all(&mut self) -> EngineResult<()> {
        for id in self.registry.ids() {
            self.arm(id)?;
        }
        Ok(())
    }

    /// Arm one breakpoint if it is eligible; problems mark it invalid
    pub fn arm(&mut self, id: BreakpointId) -> EngineResult<()> {
        let bp = self.registry.require(id)?;
        if !self.attached || self.suspend.is_pending_removal(id) {
            return Ok(());
        }
        if self.muted && !self.is_run_to_cursor(id) {
            debug!("Session muted, not arming {}", id);
            return Ok(());
        }
        if self.requests.is_armed(id) || !bp.is_enabled() || bp.verified().is_invalid() {
            return Ok(());
        }

        self.suspend.transition(id, ArmState::Arming);
        match self.requests.arm(bp, &mut self.runtime) {
            Ok(Some(resolution)) => {
                self.suspend.transition(id, ArmState::Armed);
                self.apply_resolution(id, resolution);
            }
            Ok(None) => {
                self.suspend.transition(id, ArmState::Unarmed);
            }
            Err(EngineError::InvalidBreakpoint(_, reason)) => {
                warn!("{} cannot be armed: {}", id, reason);
                self.suspend.transition(id, ArmState::Unarmed);
                self.set_verified(id, VerifiedState::Invalid(reason));
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// Delete requests and waits; the breakpoint itself stays
    fn disarm(&mut self, id: BreakpointId) {
        self.requests.delete(id, &mut self.runtime);
        self.suspend.transition(id, ArmState::Unarmed);
        let invalid = self
            .registry
            .get(id)
            .is_some_and(|bp| bp.verified().is_invalid());
        if !invalid {
            self.set_verified(id, VerifiedState::Unverified);
        }
    }

    fn apply_resolution(&mut self, id: BreakpointId, resolution: Resolution) {
        if let Some(err) = resolution.missing_member() {
            let reason = err.to_string();
            warn!("{} is invalid: {}", id, reason);
            self.requests.delete(id, &mut self.runtime);
            self.suspend.transition(id, ArmState::Unarmed);
            self.set_verified(id, VerifiedState::Invalid(reason));
            return;
        }
        let state = if self.requests.find_requests(id).is_empty() {
            VerifiedState::Pending
        } else {
            VerifiedState::Verified
        };
        self.set_verified(id, state);
    }

    /// A type finished loading in the target
    pub fn on_class_prepared(&mut self, ty: &TypeInfo) {
        if !self.attached {
            return;
        }
        let results = self
            .requests
            .on_class_prepared(ty, &self.registry, &mut self.runtime);
        for (id, resolution) in results {
            self.apply_resolution(id, resolution);
        }
    }

    // ---- breakpoint management ----

    pub fn add_breakpoint(
        &mut self,
        kind: BreakpointKind,
        properties: BreakpointProperties,
    ) -> EngineResult<BreakpointId> {
        let id = self.registry.insert(kind, properties);
        info!("Added {} ({})", id, self.registry.require(id)?.describe());
        self.notify(Notification::BreakpointChanged(id));
        self.arm(id)?;
        Ok(id)
    }

    /// Add a persisted breakpoint, keeping its id
    pub fn restore_breakpoint(&mut self, json: &str) -> EngineResult<BreakpointId> {
        let id = self.registry.restore(Breakpoint::from_json(json)?)?;
        self.notify(Notification::BreakpointChanged(id));
        self.arm(id)?;
        Ok(id)
    }

    pub fn export_breakpoint(&self, id: BreakpointId) -> EngineResult<String> {
        self.registry.require(id)?.to_json()
    }

    pub fn remove_breakpoint(&mut self, id: BreakpointId) -> EngineResult<()> {
        self.registry.require(id)?;
        self.requests.delete(id, &mut self.runtime);
        for rule in self.rules.remove_references(id) {
            if rule.master == id {
                self.set_enabled(rule.slave, true)?;
            }
        }
        self.suspend.forget(id);
        self.registry.remove(id);
        info!("Removed {}", id);
        self.notify(Notification::Removed(id));

        if self.is_run_to_cursor(id) {
            self.finish_run_to_cursor()?;
        }
        Ok(())
    }

    pub fn set_enabled(&mut self, id: BreakpointId, enabled: bool) -> EngineResult<()> {
        let bp = self.registry.require_mut(id)?;
        if bp.properties.enabled == enabled {
            return Ok(());
        }
        bp.properties.enabled = enabled;
        bp.bump_generation();
        debug!("{} {}", id, if enabled { "enabled" } else { "disabled" });
        self.notify(Notification::BreakpointChanged(id));
        if enabled {
            self.arm(id)
        } else {
            self.disarm(id);
            Ok(())
        }
    }

    /// Replace the shared properties. Requests are recreated only when the
    /// suspend policy (baked into them) or the enabled flag changes.
    pub fn update_properties(
        &mut self,
        id: BreakpointId,
        properties: BreakpointProperties,
    ) -> EngineResult<()> {
        let bp = self.registry.require_mut(id)?;
        let recreate = bp.properties.suspend_policy != properties.suspend_policy
            || bp.properties.enabled != properties.enabled;
        bp.properties = properties;
        bp.bump_generation();
        self.notify(Notification::BreakpointChanged(id));
        if !recreate {
            // condition text may have changed
            self.requests.invalidate_evaluators(id);
            return Ok(());
        }
        if self.requests.is_armed(id) {
            self.disarm(id);
        }
        self.arm(id)
    }

    /// Re-resolve a breakpoint against moved sources and re-arm it
    pub fn reload(&mut self, id: BreakpointId, index: &dyn SourceIndex) -> EngineResult<()> {
        self.registry.require(id)?;
        self.requests.delete(id, &mut self.runtime);
        self.suspend.transition(id, ArmState::Unarmed);

        let bp = self.registry.require_mut(id)?;
        let before = bp.verified().clone();
        bp.reload(index);
        if !bp.verified().is_invalid() {
            bp.set_verified(VerifiedState::Unverified);
        }
        let after = bp.verified().clone();
        info!("Reloaded {} ({})", id, bp.describe());
        if after != before {
            self.notify(Notification::VerifiedChanged { id, state: after });
        }
        self.notify(Notification::BreakpointChanged(id));
        self.arm(id)
    }

    pub fn set_category_active(&mut self, category: Category, active: bool) -> EngineResult<()> {
        self.requests.set_category_active(category, active);
        let ids: Vec<BreakpointId> = self
            .registry
            .iter()
            .filter(|bp| bp.category() == category)
            .map(|bp| bp.id)
            .collect();
        for id in ids {
            if active {
                self.arm(id)?;
            } else {
                self.disarm(id);
            }
        }
        Ok(())
    }

    // ---- dependency rules ----

    /// Make `slave` wait for `master`; the slave is disabled right away
    pub fn install_rule(
        &mut self,
        master: BreakpointId,
        slave: BreakpointId,
        leave_enabled: bool,
    ) -> EngineResult<()> {
        self.registry.require(master)?;
        self.registry.require(slave)?;
        self.rules.install(DependencyRule {
            master,
            slave,
            leave_enabled,
        })?;
        self.set_enabled(slave, false)
    }

    /// Drop the rule for `slave`, enabling it again
    pub fn remove_rule(&mut self, slave: BreakpointId) -> EngineResult<Option<DependencyRule>> {
        let removed = self.rules.remove(slave);
        if removed.is_some() {
            self.set_enabled(slave, true)?;
        }
        Ok(removed)
    }

    // ---- session level ----

    pub fn thread_filter(&self) -> Option<ThreadId> {
        self.requests.thread_filter()
    }

    pub fn set_thread_filter(&mut self, thread: Option<ThreadId>) -> EngineResult<()> {
        self.requests.set_thread_filter(thread, &mut self.runtime)
    }

    /// Muting removes every request without touching enabled flags
    pub fn set_muted(&mut self, muted: bool) -> EngineResult<()> {
        if self.muted == muted {
            return Ok(());
        }
        self.muted = muted;
        info!("Breakpoints {}", if muted { "muted" } else { "unmuted" });
        if muted {
            for id in self.registry.ids() {
                if !self.is_run_to_cursor(id) {
                    self.disarm(id);
                }
            }
            Ok(())
        } else {
            self.arm_all()
        }
    }

    /// Stop once at `position`, replacing any earlier run to cursor
    pub fn run_to_cursor(
        &mut self,
        position: SourcePosition,
        class_name: &str,
        ignore_breakpoints: bool,
    ) -> EngineResult<BreakpointId> {
        self.cancel_run_to_cursor()?;
        let muted_session = ignore_breakpoints && !self.muted;
        if muted_session {
            self.set_muted(true)?;
        }
        let kind = BreakpointKind::Line(LineBreakpoint::new(
            position.file,
            position.line,
            Some(class_name),
        ));
        let properties = BreakpointProperties {
            suspend_policy: SuspendPolicy::All,
            remove_after_hit: true,
            ..Default::default()
        };
        let id = self.registry.insert(kind, properties);
        self.run_to_cursor = Some(RunToCursor { id, muted_session });
        info!("Run to cursor via {}", id);
        self.notify(Notification::BreakpointChanged(id));
        self.arm(id)?;
        Ok(id)
    }

    pub fn cancel_run_to_cursor(&mut self) -> EngineResult<()> {
        match self.run_to_cursor {
            Some(rtc) if self.registry.contains(rtc.id) => self.remove_breakpoint(rtc.id),
            Some(_) => self.finish_run_to_cursor(),
            None => Ok(()),
        }
    }

    fn finish_run_to_cursor(&mut self) -> EngineResult<()> {
        if let Some(rtc) = self.run_to_cursor.take() {
            if rtc.muted_session {
                self.set_muted(false)?;
            }
        }
        Ok(())
    }

    /// Release the target: clears the thread filter, removes temporary
    /// breakpoints that were hit and resumes what the last stop suspended
    pub fn resume(&mut self) -> EngineResult<()> {
        if self.settings.clear_thread_filter_on_resume {
            self.set_thread_filter(None)?;
        }
        self.flush_removals()?;
        if let Some(context) = self.suspend.resume(&mut self.runtime)? {
            debug!("Resumed from {:?}", context.scope);
        }
        Ok(())
    }

    fn flush_removals(&mut self) -> EngineResult<()> {
        for id in self.suspend.take_pending_removals() {
            if self.registry.contains(id) {
                self.remove_breakpoint(id)?;
            }
        }
        Ok(())
    }

    // ---- events ----

    /// Process one event set from the runtime. Returns the scope the target
    /// is left suspended at.
    pub fn handle_event_set(&mut self, set: EventSet) -> EngineResult<SuspendScope> {
        let thread = set.thread();
        let mut hits = Vec::new();
        for event in &set.events {
            match &event.kind {
                EventKind::VMDeath | EventKind::VMDisconnected => {
                    info!("Target went away");
                    self.detach();
                    return Ok(SuspendScope::None);
                }
                EventKind::ClassPrepare { ref_type, .. } => self.on_class_prepared(ref_type),
                _ => match Hit::from_event(event) {
                    Some(hit) => hits.push(hit),
                    None => warn!("Ignoring event without a request: {:?}", event.kind),
                },
            }
        }
        if !self.attached {
            return Ok(SuspendScope::None);
        }

        // evaluate everything first; applying a verdict may change state that
        // later verdicts were computed against
        let pending: Vec<PendingVerdict> = hits.iter().filter_map(|hit| self.evaluate_hit(hit)).collect();

        let mut decided = SuspendScope::None;
        let mut stopped_by = Vec::new();
        for verdict in pending {
            let id = verdict.breakpoint;
            if let Some(scope) = self.apply_verdict(verdict)? {
                if scope.is_stopped() {
                    stopped_by.push(id);
                }
                decided = decided.strongest(scope);
            }
        }

        let scope = self
            .suspend
            .resolve(&mut self.runtime, decided, set.suspend_policy, thread)?;
        if scope.is_stopped() {
            info!("Stopped by {:?} at {:?}", stopped_by, scope);
            self.notify(Notification::Stopped {
                thread,
                breakpoints: stopped_by,
                scope,
            });
        } else {
            self.flush_removals()?;
        }
        Ok(scope)
    }

    /// Run the filter chain for one hit
    pub fn evaluate_hit(&mut self, hit: &Hit) -> Option<PendingVerdict> {
        let Some(id) = self.requests.owner_of(hit.request) else {
            debug!("{} has no owner, deleting", hit.request);
            self.requests
                .delete_runtime_request(hit.request, &mut self.runtime);
            return None;
        };
        let bp = self.registry.get(id)?;
        self.suspend.transition(id, ArmState::Evaluating);
        let mut chain = FilterChain {
            runtime: &self.runtime,
            evaluator: self.evaluator.as_ref(),
            requests: &mut self.requests,
        };
        let verdict = chain.evaluate(bp, hit);
        Some(PendingVerdict {
            breakpoint: id,
            hit: hit.clone(),
            generation: bp.generation(),
            epoch: self.epoch,
            verdict,
        })
    }

    /// Act on a verdict unless the breakpoint changed since it was computed.
    /// Returns the scope the breakpoint asks for, `None` if discarded.
    pub fn apply_verdict(&mut self, pending: PendingVerdict) -> EngineResult<Option<SuspendScope>> {
        let id = pending.breakpoint;
        let Some(bp) = self.registry.get(id) else {
            return Ok(None);
        };
        if pending.epoch != self.epoch || pending.generation != bp.generation() {
            debug!("Discarding stale verdict for {}", id);
            return Ok(None);
        }

        match pending.verdict {
            Verdict::Stop => self.on_accepted(id, &pending.hit).map(Some),
            Verdict::Skip(SkipReason::Stale) => {
                self.requests.delete(id, &mut self.runtime);
                self.suspend.transition(id, ArmState::Unarmed);
                Ok(None)
            }
            Verdict::Skip(reason) => {
                trace!("{} skipped: {:?}", id, reason);
                self.continue_after_hit(id);
                Ok(Some(SuspendScope::None))
            }
            Verdict::Error(step, err) => {
                let text = match step {
                    FailedStep::Condition => {
                        let expression = bp
                            .properties
                            .active_condition()
                            .map(|c| c.expression.clone())
                            .unwrap_or_default();
                        format!(
                            "Failed to evaluate breakpoint condition '{}': {}",
                            expression, err
                        )
                    }
                    FailedStep::ClassFilter => {
                        format!("Failed to check class filters of {}: {}", bp.describe(), err)
                    }
                    FailedStep::Frames => format!(
                        "Cannot read frames of thread {} at {}: {}",
                        pending.hit.thread,
                        bp.describe(),
                        err
                    ),
                };
                warn!("{}: {}", id, text);
                self.notify(Notification::Output {
                    breakpoint: Some(id),
                    text,
                });
                if step == FailedStep::Condition && self.settings.stop_on_condition_error {
                    self.on_accepted(id, &pending.hit).map(Some)
                } else {
                    self.continue_after_hit(id);
                    Ok(Some(SuspendScope::None))
                }
            }
        }
    }

    fn continue_after_hit(&mut self, id: BreakpointId) {
        self.suspend.transition(id, ArmState::Continued);
        self.suspend.transition(id, ArmState::Armed);
    }

    fn on_accepted(&mut self, id: BreakpointId, hit: &Hit) -> EngineResult<SuspendScope> {
        self.run_actions(id, hit);

        let bp = self.registry.require(id)?;
        let scope = SuspendScope::from_policy(bp.properties.suspend_policy, hit.thread);
        let remove_after_hit = bp.properties.remove_after_hit;
        if scope.is_stopped() {
            self.suspend.transition(id, ArmState::Stopped);
        } else {
            self.continue_after_hit(id);
        }

        if remove_after_hit {
            // must happen before the target runs again
            self.requests.delete(id, &mut self.runtime);
            self.suspend.defer_removal(id);
        }
        if self.is_run_to_cursor(id) {
            self.finish_run_to_cursor()?;
        }

        let effects = self.rules.on_hit(id);
        for slave in effects.enable {
            info!("{} hit, enabling dependent {}", id, slave);
            self.set_enabled(slave, true)?;
        }
        for slave in effects.disable {
            self.set_enabled(slave, false)?;
        }
        Ok(scope)
    }

    /// Log actions run on every accepted hit, stopped or not
    fn run_actions(&mut self, id: BreakpointId, hit: &Hit) {
        let Some(bp) = self.registry.get(id) else {
            return;
        };
        let log = &bp.properties.log;
        if log.is_empty() {
            return;
        }
        let frames = match self.runtime.frames(hit.thread) {
            Ok(frames) => frames,
            Err(err) => {
                warn!("Cannot run log actions of {}: {}", id, err);
                return;
            }
        };
        let Some(top) = frames.first() else {
            return;
        };

        let mut output = Vec::new();
        if log.message {
            output.push(format!("Breakpoint reached at {}", describe_frame(top)));
        }
        if let Some(expression) = log.expression.as_ref().filter(|e| e.is_active()) {
            let text = match evaluate_expression(
                self.evaluator.as_ref(),
                &mut self.requests,
                bp,
                hit,
                top,
                &expression.expression,
            ) {
                Ok(value) => format!("{} = {}", expression.expression, value.format()),
                Err(err) => format!(
                    "Failed to evaluate log expression '{}': {}",
                    expression.expression, err
                ),
            };
            output.push(text);
        }
        if log.stack {
            let stack: Vec<String> = frames
                .iter()
                .map(|frame| format!("\t{}", describe_frame(frame)))
                .collect();
            output.push(stack.join("\n"));
        }
        for text in output {
            self.notify(Notification::Output {
                breakpoint: Some(id),
                text,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakpoint::{Condition, LogOptions};
    use crate::events::Event;
    use crate::mock::{frame, MockEvaluator, MockRuntime, RuntimeCall};
    use crate::types::Value;

    fn engine() -> BreakpointEngine<MockRuntime> {
        let mut runtime = MockRuntime::new();
        let ty = runtime.load_class("pkg.Foo");
        runtime.add_line(&ty, 10, 1);
        runtime.set_frames(1, vec![frame("pkg.Foo", "run", 10), frame("pkg.Main", "main", 3)]);
        let mut engine = BreakpointEngine::new(runtime, MockEvaluator::new(), EngineSettings::default());
        engine.attach().unwrap();
        engine
    }

    fn line() -> BreakpointKind {
        BreakpointKind::Line(LineBreakpoint::new("Foo.java", 10, Some("pkg.Foo")))
    }

    fn hit_set(engine: &BreakpointEngine<MockRuntime>, id: BreakpointId, policy: SuspendPolicy) -> EventSet {
        let request = engine.requests().find_requests(id)[0];
        EventSet::single(
            policy,
            Event::new(
                request,
                EventKind::Breakpoint {
                    thread: 1,
                    location: frame("pkg.Foo", "run", 10).location,
                },
            ),
        )
    }

    #[test]
    fn test_add_arms_and_verifies() {
        let mut engine = engine();
        let id = engine.add_breakpoint(line(), Default::default()).unwrap();
        assert_eq!(engine.breakpoint(id).unwrap().verified(), &VerifiedState::Verified);
        assert_eq!(engine.arm_state(id), ArmState::Armed);
        let notes = engine.drain_notifications();
        assert!(notes.contains(&Notification::BreakpointChanged(id)));
        assert!(notes.contains(&Notification::VerifiedChanged {
            id,
            state: VerifiedState::Verified
        }));
    }

    #[test]
    fn test_log_actions_without_stopping() {
        let mut engine = engine();
        let properties = BreakpointProperties {
            suspend_policy: SuspendPolicy::None,
            log: LogOptions {
                message: true,
                expression: Some(Condition::new("count")),
                stack: true,
            },
            ..Default::default()
        };
        let id = engine.add_breakpoint(line(), properties).unwrap();
        engine.drain_notifications();
        engine.runtime_mut().clear_calls();

        // registered as event-thread so frames can be read
        let request = engine.requests().find_requests(id)[0];
        assert_eq!(
            engine.runtime().requests[&request].spec.suspend_policy,
            SuspendPolicy::EventThread
        );

        let set = hit_set(&engine, id, SuspendPolicy::EventThread);
        let scope = engine.handle_event_set(set).unwrap();
        assert_eq!(scope, SuspendScope::None);
        assert_eq!(engine.runtime().calls, vec![RuntimeCall::ResumeThread(1)]);

        let outputs: Vec<String> = engine
            .drain_notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Output { text, .. } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(outputs[0], "Breakpoint reached at pkg.Foo.run(Foo.java:10)");
        assert!(outputs[1].starts_with("Failed to evaluate log expression 'count'"));
        assert_eq!(
            outputs[2],
            "\tpkg.Foo.run(Foo.java:10)\n\tpkg.Main.main(Main.java:3)"
        );
    }

    #[test]
    fn test_condition_error_reported_and_continues() {
        let evaluator = MockEvaluator::new();
        evaluator.fail_compile("bad(");
        let mut runtime = MockRuntime::new();
        let ty = runtime.load_class("pkg.Foo");
        runtime.add_line(&ty, 10, 1);
        runtime.set_frames(1, vec![frame("pkg.Foo", "run", 10)]);
        let mut engine = BreakpointEngine::new(runtime, evaluator, EngineSettings::default());
        engine.attach().unwrap();

        let properties = BreakpointProperties {
            condition: Some(Condition::new("bad(")),
            ..Default::default()
        };
        let id = engine.add_breakpoint(line(), properties).unwrap();
        engine.drain_notifications();
        let scope = engine.handle_event_set(hit_set(&engine, id, SuspendPolicy::All)).unwrap();
        assert_eq!(scope, SuspendScope::None);
        let notes = engine.drain_notifications();
        assert!(matches!(
            &notes[0],
            Notification::Output { text, .. } if text.starts_with("Failed to evaluate breakpoint condition 'bad('")
        ));
    }

    #[test]
    fn test_condition_error_can_stop() {
        let mut runtime = MockRuntime::new();
        let ty = runtime.load_class("pkg.Foo");
        runtime.add_line(&ty, 10, 1);
        runtime.set_frames(1, vec![frame("pkg.Foo", "run", 10)]);
        let settings = EngineSettings {
            stop_on_condition_error: true,
            ..Default::default()
        };
        let mut engine = BreakpointEngine::new(runtime, MockEvaluator::new(), settings);
        engine.attach().unwrap();
        let properties = BreakpointProperties {
            condition: Some(Condition::new("unknown")),
            ..Default::default()
        };
        let id = engine.add_breakpoint(line(), properties).unwrap();
        let scope = engine.handle_event_set(hit_set(&engine, id, SuspendPolicy::All)).unwrap();
        assert_eq!(scope, SuspendScope::All);
    }

    #[test]
    fn test_frame_failure_is_not_reported_as_condition() {
        let settings = EngineSettings {
            stop_on_condition_error: true,
            ..Default::default()
        };
        let mut runtime = MockRuntime::new();
        let ty = runtime.load_class("pkg.Foo");
        runtime.add_line(&ty, 10, 1);
        let mut engine = BreakpointEngine::new(runtime, MockEvaluator::new(), settings);
        engine.attach().unwrap();
        let id = engine.add_breakpoint(line(), Default::default()).unwrap();
        engine.drain_notifications();

        // no frames recorded for thread 1
        let scope = engine.handle_event_set(hit_set(&engine, id, SuspendPolicy::All)).unwrap();
        assert_eq!(scope, SuspendScope::None);
        let notes = engine.drain_notifications();
        assert!(matches!(
            &notes[0],
            Notification::Output { text, .. }
                if text.starts_with("Cannot read frames of thread 1 at Foo.java:10")
        ));
    }

    #[test]
    fn test_stale_verdict_is_discarded() {
        let mut engine = engine();
        let id = engine.add_breakpoint(line(), Default::default()).unwrap();
        let request = engine.requests().find_requests(id)[0];
        let hit = Hit {
            request,
            thread: 1,
            kind: EventKind::Breakpoint {
                thread: 1,
                location: frame("pkg.Foo", "run", 10).location,
            },
        };
        let pending = engine.evaluate_hit(&hit).unwrap();
        assert!(pending.verdict.is_stop());

        let properties = BreakpointProperties {
            condition: Some(Condition::new("false")),
            ..Default::default()
        };
        engine.update_properties(id, properties).unwrap();
        assert_eq!(engine.apply_verdict(pending).unwrap(), None);
    }

    #[test]
    fn test_verdict_from_previous_attach_is_discarded() {
        let mut engine = engine();
        let id = engine.add_breakpoint(line(), Default::default()).unwrap();
        let request = engine.requests().find_requests(id)[0];
        let hit = Hit {
            request,
            thread: 1,
            kind: EventKind::Breakpoint {
                thread: 1,
                location: frame("pkg.Foo", "run", 10).location,
            },
        };
        let pending = engine.evaluate_hit(&hit).unwrap();
        engine.detach();
        assert_eq!(engine.apply_verdict(pending).unwrap(), None);
    }

    #[test]
    fn test_unowned_request_is_deleted() {
        let mut engine = engine();
        let id = engine.add_breakpoint(line(), Default::default()).unwrap();
        let set = hit_set(&engine, id, SuspendPolicy::All);
        let request = engine.requests().find_requests(id)[0];
        // forget the request on the engine side only
        engine.requests.delete(id, &mut MockRuntime::new());
        engine.handle_event_set(set).unwrap();
        assert!(!engine.runtime().requests.contains_key(&request));
    }

    #[test]
    fn test_missing_method_marks_invalid() {
        let mut engine = engine();
        let kind = BreakpointKind::Method(crate::method::MethodBreakpoint::new("pkg.Foo", "absent"));
        let id = engine.add_breakpoint(kind, Default::default()).unwrap();
        assert_eq!(
            engine.breakpoint(id).unwrap().verified(),
            &VerifiedState::Invalid("No method 'absent' in pkg.Foo".to_string())
        );
        assert!(engine.requests().find_requests(id).is_empty());
        assert!(!engine.requests().has_waits(id));
    }

    #[test]
    fn test_log_expression_value() {
        let evaluator = MockEvaluator::new();
        evaluator.set_value("count", Value::Int(4));
        let mut runtime = MockRuntime::new();
        let ty = runtime.load_class("pkg.Foo");
        runtime.add_line(&ty, 10, 1);
        runtime.set_frames(1, vec![frame("pkg.Foo", "run", 10)]);
        let mut engine = BreakpointEngine::new(runtime, evaluator, EngineSettings::default());
        engine.attach().unwrap();
        let properties = BreakpointProperties {
            log: LogOptions {
                expression: Some(Condition::new("count")),
                ..Default::default()
            },
            ..Default::default()
        };
        let id = engine.add_breakpoint(line(), properties).unwrap();
        engine.drain_notifications();
        engine.handle_event_set(hit_set(&engine, id, SuspendPolicy::All)).unwrap();
        assert!(engine.drain_notifications().contains(&Notification::Output {
            breakpoint: Some(id),
            text: "count = (int) 4".to_string()
        }));
    }
}
