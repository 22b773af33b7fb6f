// Suspend coordination
//
// Turns the suspend policy of accepted hits into a pause of the target, and
// remembers how to undo it on resume. Also tracks where each breakpoint is in
// its arm/hit cycle and which temporary breakpoints wait for removal.

use crate::error::RuntimeResult;
use crate::eventrequest::SuspendPolicy;
use crate::runtime::Runtime;
use crate::types::{BreakpointId, ThreadId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// How much of the target is paused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "thread", rename_all = "snake_case")]
pub enum SuspendScope {
    None,
    Thread(ThreadId),
    All,
}

impl SuspendScope {
    pub fn from_policy(policy: SuspendPolicy, thread: ThreadId) -> Self {
        match policy {
            SuspendPolicy::None => SuspendScope::None,
            SuspendPolicy::EventThread => SuspendScope::Thread(thread),
            SuspendPolicy::All => SuspendScope::All,
        }
    }

    fn strength(&self) -> u8 {
        match self {
            SuspendScope::None => 0,
            SuspendScope::Thread(_) => 1,
            SuspendScope::All => 2,
        }
    }

    /// The wider of two scopes
    pub fn strongest(self, other: SuspendScope) -> SuspendScope {
        if other.strength() > self.strength() {
            other
        } else {
            self
        }
    }

    pub fn is_stopped(&self) -> bool {
        !matches!(self, SuspendScope::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeAction {
    Thread(ThreadId),
    All,
}

/// A paused target and the calls that release it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendContext {
    pub scope: SuspendScope,
    pub thread: Option<ThreadId>,
    resume: Vec<ResumeAction>,
}

/// Where a breakpoint is in one attach cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmState {
    #[default]
    Unarmed,
    Arming,
    Armed,
    Evaluating,
    Stopped,
    Continued,
}

impl ArmState {
    pub fn can_move_to(self, next: ArmState) -> bool {
        use ArmState::*;
        match (self, next) {
            // detach and disable reset from anywhere
            (_, Unarmed) => true,
            (Unarmed, Arming) => true,
            (Arming, Armed) => true,
            (Armed, Evaluating) => true,
            (Evaluating, Stopped) | (Evaluating, Continued) => true,
            (Stopped, Armed) | (Continued, Armed) => true,
            // a hit inside an event set that already stopped
            (Stopped, Evaluating) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct SuspendCoordinator {
    current: Option<SuspendContext>,
    states: HashMap<BreakpointId, ArmState>,
    pending_removals: BTreeSet<BreakpointId>,
}

impl SuspendCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: BreakpointId) -> ArmState {
        self.states.get(&id).copied().unwrap_or_default()
    }

    /// Move a breakpoint to `next`; illegal moves are logged and ignored
    pub fn transition(&mut self, id: BreakpointId, next: ArmState) -> bool {
        let current = self.state(id);
        if current == next {
            return true;
        }
        if !current.can_move_to(next) {
            warn!("Ignoring {:?} -> {:?} for {}", current, next, id);
            return false;
        }
        debug!("{}: {:?} -> {:?}", id, current, next);
        self.states.insert(id, next);
        true
    }

    pub fn forget(&mut self, id: BreakpointId) {
        self.states.remove(&id);
        self.pending_removals.remove(&id);
    }

    /// Everything back to unarmed (detach)
    pub fn reset(&mut self) {
        self.states.clear();
        self.current = None;
    }

    pub fn is_suspended(&self) -> bool {
        self.current.is_some()
    }

    /// Apply the decided scope to a target the runtime already suspended
    /// according to `set_policy`. Returns the scope actually in effect.
    pub fn resolve(
        &mut self,
        runtime: &mut dyn Runtime,
        decided: SuspendScope,
        set_policy: SuspendPolicy,
        thread: Option<ThreadId>,
    ) -> RuntimeResult<SuspendScope> {
        let mut resume = Vec::new();
        match (decided, set_policy, thread) {
            (SuspendScope::None, _, _) => {
                release(runtime, set_policy, thread)?;
                return Ok(SuspendScope::None);
            }
            (SuspendScope::Thread(t), SuspendPolicy::EventThread, Some(set_thread)) if t == set_thread => {
                resume.push(ResumeAction::Thread(t));
            }
            (SuspendScope::Thread(t), _, _) => {
                runtime.suspend_thread(t)?;
                release(runtime, set_policy, thread)?;
                resume.push(ResumeAction::Thread(t));
            }
            (SuspendScope::All, SuspendPolicy::All, _) => {
                resume.push(ResumeAction::All);
            }
            (SuspendScope::All, _, _) => {
                runtime.suspend_all()?;
                resume.push(ResumeAction::All);
                // the event thread holds one extra suspension from the set
                if let (SuspendPolicy::EventThread, Some(t)) = (set_policy, thread) {
                    resume.push(ResumeAction::Thread(t));
                }
            }
        }
        debug!("Suspended at {:?}", decided);
        // a second stop before resume widens the existing pause
        let context = match self.current.take() {
            Some(mut previous) => {
                previous.scope = previous.scope.strongest(decided);
                previous.resume.extend(resume);
                previous
            }
            None => SuspendContext {
                scope: decided,
                thread,
                resume,
            },
        };
        self.current = Some(context);
        Ok(decided)
    }

    /// Release the current pause, if any
    pub fn resume(&mut self, runtime: &mut dyn Runtime) -> RuntimeResult<Option<SuspendContext>> {
        let Some(context) = self.current.take() else {
            return Ok(None);
        };
        for action in &context.resume {
            match action {
                ResumeAction::Thread(t) => runtime.resume_thread(*t)?,
                ResumeAction::All => runtime.resume_all()?,
            }
        }
        for state in self.states.values_mut() {
            if *state == ArmState::Stopped {
                *state = ArmState::Armed;
            }
        }
        Ok(Some(context))
    }

    pub fn defer_removal(&mut self, id: BreakpointId) {
        self.pending_removals.insert(id);
    }

    pub fn is_pending_removal(&self, id: BreakpointId) -> bool {
        self.pending_removals.contains(&id)
    }

    pub fn take_pending_removals(&mut self) -> Vec<BreakpointId> {
        std::mem::take(&mut self.pending_removals).into_iter().collect()
    }
}

/// Undo the suspension the runtime applied for an event set
pub fn release(
    runtime: &mut dyn Runtime,
    set_policy: SuspendPolicy,
    thread: Option<ThreadId>,
) -> RuntimeResult<()> {
    match (set_policy, thread) {
        (SuspendPolicy::None, _) => Ok(()),
        (SuspendPolicy::EventThread, Some(t)) => runtime.resume_thread(t),
        (SuspendPolicy::EventThread, None) => Ok(()),
        (SuspendPolicy::All, _) => runtime.resume_all(),
    }
}
