// Breakpoint registry
//
// Every breakpoint of a session, keyed by id. Ids are never reused within a
// registry, so stale ids held by rules or requests cannot alias a new entry.

use crate::breakpoint::{Breakpoint, BreakpointKind, BreakpointProperties};
use crate::error::{EngineError, EngineResult};
use crate::types::BreakpointId;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct Registry {
    breakpoints: BTreeMap<BreakpointId, Breakpoint>,
    next_id: u32,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            breakpoints: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn insert(&mut self, kind: BreakpointKind, properties: BreakpointProperties) -> BreakpointId {
        let id = BreakpointId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.breakpoints
            .insert(id, Breakpoint::with_properties(id, kind, properties));
        id
    }

    /// Insert a breakpoint that already carries an id (restored from storage)
    pub fn restore(&mut self, breakpoint: Breakpoint) -> EngineResult<BreakpointId> {
        let id = breakpoint.id;
        if self.breakpoints.contains_key(&id) {
            return Err(EngineError::InvalidBreakpoint(
                id,
                "id already in use".to_string(),
            ));
        }
        self.next_id = self.next_id.max(id.0 + 1);
        self.breakpoints.insert(id, breakpoint);
        Ok(id)
    }

    pub fn get(&self, id: BreakpointId) -> Option<&Breakpoint> {
        self.breakpoints.get(&id)
    }

    pub fn get_mut(&mut self, id: BreakpointId) -> Option<&mut Breakpoint> {
        self.breakpoints.get_mut(&id)
    }

    pub fn require(&self, id: BreakpointId) -> EngineResult<&Breakpoint> {
        self.get(id).ok_or(EngineError::UnknownBreakpoint(id))
    }

    pub fn require_mut(&mut self, id: BreakpointId) -> EngineResult<&mut Breakpoint> {
        self.get_mut(id).ok_or(EngineError::UnknownBreakpoint(id))
    }

    pub fn remove(&mut self, id: BreakpointId) -> Option<Breakpoint> {
        self.breakpoints.remove(&id)
    }

    pub fn contains(&self, id: BreakpointId) -> bool {
        self.breakpoints.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<BreakpointId> {
        self.breakpoints.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.values()
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }
}
