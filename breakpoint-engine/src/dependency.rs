// Breakpoint dependency rules
//
// A slave breakpoint stays disabled until its master is hit. Each slave has
// at most one master; chains are allowed, cycles are not.

use crate::error::{EngineError, EngineResult};
use crate::types::BreakpointId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRule {
    pub master: BreakpointId,
    pub slave: BreakpointId,
    /// Keep the slave enabled after it has been hit once
    pub leave_enabled: bool,
}

/// Enable/disable changes requested by a hit
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HitEffects {
    pub enable: Vec<BreakpointId>,
    pub disable: Vec<BreakpointId>,
}

#[derive(Debug, Default)]
pub struct DependencyRules {
    by_slave: BTreeMap<BreakpointId, DependencyRule>,
}

impl DependencyRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, replacing any earlier rule for the same slave.
    /// Returns the replaced rule.
    pub fn install(&mut self, rule: DependencyRule) -> EngineResult<Option<DependencyRule>> {
        if self.would_cycle(rule.master, rule.slave) {
            return Err(EngineError::DependencyCycle {
                master: rule.master,
                slave: rule.slave,
            });
        }
        debug!("Installing dependency {} -> {}", rule.master, rule.slave);
        Ok(self.by_slave.insert(rule.slave, rule))
    }

    fn would_cycle(&self, master: BreakpointId, slave: BreakpointId) -> bool {
        let mut current = master;
        loop {
            if current == slave {
                return true;
            }
            match self.by_slave.get(&current) {
                Some(rule) => current = rule.master,
                None => return false,
            }
        }
    }

    pub fn remove(&mut self, slave: BreakpointId) -> Option<DependencyRule> {
        self.by_slave.remove(&slave)
    }

    /// Drop every rule that mentions `id` as master or slave
    pub fn remove_references(&mut self, id: BreakpointId) -> Vec<DependencyRule> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.by_slave)
            .into_values()
            .partition(|rule| rule.master == id || rule.slave == id);
        self.by_slave = kept.into_iter().map(|rule| (rule.slave, rule)).collect();
        removed
    }

    pub fn master_of(&self, slave: BreakpointId) -> Option<BreakpointId> {
        self.by_slave.get(&slave).map(|rule| rule.master)
    }

    pub fn slaves_of(&self, master: BreakpointId) -> Vec<BreakpointId> {
        self.by_slave
            .values()
            .filter(|rule| rule.master == master)
            .map(|rule| rule.slave)
            .collect()
    }

    pub fn rules(&self) -> impl Iterator<Item = &DependencyRule> {
        self.by_slave.values()
    }

    pub fn on_hit(&self, id: BreakpointId) -> HitEffects {
        let mut effects = HitEffects {
            enable: self.slaves_of(id),
            ..Default::default()
        };
        if let Some(rule) = self.by_slave.get(&id) {
            if !rule.leave_enabled {
                effects.disable.push(id);
            }
        }
        effects
    }
}
