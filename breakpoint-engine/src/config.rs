// Engine settings
//
// Per-session knobs, loadable from JSON. Missing keys take their defaults.

use crate::category::Category;
use crate::error::EngineResult;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Stop when a condition fails to evaluate instead of continuing
    pub stop_on_condition_error: bool,
    /// Drop the thread filter whenever the session resumes
    pub clear_thread_filter_on_resume: bool,
    /// Categories that are never armed in this session
    pub disabled_categories: BTreeSet<Category>,
    pub command_channel_capacity: usize,
    pub notification_channel_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            stop_on_condition_error: false,
            clear_thread_filter_on_resume: true,
            disabled_categories: BTreeSet::new(),
            command_channel_capacity: 32,
            notification_channel_capacity: 256,
        }
    }
}

impl EngineSettings {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self::from_json(&text)?)
    }
}
