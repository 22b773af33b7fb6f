// Name filters
//
// Glob-style include/exclude matching used by class filters and caller filters.
// A `*` matches any run of characters; everything else is literal.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A single filter pattern that can be toggled on and off
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassFilter {
    pub pattern: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(skip)]
    compiled: OnceLock<Option<Regex>>,
}

fn enabled_by_default() -> bool {
    true
}

impl ClassFilter {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            enabled: true,
            compiled: OnceLock::new(),
        }
    }

    pub fn disabled(pattern: impl Into<String>) -> Self {
        Self {
            enabled: false,
            ..Self::new(pattern)
        }
    }

    /// Match `name` against the pattern, ignoring the enabled flag
    pub fn matches(&self, name: &str) -> bool {
        match self.compiled.get_or_init(|| glob_to_regex(&self.pattern)) {
            Some(regex) => regex.is_match(name),
            None => self.pattern == name,
        }
    }
}

impl PartialEq for ClassFilter {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.enabled == other.enabled
    }
}

impl Eq for ClassFilter {}

fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{}$", body)).ok()
}

/// Include/exclude pattern sets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    #[serde(default)]
    pub include: Vec<ClassFilter>,
    #[serde(default)]
    pub exclude: Vec<ClassFilter>,
}

impl FilterSet {
    pub fn new(include: Vec<ClassFilter>, exclude: Vec<ClassFilter>) -> Self {
        Self { include, exclude }
    }

    pub fn is_empty(&self) -> bool {
        !self.include.iter().chain(&self.exclude).any(|f| f.enabled)
    }

    pub fn matches(&self, name: &str) -> bool {
        matches(name, &self.include, &self.exclude)
    }
}

/// `name` passes iff (no enabled include OR some enabled include matches)
/// AND no enabled exclude matches.
pub fn matches(name: &str, include: &[ClassFilter], exclude: &[ClassFilter]) -> bool {
    let mut enabled_includes = include.iter().filter(|f| f.enabled).peekable();
    let included = enabled_includes.peek().is_none() || enabled_includes.any(|f| f.matches(name));
    included && !exclude.iter().any(|f| f.enabled && f.matches(name))
}

/// Caller filters match `Type#method(sig)` keys; a pattern without a signature
/// only sees `Type#method`.
pub fn caller_matches(full_key: &str, short_key: &str, filters: &FilterSet) -> bool {
    let key_for = |f: &ClassFilter| if f.pattern.contains('(') { full_key } else { short_key };
    let mut enabled_includes = filters.include.iter().filter(|f| f.enabled).peekable();
    let included =
        enabled_includes.peek().is_none() || enabled_includes.any(|f| f.matches(key_for(f)));
    included
        && !filters
            .exclude
            .iter()
            .any(|f| f.enabled && f.matches(key_for(f)))
}
