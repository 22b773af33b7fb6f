// Breakpoint categories
//
// Static registry of every breakpoint kind the engine knows about. Sessions only
// share this table, so it is fixed at compile time.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Line,
    Method,
    Field,
    Exception,
    AnyException,
    WildcardMethod,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Line,
        Category::Method,
        Category::Field,
        Category::Exception,
        Category::AnyException,
        Category::WildcardMethod,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Line => "line",
            Category::Method => "method",
            Category::Field => "field",
            Category::Exception => "exception",
            Category::AnyException => "any_exception",
            Category::WildcardMethod => "wildcard_method",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| EngineError::UnknownCategory(s.to_string()))
    }
}
