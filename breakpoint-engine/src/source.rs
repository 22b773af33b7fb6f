// Source index collaborator
//
// Read-only view of the project sources, used to re-resolve line-located
// breakpoints when they are reloaded.

use crate::types::SourcePosition;
use serde::{Deserialize, Serialize};

/// What a source position resolves to
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResolvedPosition {
    pub class_name: String,
    pub package: String,
    /// Enclosing method name, for method breakpoints
    pub method_name: Option<String>,
    pub method_signature: Option<String>,
    /// Field declared at the position, for field watchpoints
    pub field_name: Option<String>,
}

impl ResolvedPosition {
    pub fn new(class_name: impl Into<String>) -> Self {
        let class_name = class_name.into();
        Self {
            package: package_of(&class_name).to_string(),
            class_name,
            ..Default::default()
        }
    }
}

pub trait SourceIndex: Send + Sync {
    /// `None` when the position no longer maps to any class
    fn resolve(&self, position: &SourcePosition) -> Option<ResolvedPosition>;
}

/// Package part of a binary class name (`""` for the default package)
pub fn package_of(class_name: &str) -> &str {
    class_name.rsplit_once('.').map(|(pkg, _)| pkg).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_of() {
        assert_eq!(package_of("com.foo.Bar"), "com.foo");
        assert_eq!(package_of("Bar"), "");
        assert_eq!(ResolvedPosition::new("a.B$C").package, "a");
    }
}
