// Line breakpoints
//
// Resolved through the class that owns the source line. Nested and anonymous
// classes (`Outer$...`) compile to separate types, so the wait also covers them.

use crate::breakpoint::{CategoryBehavior, WaitTarget};
use crate::category::Category;
use crate::error::EngineResult;
use crate::eventrequest::RequestKind;
use crate::filter::ClassFilter;
use crate::runtime::Runtime;
use crate::source::SourceIndex;
use crate::types::{SourcePosition, TypeInfo};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineBreakpoint {
    pub position: SourcePosition,
    /// Top-level class owning the line, recomputed on reload
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
}

impl LineBreakpoint {
    pub fn new(file: impl Into<String>, line: u32, class_name: Option<&str>) -> Self {
        Self {
            position: SourcePosition {
                file: file.into(),
                line,
            },
            class_name: class_name.map(str::to_string),
            package: class_name.map(|c| crate::source::package_of(c).to_string()),
        }
    }
}

impl CategoryBehavior for LineBreakpoint {
    fn category(&self) -> Category {
        Category::Line
    }

    fn describe(&self) -> String {
        self.position.to_string()
    }

    fn wait_targets(&self) -> Result<Vec<WaitTarget>, String> {
        let class_name = self
            .class_name
            .as_ref()
            .ok_or_else(|| format!("No class found for {}", self.position))?;
        Ok(vec![
            WaitTarget::Exact(class_name.clone()),
            WaitTarget::Pattern(ClassFilter::new(format!("{}$*", class_name))),
        ])
    }

    fn create_requests(
        &self,
        runtime: &dyn Runtime,
        ty: &TypeInfo,
        _target: &WaitTarget,
    ) -> EngineResult<Vec<RequestKind>> {
        let locations = runtime.line_locations(ty, self.position.line)?;
        Ok(locations
            .into_iter()
            .map(|location| RequestKind::Breakpoint { location })
            .collect())
    }

    fn position(&self) -> Option<&SourcePosition> {
        Some(&self.position)
    }

    fn reload(&mut self, index: &dyn SourceIndex) -> Result<(), String> {
        match index.resolve(&self.position) {
            Some(resolved) => {
                self.class_name = Some(resolved.class_name);
                self.package = Some(resolved.package);
                Ok(())
            }
            None => {
                self.class_name = None;
                self.package = None;
                Err(format!("No executable code found at {}", self.position))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockRuntime, MockSourceIndex};
    use crate::source::ResolvedPosition;

    #[test]
    fn test_wait_targets_cover_nested_classes() {
        let bp = LineBreakpoint::new("Foo.java", 10, Some("pkg.Foo"));
        let targets = bp.wait_targets().unwrap();
        assert_eq!(targets[0], WaitTarget::Exact("pkg.Foo".to_string()));
        let nested = TypeInfo {
            type_id: 2,
            name: "pkg.Foo$1".to_string(),
            supertypes: vec![],
            mod_bits: 0,
        };
        assert!(targets[1].matches(&nested));
    }

    #[test]
    fn test_unresolved_class_is_invalid() {
        let bp = LineBreakpoint::new("Foo.java", 10, None);
        assert_eq!(
            bp.wait_targets().unwrap_err(),
            "No class found for Foo.java:10"
        );
    }

    #[test]
    fn test_one_request_per_location() {
        let mut runtime = MockRuntime::new();
        let ty = runtime.load_class("pkg.Foo");
        runtime.add_line(&ty, 10, 2);

        let bp = LineBreakpoint::new("Foo.java", 10, Some("pkg.Foo"));
        let target = WaitTarget::Exact("pkg.Foo".to_string());
        let requests = bp.create_requests(&runtime, &ty, &target).unwrap();
        assert_eq!(requests.len(), 2);

        let other = LineBreakpoint::new("Foo.java", 11, Some("pkg.Foo"));
        assert!(other.create_requests(&runtime, &ty, &target).unwrap().is_empty());
    }

    #[test]
    fn test_reload_tracks_moved_class() {
        let mut index = MockSourceIndex::default();
        let position = SourcePosition {
            file: "Foo.java".to_string(),
            line: 10,
        };
        index.insert(position.clone(), ResolvedPosition::new("pkg.moved.Foo"));

        let mut bp = LineBreakpoint::new("Foo.java", 10, Some("pkg.Foo"));
        bp.reload(&index).unwrap();
        assert_eq!(bp.class_name.as_deref(), Some("pkg.moved.Foo"));
        assert_eq!(bp.package.as_deref(), Some("pkg.moved"));

        let mut gone = LineBreakpoint::new("Foo.java", 99, Some("pkg.Foo"));
        assert!(gone.reload(&index).is_err());
        assert!(gone.class_name.is_none());
    }
}
