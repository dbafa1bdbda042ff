//! Type, name and container filters for asset maps

use cabmap_formats::class_id::ClassId;
use regex::{Regex, RegexBuilder};

use crate::error::{IndexError, Result};

/// Acceptance rules for asset map entries
///
/// An empty rule set accepts everything. Name and container patterns are
/// case-insensitive regular expressions; a value passes when any pattern
/// matches somewhere in it.
#[derive(Debug, Clone, Default)]
pub struct AssetFilter {
    types: Vec<ClassId>,
    names: Vec<Regex>,
    containers: Vec<Regex>,
}

impl AssetFilter {
    /// Filter that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to `types`
    #[must_use]
    pub fn with_types(mut self, types: impl IntoIterator<Item = ClassId>) -> Self {
        self.types.extend(types);
        self
    }

    /// Require names to match one of `patterns`
    pub fn with_names<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self> {
        self.names.extend(compile("name", patterns)?);
        Ok(self)
    }

    /// Require containers to match one of `patterns`
    pub fn with_containers<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self> {
        self.containers.extend(compile("container", patterns)?);
        Ok(self)
    }

    /// Check the type rule
    pub fn accepts_type(&self, class_id: ClassId) -> bool {
        self.types.is_empty() || self.types.contains(&class_id)
    }

    /// Check the name rule
    pub fn accepts_name(&self, name: &str) -> bool {
        self.names.is_empty() || self.names.iter().any(|re| re.is_match(name))
    }

    /// Check the container rule
    pub fn accepts_container(&self, container: &str) -> bool {
        self.containers.is_empty() || self.containers.iter().any(|re| re.is_match(container))
    }
}

/// Compile case-insensitive patterns, rejecting empty ones
pub fn compile<S: AsRef<str>>(kind: &'static str, patterns: &[S]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            let pattern = pattern.as_ref();
            if pattern.is_empty() {
                return Err(IndexError::EmptyPattern(kind));
            }
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| IndexError::InvalidPattern {
                    kind,
                    pattern: pattern.to_string(),
                    source,
                })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_accepts_all() {
        let filter = AssetFilter::new();
        assert!(filter.accepts_type(ClassId::Unknown(12345)));
        assert!(filter.accepts_name(""));
        assert!(filter.accepts_container("anything"));
    }

    #[test]
    fn test_patterns_ignore_case_and_match_anywhere() {
        let filter = AssetFilter::new()
            .with_names(&["^hero", "boss"])
            .unwrap()
            .with_containers(&[r"\.prefab$"])
            .unwrap();
        assert!(filter.accepts_name("HERO_diffuse"));
        assert!(filter.accepts_name("final_Boss_mesh"));
        assert!(!filter.accepts_name("villain"));
        assert!(filter.accepts_container("Assets/Hero.PREFAB"));
        assert!(!filter.accepts_container("assets/hero.mat"));
    }

    #[test]
    fn test_type_rule() {
        let filter = AssetFilter::new().with_types([ClassId::Texture2D, ClassId::Sprite]);
        assert!(filter.accepts_type(ClassId::Sprite));
        assert!(!filter.accepts_type(ClassId::Animator));
    }

    #[test]
    fn test_bad_patterns() {
        assert!(matches!(
            AssetFilter::new().with_names(&[""]),
            Err(IndexError::EmptyPattern("name"))
        ));
        assert!(matches!(
            AssetFilter::new().with_containers(&["("]),
            Err(IndexError::InvalidPattern { kind: "container", .. })
        ));
    }
}
