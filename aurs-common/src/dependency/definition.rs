// aurs-common/src/dependency/definition.rs
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::model::version::{split_dependency_line, VersionMatcher, VersionOperator};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DependencyTag: u8 {
        const RUNTIME  = 0b00000001;
        const BUILD    = 0b00000010;
        const TEST     = 0b00000100;
        const OPTIONAL = 0b00001000;
    }
}

impl Default for DependencyTag {
    fn default() -> Self {
        Self::RUNTIME
    }
}

impl fmt::Display for DependencyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One parsed line from a `depends`, `provides`, `conflicts`, ... array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencySpec {
    pub raw_line: String,
    pub package_name: String,
    pub operator: VersionOperator,
    pub version: Option<String>,
    #[serde(default)]
    pub tags: DependencyTag,
}

impl DependencySpec {
    pub fn parse(line: &str) -> Self {
        Self::parse_tagged(line, DependencyTag::RUNTIME)
    }

    pub fn parse_tagged(line: &str, tags: DependencyTag) -> Self {
        let (name, operator, version) = split_dependency_line(line);
        Self {
            raw_line: line.trim().to_string(),
            package_name: name.to_string(),
            operator,
            version: version.map(str::to_string),
            tags,
        }
    }

    pub fn parse_all<S: AsRef<str>>(lines: &[S], tags: DependencyTag) -> Vec<Self> {
        lines
            .iter()
            .map(|line| line.as_ref().trim())
            .filter(|line| !line.is_empty())
            .map(|line| Self::parse_tagged(line, tags))
            .collect()
    }

    pub fn matcher(&self) -> VersionMatcher {
        VersionMatcher::parse(&self.raw_line)
    }

    /// Whether `candidate` satisfies this line's version constraint.
    pub fn accepts_version(&self, candidate: &str) -> bool {
        self.matcher().matches(candidate)
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_line)
    }
}

pub trait DependencyExt {
    fn filter_by_tags(&self, include: DependencyTag, exclude: DependencyTag)
        -> Vec<&DependencySpec>;
}

impl DependencyExt for Vec<DependencySpec> {
    fn filter_by_tags(
        &self,
        include: DependencyTag,
        exclude: DependencyTag,
    ) -> Vec<&DependencySpec> {
        self.iter()
            .filter(|dep| dep.tags.intersects(include) && !dep.tags.intersects(exclude))
            .collect()
    }
}
