// aurs-common/src/model/package.rs
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dependency::{DependencySpec, DependencyTag};

/// Suffixes marking a package built from a VCS checkout.
pub const DEVEL_SUFFIXES: &[&str] = &["-git", "-svn", "-hg", "-bzr", "-darcs", "-cvs", "-fossil"];

pub fn is_devel_name(name: &str) -> bool {
    DEVEL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PackageSource {
    Repo,
    Local,
    Registry,
}

impl fmt::Display for PackageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageSource::Repo => write!(f, "repositories"),
            PackageSource::Local => write!(f, "installed packages"),
            PackageSource::Registry => write!(f, "AUR"),
        }
    }
}

/// Immutable snapshot of one package as seen by a single universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    pub version: String,
    pub source: PackageSource,
    pub package_base: String,
    /// Repository name for `Repo` packages.
    pub repository: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub maintainer: Option<String>,
    pub num_votes: u64,
    pub popularity: f64,
    pub out_of_date: Option<i64>,
    pub last_modified: Option<i64>,
    pub provides: Vec<DependencySpec>,
    pub conflicts: Vec<DependencySpec>,
    pub replaces: Vec<DependencySpec>,
    pub depends: Vec<DependencySpec>,
    pub make_depends: Vec<DependencySpec>,
    pub check_depends: Vec<DependencySpec>,
    pub opt_depends: Vec<DependencySpec>,
}

impl PackageRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>, source: PackageSource) -> Self {
        let name = name.into();
        Self {
            package_base: name.clone(),
            name,
            version: version.into(),
            source,
            repository: None,
            description: None,
            url: None,
            maintainer: None,
            num_votes: 0,
            popularity: 0.0,
            out_of_date: None,
            last_modified: None,
            provides: Vec::new(),
            conflicts: Vec::new(),
            replaces: Vec::new(),
            depends: Vec::new(),
            make_depends: Vec::new(),
            check_depends: Vec::new(),
            opt_depends: Vec::new(),
        }
    }

    pub fn with_base(mut self, package_base: impl Into<String>) -> Self {
        self.package_base = package_base.into();
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn with_depends(mut self, lines: &[&str]) -> Self {
        self.depends = DependencySpec::parse_all(lines, DependencyTag::RUNTIME);
        self
    }

    pub fn with_make_depends(mut self, lines: &[&str]) -> Self {
        self.make_depends = DependencySpec::parse_all(lines, DependencyTag::BUILD);
        self
    }

    pub fn with_check_depends(mut self, lines: &[&str]) -> Self {
        self.check_depends = DependencySpec::parse_all(lines, DependencyTag::TEST);
        self
    }

    pub fn with_provides(mut self, lines: &[&str]) -> Self {
        self.provides = DependencySpec::parse_all(lines, DependencyTag::empty());
        self
    }

    pub fn with_conflicts(mut self, lines: &[&str]) -> Self {
        self.conflicts = DependencySpec::parse_all(lines, DependencyTag::empty());
        self
    }

    pub fn with_replaces(mut self, lines: &[&str]) -> Self {
        self.replaces = DependencySpec::parse_all(lines, DependencyTag::empty());
        self
    }

    pub fn is_devel(&self) -> bool {
        is_devel_name(&self.name) || is_devel_name(&self.package_base)
    }

    /// Runtime, build and (optionally) check dependencies, in that order.
    pub fn build_dependencies(&self, include_check: bool) -> impl Iterator<Item = &DependencySpec> {
        let check: &[DependencySpec] = if include_check {
            &self.check_depends
        } else {
            &[]
        };
        self.depends
            .iter()
            .chain(self.make_depends.iter())
            .chain(check.iter())
    }

    /// Whether this package answers to `spec`, either by its own name or
    /// through one of its `provides` entries, honoring versions.
    pub fn satisfies(&self, spec: &DependencySpec) -> bool {
        let matcher = spec.matcher();
        if self.name == spec.package_name && matcher.matches(&self.version) {
            return true;
        }
        self.provides.iter().any(|provided| {
            provided.package_name == spec.package_name
                && matcher.matches(provided.version.as_deref().unwrap_or(&self.version))
        })
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_devel_detection() {
        assert!(PackageRef::new("neovim-git", "r1", PackageSource::Registry).is_devel());
        assert!(
            PackageRef::new("libfoo", "r1", PackageSource::Registry)
                .with_base("foo-hg")
                .is_devel()
        );
        assert!(!PackageRef::new("gitg", "1", PackageSource::Registry).is_devel());
    }

    #[test]
    fn test_satisfies_by_name_and_provides() {
        let pkg = PackageRef::new("foo-git", "2.0-1", PackageSource::Registry)
            .with_provides(&["foo=1.5", "libfoo.so"]);
        assert!(pkg.satisfies(&DependencySpec::parse("foo-git>=2")));
        assert!(pkg.satisfies(&DependencySpec::parse("foo>=1.5")));
        assert!(!pkg.satisfies(&DependencySpec::parse("foo>=2")));
        // An unversioned provide answers with the provider's own version.
        assert!(pkg.satisfies(&DependencySpec::parse("libfoo.so>=2")));
    }

    #[test]
    fn test_build_dependencies_respects_check_flag() {
        let pkg = PackageRef::new("a", "1", PackageSource::Registry)
            .with_depends(&["b"])
            .with_make_depends(&["c"])
            .with_check_depends(&["d"]);
        assert_eq!(pkg.build_dependencies(true).count(), 3);
        assert_eq!(pkg.build_dependencies(false).count(), 2);
    }
}
