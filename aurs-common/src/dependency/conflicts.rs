// aurs-common/src/dependency/conflicts.rs
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::model::{PackageRef, PackageSource};
use crate::universe::PackageUniverse;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
    /// name -> names it cannot coexist with. Always symmetric.
    pub conflicts: BTreeMap<String, BTreeSet<String>>,
    /// name -> names it replaces.
    pub replacements: BTreeMap<String, BTreeSet<String>>,
    /// Installed packages named by either map.
    pub installed: BTreeSet<String>,
}

impl ConflictReport {
    pub fn is_clear(&self) -> bool {
        self.conflicts.is_empty()
    }

    fn add_conflict(&mut self, a: &str, b: &str) {
        self.conflicts
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        self.conflicts
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
    }

    fn add_replacement(&mut self, replacer: &str, replaced: &str) {
        self.replacements
            .entry(replacer.to_string())
            .or_default()
            .insert(replaced.to_string());
    }

    /// Installed packages that have to go for the install to proceed.
    pub fn installed_to_remove(&self) -> Vec<String> {
        self.installed.iter().cloned().collect()
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, others) in &self.conflicts {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            let others: Vec<&str> = others.iter().map(String::as_str).collect();
            write!(f, "{name} conflicts with {}", others.join(", "))?;
        }
        Ok(())
    }
}

pub struct ConflictChecker<'a> {
    local: &'a PackageUniverse,
    /// Repository names, highest priority first.
    repo_priority: &'a [String],
}

impl<'a> ConflictChecker<'a> {
    pub fn new(local: &'a PackageUniverse, repo_priority: &'a [String]) -> Self {
        Self {
            local,
            repo_priority,
        }
    }

    /// Lower is better; AUR packages rank below every repository.
    fn priority(&self, package: &PackageRef) -> usize {
        match package.source {
            PackageSource::Registry => usize::MAX,
            _ => package
                .repository
                .as_ref()
                .and_then(|repo| self.repo_priority.iter().position(|r| r == repo))
                .unwrap_or(usize::MAX - 1),
        }
    }

    pub fn check(&self, install_set: &[Arc<PackageRef>]) -> ConflictReport {
        let mut report = ConflictReport::default();
        let installing: BTreeSet<&str> = install_set.iter().map(|p| p.name.as_str()).collect();

        for (i, package) in install_set.iter().enumerate() {
            for other in install_set.iter().skip(i + 1) {
                if package.name == other.name {
                    continue;
                }
                let forward = declares_conflict(package, other);
                let backward = declares_conflict(other, package);
                if !forward && !backward {
                    continue;
                }
                if replaces(package, other) && self.priority(package) < self.priority(other) {
                    report.add_replacement(&package.name, &other.name);
                } else if replaces(other, package) && self.priority(other) < self.priority(package)
                {
                    report.add_replacement(&other.name, &package.name);
                } else {
                    debug!("'{}' and '{}' conflict", package.name, other.name);
                    report.add_conflict(&package.name, &other.name);
                }
            }

            // Installed packages being reinstalled or upgraded are judged by
            // their new version, already covered above.
            for installed in self.local.iter() {
                if installing.contains(installed.name.as_str()) {
                    continue;
                }
                let conflicting =
                    declares_conflict(package, installed) || declares_conflict(installed, package);
                if replaces(package, installed) {
                    report.add_replacement(&package.name, &installed.name);
                    report.installed.insert(installed.name.clone());
                } else if conflicting {
                    debug!(
                        "'{}' conflicts with installed '{}'",
                        package.name, installed.name
                    );
                    report.add_conflict(&package.name, &installed.name);
                    report.installed.insert(installed.name.clone());
                }
            }
        }
        report
    }
}

fn declares_conflict(package: &PackageRef, other: &PackageRef) -> bool {
    package
        .conflicts
        .iter()
        .any(|spec| spec.package_name != package.name && other.satisfies(spec))
}

fn replaces(package: &PackageRef, other: &PackageRef) -> bool {
    package.replaces.iter().any(|spec| other.satisfies(spec))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aur(name: &str) -> PackageRef {
        PackageRef::new(name, "1.0-1", PackageSource::Registry)
    }

    fn repo(name: &str, repository: &str) -> PackageRef {
        PackageRef::new(name, "1.0-1", PackageSource::Repo).with_repository(repository)
    }

    fn check(local: Vec<PackageRef>, install: Vec<PackageRef>) -> ConflictReport {
        let local = PackageUniverse::new(PackageSource::Local, local);
        let priority = vec!["core".to_string(), "extra".to_string()];
        let install: Vec<Arc<PackageRef>> = install.into_iter().map(Arc::new).collect();
        ConflictChecker::new(&local, &priority).check(&install)
    }

    #[test]
    fn test_conflicts_are_symmetric() {
        let report = check(vec![], vec![aur("a").with_conflicts(&["b"]), aur("b")]);
        assert!(report.conflicts["a"].contains("b"));
        assert!(report.conflicts["b"].contains("a"));
        assert!(!report.is_clear());
    }

    #[test]
    fn test_conflict_through_provides_alias() {
        let report = check(
            vec![],
            vec![
                aur("vim-git").with_conflicts(&["vim"]),
                repo("gvim", "extra").with_provides(&["vim=9.1"]),
            ],
        );
        assert!(report.conflicts["vim-git"].contains("gvim"));
    }

    #[test]
    fn test_versioned_conflict_respected() {
        let report = check(
            vec![],
            vec![aur("a").with_conflicts(&["b<1.0"]), aur("b")],
        );
        assert!(report.is_clear());
    }

    #[test]
    fn test_installed_conflicts_both_directions() {
        let report = check(
            vec![PackageRef::new("old", "1-1", PackageSource::Local).with_conflicts(&["new"])],
            vec![aur("new")],
        );
        assert!(report.conflicts["new"].contains("old"));
        assert!(report.conflicts["old"].contains("new"));
    }

    #[test]
    fn test_upgraded_package_judged_by_new_version() {
        let report = check(
            vec![
                PackageRef::new("a", "0.9-1", PackageSource::Local).with_conflicts(&["b"]),
                PackageRef::new("b", "1-1", PackageSource::Local),
            ],
            vec![aur("a")],
        );
        assert!(report.is_clear());
    }

    #[test]
    fn test_replacement_of_installed_package() {
        let local_pkg = PackageRef::new("foo", "1-1", PackageSource::Local);
        let report = check(
            vec![local_pkg],
            vec![aur("foo-ng").with_conflicts(&["foo"]).with_replaces(&["foo"])],
        );
        assert!(report.is_clear());
        assert!(report.replacements["foo-ng"].contains("foo"));
        assert_eq!(report.installed_to_remove(), vec!["foo".to_string()]);
    }

    #[test]
    fn test_higher_priority_replacer_demotes_conflict() {
        let report = check(
            vec![],
            vec![
                repo("newlib", "core").with_conflicts(&["oldlib"]).with_replaces(&["oldlib"]),
                aur("oldlib"),
            ],
        );
        assert!(report.is_clear());
        assert!(report.replacements["newlib"].contains("oldlib"));
    }

    #[test]
    fn test_lower_priority_replacer_stays_conflict() {
        let report = check(
            vec![],
            vec![
                aur("newlib").with_conflicts(&["oldlib"]).with_replaces(&["oldlib"]),
                repo("oldlib", "extra"),
            ],
        );
        assert!(report.conflicts["newlib"].contains("oldlib"));
    }
}
