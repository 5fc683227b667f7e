// aurs-common/src/universe.rs
//! Package universes (repositories, installed packages, AUR) and the traits
//! the resolver queries them through.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::dependency::{ProvidesEntry, ProvidesIndex};
use crate::error::Result;
use crate::model::{PackageRef, PackageSource, VersionMatcher};

/// Repo and local package enumeration, implemented over pacman in `aurs-core`.
pub trait PackageDatabase: Send + Sync {
    fn repo_packages(&self) -> Result<Vec<PackageRef>>;
    fn local_packages(&self) -> Result<Vec<PackageRef>>;
    /// Configured repository names, highest priority first.
    fn repo_priority(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Bulk info lookup against the AUR.
pub trait RegistryClient: Send + Sync {
    /// Records for the names that exist; unknown names are simply absent.
    fn info(&self, names: &[String]) -> Result<Vec<PackageRef>>;
}

/// Outcome of looking a dependency up in one universe.
#[derive(Debug)]
pub enum Satisfaction<'a> {
    Exact(&'a Arc<PackageRef>),
    Provided(&'a ProvidesEntry),
    /// The name exists but no candidate's version fits.
    Mismatch { found: Vec<String> },
    Missing,
}

/// Immutable snapshot of one universe.
#[derive(Debug)]
pub struct PackageUniverse {
    source: PackageSource,
    packages: BTreeMap<String, Arc<PackageRef>>,
    provides: OnceLock<ProvidesIndex>,
}

impl PackageUniverse {
    /// Builds the snapshot. When a name appears more than once (pacman lists
    /// one record per repository, highest priority first) the first wins.
    pub fn new(source: PackageSource, packages: Vec<PackageRef>) -> Self {
        let mut by_name = BTreeMap::new();
        for package in packages {
            by_name
                .entry(package.name.clone())
                .or_insert_with(|| Arc::new(package));
        }
        Self {
            source,
            packages: by_name,
            provides: OnceLock::new(),
        }
    }

    pub fn empty(source: PackageSource) -> Self {
        Self::new(source, Vec::new())
    }

    pub fn source(&self) -> PackageSource {
        self.source
    }

    pub fn get(&self, name: &str) -> Option<&Arc<PackageRef>> {
        self.packages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PackageRef>> {
        self.packages.values()
    }

    pub fn provides(&self) -> &ProvidesIndex {
        self.provides.get_or_init(|| {
            let index = ProvidesIndex::build(self.packages.values());
            debug!(
                "Built provides index for {} ({} provided names)",
                self.source,
                index.len()
            );
            index
        })
    }

    /// Exact name first, then provides. A version mismatch is only reported
    /// when no candidate at all fits.
    pub fn find_satisfier(&self, matcher: &VersionMatcher) -> Satisfaction<'_> {
        let mut found = Vec::new();
        if let Some(package) = self.packages.get(&matcher.package_name) {
            if matcher.matches(&package.version) {
                return Satisfaction::Exact(package);
            }
            found.push(package.version.clone());
        }
        let providers = self.provides().lookup(&matcher.package_name);
        if let Some(entry) = providers.iter().find(|entry| entry.satisfies(matcher)) {
            return Satisfaction::Provided(entry);
        }
        found.extend(providers.iter().map(|entry| {
            format!("{} (via {})", entry.effective_version(), entry.provider.name)
        }));
        if found.is_empty() {
            Satisfaction::Missing
        } else {
            Satisfaction::Mismatch { found }
        }
    }

    /// Whether anything in this universe satisfies `matcher`.
    pub fn satisfies(&self, matcher: &VersionMatcher) -> bool {
        matches!(
            self.find_satisfier(matcher),
            Satisfaction::Exact(_) | Satisfaction::Provided(_)
        )
    }
}

/// Append-only cache of AUR lookups for one run.
#[derive(Debug, Default)]
pub struct RegistryMemo {
    packages: HashMap<String, Arc<PackageRef>>,
    missing: HashSet<String>,
}

impl RegistryMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the records for `names` that exist, querying only names not
    /// seen before.
    pub fn fetch(
        &mut self,
        client: &dyn RegistryClient,
        names: &[String],
    ) -> Result<Vec<Arc<PackageRef>>> {
        let mut unknown: Vec<String> = names
            .iter()
            .filter(|name| !self.packages.contains_key(*name) && !self.missing.contains(*name))
            .cloned()
            .collect();
        unknown.sort();
        unknown.dedup();

        if !unknown.is_empty() {
            debug!("Querying AUR for {} package(s)", unknown.len());
            for package in client.info(&unknown)? {
                self.packages
                    .insert(package.name.clone(), Arc::new(package));
            }
            for name in unknown {
                if !self.packages.contains_key(&name) {
                    self.missing.insert(name);
                }
            }
        }

        Ok(names
            .iter()
            .filter_map(|name| self.packages.get(name).cloned())
            .collect())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<PackageRef>> {
        self.packages.get(name)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct CountingRegistry {
        known: Vec<PackageRef>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl RegistryClient for CountingRegistry {
        fn info(&self, names: &[String]) -> Result<Vec<PackageRef>> {
            self.calls.lock().unwrap().push(names.to_vec());
            Ok(self
                .known
                .iter()
                .filter(|p| names.contains(&p.name))
                .cloned()
                .collect())
        }
    }

    #[test]
    fn test_exact_name_preferred_over_provides() {
        let universe = PackageUniverse::new(
            PackageSource::Repo,
            vec![
                PackageRef::new("foo", "1.0-1", PackageSource::Repo),
                PackageRef::new("afoo", "9.0-1", PackageSource::Repo).with_provides(&["foo=9.0"]),
            ],
        );
        match universe.find_satisfier(&VersionMatcher::parse("foo")) {
            Satisfaction::Exact(pkg) => assert_eq!(pkg.name, "foo"),
            other => panic!("expected exact match, got {other:?}"),
        }
        // The exact package is too old, so the provider takes over.
        match universe.find_satisfier(&VersionMatcher::parse("foo>=2")) {
            Satisfaction::Provided(entry) => assert_eq!(entry.provider.name, "afoo"),
            other => panic!("expected provider, got {other:?}"),
        }
    }

    #[test]
    fn test_first_record_of_a_name_wins() {
        let universe = PackageUniverse::new(
            PackageSource::Repo,
            vec![
                PackageRef::new("foo", "2.0-1", PackageSource::Repo).with_repository("core-testing"),
                PackageRef::new("foo", "1.0-1", PackageSource::Repo).with_repository("core"),
            ],
        );
        let foo = universe.get("foo").unwrap();
        assert_eq!(foo.repository.as_deref(), Some("core-testing"));
        assert_eq!(foo.version, "2.0-1");
        assert_eq!(universe.len(), 1);
    }

    #[test]
    fn test_mismatch_lists_found_versions() {
        let universe = PackageUniverse::new(
            PackageSource::Local,
            vec![PackageRef::new("foo", "1.0-1", PackageSource::Local)],
        );
        match universe.find_satisfier(&VersionMatcher::parse("foo>=2")) {
            Satisfaction::Mismatch { found } => assert_eq!(found, vec!["1.0-1".to_string()]),
            other => panic!("expected mismatch, got {other:?}"),
        }
        assert!(matches!(
            universe.find_satisfier(&VersionMatcher::parse("bar")),
            Satisfaction::Missing
        ));
    }

    #[test]
    fn test_memo_queries_each_name_once() {
        let registry = CountingRegistry {
            known: vec![PackageRef::new("yay", "12.0-1", PackageSource::Registry)],
            calls: Mutex::new(Vec::new()),
        };
        let mut memo = RegistryMemo::new();
        let names = vec!["yay".to_string(), "nope".to_string()];
        let first = memo.fetch(&registry, &names).unwrap();
        let second = memo.fetch(&registry, &names).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(registry.calls.lock().unwrap().len(), 1);
    }
}
