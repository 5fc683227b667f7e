// aurs-common/src/dependency/provides.rs
use std::collections::HashMap;
use std::sync::Arc;

use crate::dependency::DependencySpec;
use crate::model::{PackageRef, VersionMatcher};

#[derive(Debug, Clone)]
pub struct ProvidesEntry {
    pub provided_name: String,
    pub provider: Arc<PackageRef>,
    /// The `provides` line itself, e.g. `foo=1.0`.
    pub spec: DependencySpec,
}

impl ProvidesEntry {
    /// Version answered for the provided name: the one on the provides line,
    /// else the provider's own.
    pub fn effective_version(&self) -> &str {
        self.spec.version.as_deref().unwrap_or(&self.provider.version)
    }

    pub fn satisfies(&self, matcher: &VersionMatcher) -> bool {
        matcher.matches(self.effective_version())
    }
}

/// Reverse map from provided names to providers for one universe snapshot.
#[derive(Debug, Clone, Default)]
pub struct ProvidesIndex {
    entries: HashMap<String, Vec<ProvidesEntry>>,
}

impl ProvidesIndex {
    pub fn build<'a, I>(packages: I) -> Self
    where
        I: IntoIterator<Item = &'a Arc<PackageRef>>,
    {
        let mut entries: HashMap<String, Vec<ProvidesEntry>> = HashMap::new();
        for package in packages {
            for spec in &package.provides {
                entries
                    .entry(spec.package_name.clone())
                    .or_default()
                    .push(ProvidesEntry {
                        provided_name: spec.package_name.clone(),
                        provider: Arc::clone(package),
                        spec: spec.clone(),
                    });
            }
        }
        for providers in entries.values_mut() {
            providers.sort_by(|a, b| a.provider.name.cmp(&b.provider.name));
        }
        Self { entries }
    }

    /// All providers of `name`, ordered by provider name.
    pub fn lookup(&self, name: &str) -> &[ProvidesEntry] {
        self.entries.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// First provider, in name order, whose provided version satisfies `matcher`.
    pub fn find_satisfying(&self, matcher: &VersionMatcher) -> Option<&ProvidesEntry> {
        self.lookup(&matcher.package_name)
            .iter()
            .find(|entry| entry.satisfies(matcher))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackageSource;

    fn pkg(name: &str, version: &str, provides: &[&str]) -> Arc<PackageRef> {
        Arc::new(PackageRef::new(name, version, PackageSource::Repo).with_provides(provides))
    }

    #[test]
    fn test_lookup_is_ordered_by_provider_name() {
        let packages = vec![
            pkg("zsh-sh", "1", &["sh"]),
            pkg("bash", "5.2-1", &["sh"]),
            pkg("dash", "0.5", &["sh"]),
        ];
        let index = ProvidesIndex::build(&packages);
        let names: Vec<&str> = index
            .lookup("sh")
            .iter()
            .map(|e| e.provider.name.as_str())
            .collect();
        assert_eq!(names, vec!["bash", "dash", "zsh-sh"]);
        assert!(index.lookup("csh").is_empty());
    }

    #[test]
    fn test_versioned_provides_use_provided_version() {
        let packages = vec![
            pkg("java-runtime-a", "21.0.1-1", &["java-runtime=21"]),
            pkg("java-runtime-b", "17.0.9-1", &["java-runtime=17"]),
        ];
        let index = ProvidesIndex::build(&packages);
        let entry = index
            .find_satisfying(&VersionMatcher::parse("java-runtime>=21"))
            .unwrap();
        assert_eq!(entry.provider.name, "java-runtime-a");
        assert!(index
            .find_satisfying(&VersionMatcher::parse("java-runtime>=22"))
            .is_none());
    }

    #[test]
    fn test_unversioned_provides_fall_back_to_provider_version() {
        let packages = vec![pkg("libfoo-git", "2.1.r5-1", &["libfoo"])];
        let index = ProvidesIndex::build(&packages);
        assert!(index
            .find_satisfying(&VersionMatcher::parse("libfoo>=2"))
            .is_some());
    }
}
