// aurs-core/src/build/ledger.rs
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use aurs_common::dependency::DependencySpec;
use aurs_common::model::PackageRef;

/// What every unit in a run produces, what has been built so far and which
/// package bases were given up on.
#[derive(Debug, Default)]
pub struct ArtifactLedger {
    producers: Vec<Arc<PackageRef>>,
    owners: BTreeMap<String, String>,
    built: BTreeMap<String, PathBuf>,
    failed_bases: BTreeSet<String>,
    up_to_date_bases: BTreeSet<String>,
}

impl ArtifactLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `members` as the output of `package_base`, replacing what was
    /// registered for it before.
    pub fn register(&mut self, package_base: &str, members: &[Arc<PackageRef>]) {
        let owners = &self.owners;
        self.producers
            .retain(|member| owners.get(&member.name).map(String::as_str) != Some(package_base));
        self.owners.retain(|_, base| base != package_base);
        for member in members {
            self.owners
                .insert(member.name.clone(), package_base.to_string());
            self.producers.push(Arc::clone(member));
        }
    }

    /// Name of the member package answering to `spec`, by name or provides.
    pub fn producer(&self, spec: &DependencySpec) -> Option<&str> {
        self.producers
            .iter()
            .find(|member| member.name == spec.package_name && member.satisfies(spec))
            .or_else(|| self.producers.iter().find(|member| member.satisfies(spec)))
            .map(|member| member.name.as_str())
    }

    pub fn owner_of(&self, package: &str) -> Option<&str> {
        self.owners.get(package).map(String::as_str)
    }

    pub fn record_built(&mut self, artifacts: &BTreeMap<String, PathBuf>) {
        self.built
            .extend(artifacts.iter().map(|(name, path)| (name.clone(), path.clone())));
    }

    pub fn artifact(&self, package: &str) -> Option<&PathBuf> {
        self.built.get(package)
    }

    pub fn mark_failed(&mut self, package_base: &str) {
        self.failed_bases.insert(package_base.to_string());
    }

    pub fn mark_up_to_date(&mut self, package_base: &str) {
        self.up_to_date_bases.insert(package_base.to_string());
    }

    /// Whether the unit producing `package` was skipped because its members
    /// are installed at the wanted version already.
    pub fn is_up_to_date(&self, package: &str) -> bool {
        self.owner_of(package)
            .is_some_and(|base| self.up_to_date_bases.contains(base))
    }

    /// Whether the unit producing `package` failed or was skipped.
    pub fn is_failed(&self, package: &str) -> bool {
        self.owner_of(package)
            .is_some_and(|base| self.failed_bases.contains(base))
    }
}
