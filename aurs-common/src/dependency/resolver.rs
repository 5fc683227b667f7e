// FILE: aurs-common/src/dependency/resolver.rs

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, error, instrument, warn};

use crate::dependency::ProvidesIndex;
use crate::error::{AursError, Result};
use crate::model::{PackageRef, PackageSource, VersionMatcher};
use crate::universe::{PackageUniverse, RegistryClient, RegistryMemo, Satisfaction};

// --- ResolutionContext ---
pub struct ResolutionContext<'a> {
    pub repo: &'a PackageUniverse,
    pub local: &'a PackageUniverse,
    pub registry: &'a dyn RegistryClient,
    pub memo: &'a mut RegistryMemo,
    /// Whether `checkdepends` take part in resolution (`--nocheck` clears it).
    pub include_check_depends: bool,
}

// --- ResolutionNode ---
#[derive(Debug, Clone)]
pub struct ResolutionNode {
    pub name: String,
    pub package: Arc<PackageRef>,
    pub required_by: Vec<String>,
    /// Packages that answered for `name` through `provides`.
    pub provided_by: Vec<Arc<PackageRef>>,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    /// Names the user asked for.
    pub targets: Vec<String>,
    /// Every AUR package to build, keyed by package name.
    pub nodes: BTreeMap<String, ResolutionNode>,
    /// Repository packages to install as dependencies, keyed by the
    /// dependency name that pulled them in.
    pub repo_dependencies: BTreeMap<String, ResolutionNode>,
    /// Names moved from "installed but too old" to the AUR set.
    pub escalated: BTreeSet<String>,
    /// AUR package -> AUR packages it depends on.
    pub edges: BTreeMap<String, BTreeSet<String>>,
}

impl ResolvedGraph {
    pub fn registry_packages(&self) -> impl Iterator<Item = &Arc<PackageRef>> {
        self.nodes.values().map(|node| &node.package)
    }

    pub fn is_target(&self, name: &str) -> bool {
        self.targets.iter().any(|target| target == name)
    }

    /// Repository package names to install, deduplicated.
    pub fn repo_packages_to_install(&self) -> Vec<String> {
        let names: BTreeSet<String> = self
            .repo_dependencies
            .values()
            .map(|node| node.package.name.clone())
            .collect();
        names.into_iter().collect()
    }

    /// Package base -> member packages.
    pub fn package_bases(&self) -> BTreeMap<String, Vec<Arc<PackageRef>>> {
        let mut bases: BTreeMap<String, Vec<Arc<PackageRef>>> = BTreeMap::new();
        for package in self.registry_packages() {
            bases
                .entry(package.package_base.clone())
                .or_default()
                .push(Arc::clone(package));
        }
        bases
    }

    /// Package base -> bases it needs built first. Every base is a key.
    pub fn base_dependencies(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut deps: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (from, targets) in &self.edges {
            let Some(from_base) = self.nodes.get(from).map(|n| n.package.package_base.clone())
            else {
                continue;
            };
            let entry = deps.entry(from_base.clone()).or_default();
            for to in targets {
                if let Some(node) = self.nodes.get(to) {
                    if node.package.package_base != from_base {
                        entry.insert(node.package.package_base.clone());
                    }
                }
            }
        }
        for package in self.registry_packages() {
            deps.entry(package.package_base.clone()).or_default();
        }
        deps
    }

    /// Package bases in dependency order, or `DependencyCycle`.
    pub fn build_order(&self) -> Result<Vec<String>> {
        topological_sort(&self.base_dependencies())
    }
}

/// Kahn's algorithm over `node -> dependencies`; dependencies come first.
/// Nodes left over once no node has zero pending dependencies form
/// `DependencyCycle`.
pub fn topological_sort(dependencies: &BTreeMap<String, BTreeSet<String>>) -> Result<Vec<String>> {
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut sorted_list = Vec::with_capacity(dependencies.len());
    let mut queue = VecDeque::new();

    for (node, deps) in dependencies {
        let known: Vec<&str> = deps
            .iter()
            .map(String::as_str)
            .filter(|dep| *dep != node.as_str() && dependencies.contains_key(*dep))
            .collect();
        in_degree.insert(node.as_str(), known.len());
        for dep in known {
            dependents.entry(dep).or_default().push(node.as_str());
        }
    }

    for (node, degree) in &in_degree {
        if *degree == 0 {
            queue.push_back(*node);
        }
    }

    while let Some(node) = queue.pop_front() {
        sorted_list.push(node.to_string());
        if let Some(children) = dependents.get(node) {
            for child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(*child);
                    }
                }
            }
        }
    }

    if sorted_list.len() != dependencies.len() {
        let residual: Vec<String> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(node, _)| node.to_string())
            .collect();
        error!("Dependency cycle detected among: {:?}", residual);
        return Err(AursError::DependencyCycle { units: residual });
    }
    Ok(sorted_list)
}

enum Satisfier {
    Repo {
        package: Arc<PackageRef>,
        via_provides: bool,
    },
    Local,
}

struct RepoRequirement {
    package: Arc<PackageRef>,
    required_by: BTreeSet<String>,
    via_provides: bool,
}

pub struct DependencyResolver<'a> {
    context: ResolutionContext<'a>,
    escalated: BTreeSet<String>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(context: ResolutionContext<'a>) -> Self {
        Self {
            context,
            escalated: BTreeSet::new(),
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub fn resolve_targets(&mut self, targets: &[String]) -> Result<ResolvedGraph> {
        debug!("Starting dependency resolution for targets: {:?}", targets);
        let mut requested: Vec<String> = Vec::new();
        for target in targets {
            if !requested.contains(target) {
                requested.push(target.clone());
            }
        }

        loop {
            let err = match self.resolve_pass(&requested) {
                Ok(mut graph) => {
                    graph.targets = targets.to_vec();
                    graph.escalated = self.escalated.clone();
                    debug!(
                        "Resolution finished: {} AUR package(s), {} repo dependencies",
                        graph.nodes.len(),
                        graph.repo_dependencies.len()
                    );
                    return Ok(graph);
                }
                Err(err) => err,
            };

            let name = match &err {
                AursError::DependencyVersionMismatch {
                    location: PackageSource::Local,
                    depends_on,
                    ..
                } if !self.escalated.contains(depends_on) => depends_on.clone(),
                _ => return Err(err),
            };

            let found = self
                .context
                .memo
                .fetch(self.context.registry, std::slice::from_ref(&name))?;
            if found.is_empty() {
                return Err(err);
            }

            warn!("Installed '{name}' does not satisfy a dependency, building it from the AUR instead");
            self.escalated.insert(name.clone());
            if !requested.contains(&name) {
                requested.push(name);
            }
        }
    }

    fn resolve_pass(&mut self, requested: &[String]) -> Result<ResolvedGraph> {
        let mut accumulated: BTreeMap<String, Arc<PackageRef>> = BTreeMap::new();
        let mut wanted_by: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut repo_requirements: BTreeMap<String, RepoRequirement> = BTreeMap::new();
        let mut deferred: Vec<(String, VersionMatcher)> = Vec::new();
        let mut frontier: Vec<String> = requested.to_vec();

        while !frontier.is_empty() {
            let fetched = self.fetch_frontier(&frontier, &wanted_by)?;
            for package in &fetched {
                accumulated.insert(package.name.clone(), Arc::clone(package));
                edges.entry(package.name.clone()).or_default();
            }
            let registry_provides = ProvidesIndex::build(accumulated.values());

            let mut next: BTreeSet<String> = BTreeSet::new();
            for package in &fetched {
                for (dep_name, matcher) in
                    combined_requirements(package, self.context.include_check_depends)
                {
                    match self.satisfy_outside_registry(&package.name, &matcher)? {
                        Some(Satisfier::Repo {
                            package: provider,
                            via_provides,
                        }) => {
                            if !self.context.local.satisfies(&matcher) {
                                repo_requirements
                                    .entry(dep_name)
                                    .or_insert_with(|| RepoRequirement {
                                        package: provider,
                                        required_by: BTreeSet::new(),
                                        via_provides,
                                    })
                                    .required_by
                                    .insert(package.name.clone());
                            }
                            continue;
                        }
                        Some(Satisfier::Local) => continue,
                        None => {}
                    }

                    wanted_by
                        .entry(dep_name.clone())
                        .or_default()
                        .insert(package.name.clone());

                    if let Some(existing) = accumulated.get(&dep_name) {
                        if !matcher.matches(&existing.version) {
                            return Err(version_mismatch(
                                &package.name,
                                &matcher,
                                vec![existing.version.clone()],
                                PackageSource::Registry,
                            ));
                        }
                        add_edge(&mut edges, &package.name, &existing.name);
                    } else if let Some(entry) = registry_provides.find_satisfying(&matcher) {
                        add_edge(&mut edges, &package.name, &entry.provider.name);
                    } else if !registry_provides.lookup(&dep_name).is_empty() {
                        let found = registry_provides
                            .lookup(&dep_name)
                            .iter()
                            .map(|e| format!("{} (via {})", e.effective_version(), e.provider.name))
                            .collect();
                        return Err(version_mismatch(
                            &package.name,
                            &matcher,
                            found,
                            PackageSource::Registry,
                        ));
                    } else {
                        next.insert(dep_name);
                        deferred.push((package.name.clone(), matcher));
                    }
                }
            }
            frontier = next
                .into_iter()
                .filter(|name| !accumulated.contains_key(name))
                .collect();
        }

        for (who, matcher) in deferred {
            if let Some(found) = accumulated.get(&matcher.package_name) {
                if !matcher.matches(&found.version) {
                    return Err(version_mismatch(
                        &who,
                        &matcher,
                        vec![found.version.clone()],
                        PackageSource::Registry,
                    ));
                }
                add_edge(&mut edges, &who, &found.name);
            }
        }

        let mut dependents: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (from, targets) in &edges {
            for to in targets {
                dependents.entry(to.as_str()).or_default().push(from.clone());
            }
        }

        let nodes = accumulated
            .iter()
            .map(|(name, package)| {
                let node = ResolutionNode {
                    name: name.clone(),
                    package: Arc::clone(package),
                    required_by: dependents.get(name.as_str()).cloned().unwrap_or_default(),
                    provided_by: Vec::new(),
                };
                (name.clone(), node)
            })
            .collect();

        let repo_dependencies = repo_requirements
            .into_iter()
            .map(|(name, requirement)| {
                let provided_by = if requirement.via_provides {
                    vec![Arc::clone(&requirement.package)]
                } else {
                    Vec::new()
                };
                let node = ResolutionNode {
                    name: name.clone(),
                    package: requirement.package,
                    required_by: requirement.required_by.into_iter().collect(),
                    provided_by,
                };
                (name, node)
            })
            .collect();

        Ok(ResolvedGraph {
            targets: Vec::new(),
            nodes,
            repo_dependencies,
            escalated: BTreeSet::new(),
            edges,
        })
    }

    fn fetch_frontier(
        &mut self,
        frontier: &[String],
        wanted_by: &BTreeMap<String, BTreeSet<String>>,
    ) -> Result<Vec<Arc<PackageRef>>> {
        debug!("Fetching {} frontier package(s) from the AUR", frontier.len());
        let found = self.context.memo.fetch(self.context.registry, frontier)?;
        let missing: Vec<String> = frontier
            .iter()
            .filter(|name| !found.iter().any(|package| &package.name == *name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            let requesters: BTreeSet<String> = missing
                .iter()
                .filter_map(|name| wanted_by.get(name))
                .flatten()
                .cloned()
                .collect();
            return Err(AursError::PackagesNotFoundInRegistry {
                packages: missing,
                wanted_by: requesters.into_iter().collect(),
            });
        }
        Ok(found)
    }

    /// REPO (exact, then provides), then LOCAL unless the name was escalated.
    fn satisfy_outside_registry(
        &self,
        who: &str,
        matcher: &VersionMatcher,
    ) -> Result<Option<Satisfier>> {
        let repo_mismatch = match self.context.repo.find_satisfier(matcher) {
            Satisfaction::Exact(package) => {
                return Ok(Some(Satisfier::Repo {
                    package: Arc::clone(package),
                    via_provides: false,
                }))
            }
            Satisfaction::Provided(entry) => {
                return Ok(Some(Satisfier::Repo {
                    package: Arc::clone(&entry.provider),
                    via_provides: true,
                }))
            }
            Satisfaction::Mismatch { found } => Some(found),
            Satisfaction::Missing => None,
        };

        if !self.escalated.contains(&matcher.package_name) {
            match self.context.local.find_satisfier(matcher) {
                Satisfaction::Exact(_) | Satisfaction::Provided(_) => {
                    return Ok(Some(Satisfier::Local))
                }
                Satisfaction::Mismatch { found } => {
                    return Err(match repo_mismatch {
                        Some(repo_found) => {
                            version_mismatch(who, matcher, repo_found, PackageSource::Repo)
                        }
                        None => version_mismatch(who, matcher, found, PackageSource::Local),
                    });
                }
                Satisfaction::Missing => {}
            }
        }

        match repo_mismatch {
            Some(found) => Err(version_mismatch(who, matcher, found, PackageSource::Repo)),
            None => Ok(None),
        }
    }
}

fn add_edge(edges: &mut BTreeMap<String, BTreeSet<String>>, from: &str, to: &str) {
    if from != to {
        edges.entry(from.to_string()).or_default().insert(to.to_string());
    }
}

/// `depends + makedepends (+ checkdepends)` folded into one matcher per name.
fn combined_requirements(
    package: &PackageRef,
    include_check: bool,
) -> BTreeMap<String, VersionMatcher> {
    let mut combined: BTreeMap<String, VersionMatcher> = BTreeMap::new();
    for spec in package.build_dependencies(include_check) {
        let matcher = spec.matcher();
        match combined.entry(matcher.package_name.clone()) {
            Entry::Occupied(mut existing) => existing.get_mut().combine(&matcher),
            Entry::Vacant(slot) => {
                slot.insert(matcher);
            }
        }
    }
    combined
}

fn version_mismatch(
    who: &str,
    matcher: &VersionMatcher,
    found_versions: Vec<String>,
    location: PackageSource,
) -> AursError {
    AursError::DependencyVersionMismatch {
        dependency_line: matcher.line(),
        found_versions,
        who_depends: who.to_string(),
        depends_on: matcher.package_name.clone(),
        location,
    }
}
