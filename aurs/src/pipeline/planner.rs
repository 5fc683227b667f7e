// aurs/src/pipeline/planner.rs

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use aurs_common::config::Config;
use aurs_common::dependency::{ConflictReport, ResolvedGraph};
use aurs_common::error::{AursError, Result};
use aurs_common::model::PackageRef;
use aurs_common::pipeline::{PipelineEvent, PipelineFlags};
use aurs_common::{PackageUniverse, Session};
use aurs_core::check::check_for_updates;
use aurs_core::pipeline::preload_snapshots;
use aurs_core::{PackageBuildUnit, WorkerPool};
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use super::runner::CommandType;

const AUR_PREFIX: &str = "aur/";

#[derive(Debug, Default)]
pub(crate) struct InstallPlan {
    /// Names handed straight to `pacman -S`.
    pub repo_targets: Vec<String>,
    pub graph: ResolvedGraph,
    pub conflicts: ConflictReport,
    pub units: Vec<PackageBuildUnit>,
    /// Package base -> bases that have to be built first.
    pub dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl InstallPlan {
    pub fn is_empty(&self) -> bool {
        self.repo_targets.is_empty() && self.units.is_empty()
    }

    pub fn registry_names(&self) -> Vec<&str> {
        self.graph.nodes.keys().map(String::as_str).collect()
    }
}

pub(crate) struct OperationPlanner<'a> {
    config: &'a Config,
    session: &'a Session,
    pool: &'a WorkerPool,
    flags: PipelineFlags,
    event_tx: broadcast::Sender<PipelineEvent>,
}

impl<'a> OperationPlanner<'a> {
    pub fn new(
        config: &'a Config,
        session: &'a Session,
        pool: &'a WorkerPool,
        flags: PipelineFlags,
        event_tx: broadcast::Sender<PipelineEvent>,
    ) -> Self {
        Self {
            config,
            session,
            pool,
            flags,
            event_tx,
        }
    }

    fn emit(&self, event: PipelineEvent) {
        let _ = self.event_tx.send(event);
    }

    fn upgrade_targets(&self) -> Result<Vec<String>> {
        let updates = check_for_updates(self.session, self.flags.devel)?;
        for update in &updates {
            let line = if update.devel {
                format!("{} {} (devel)", update.name, update.installed_version)
            } else {
                format!(
                    "{} {} -> {}",
                    update.name, update.installed_version, update.available_version
                )
            };
            self.emit(PipelineEvent::LogInfo { message: line });
        }
        Ok(updates.into_iter().map(|update| update.name).collect())
    }

    #[instrument(skip(self))]
    pub fn plan_operations(&self, targets: &[String], command: CommandType) -> Result<InstallPlan> {
        self.emit(PipelineEvent::PlanningStarted);
        preload_snapshots(self.session, self.pool)?;

        let targets = match command {
            CommandType::Install => dedup(targets),
            CommandType::Upgrade => self.upgrade_targets()?,
        };
        if targets.is_empty() {
            debug!("No targets left to plan");
            return Ok(InstallPlan::default());
        }

        let repo = self.session.repo_universe()?;
        let (repo_targets, registry_targets) = classify_targets(&repo, &targets);
        debug!(
            "Targets: repo {:?}, AUR {:?}",
            repo_targets, registry_targets
        );

        self.emit(PipelineEvent::DependencyResolutionStarted);
        let graph = if registry_targets.is_empty() {
            ResolvedGraph::default()
        } else {
            self.session
                .resolve(&registry_targets, !self.flags.nocheck)?
        };
        self.emit(PipelineEvent::DependencyResolutionFinished {
            registry_count: graph.nodes.len(),
            repo_count: graph.repo_dependencies.len() + repo_targets.len(),
        });

        let install_set = install_set(&repo, &repo_targets, &graph);
        let conflicts = self.session.check_conflicts(&install_set)?;
        let unresolvable = unresolvable_conflicts(&conflicts);
        if !unresolvable.is_empty() {
            return Err(AursError::Conflict(unresolvable.join("; ")));
        }
        for (replacer, replaced) in &conflicts.replacements {
            let replaced: Vec<&str> = replaced.iter().map(String::as_str).collect();
            self.emit(PipelineEvent::LogInfo {
                message: format!("{replacer} replaces {}", replaced.join(", ")),
            });
        }

        let units: Vec<PackageBuildUnit> = graph
            .package_bases()
            .into_iter()
            .map(|(base, members)| PackageBuildUnit::new(base, members, self.config))
            .collect();
        let dependencies = graph.base_dependencies();

        Ok(InstallPlan {
            repo_targets,
            graph,
            conflicts,
            units,
            dependencies,
        })
    }
}

fn dedup(targets: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    targets
        .iter()
        .filter(|target| seen.insert(target.as_str()))
        .cloned()
        .collect()
}

/// Splits targets into repository names and AUR names. `aur/name` forces
/// the AUR; any other `repo/name` is left for pacman.
pub(crate) fn classify_targets(
    repo: &PackageUniverse,
    targets: &[String],
) -> (Vec<String>, Vec<String>) {
    let mut repo_targets = Vec::new();
    let mut registry_targets = Vec::new();
    for target in targets {
        if let Some(name) = target.strip_prefix(AUR_PREFIX) {
            registry_targets.push(name.to_string());
        } else if target.contains('/') || repo.contains(target) {
            repo_targets.push(target.clone());
        } else {
            registry_targets.push(target.clone());
        }
    }
    (repo_targets, registry_targets)
}

/// Every package this run will put on the system.
fn install_set(
    repo: &PackageUniverse,
    repo_targets: &[String],
    graph: &ResolvedGraph,
) -> Vec<Arc<PackageRef>> {
    let mut set: Vec<Arc<PackageRef>> = graph.registry_packages().cloned().collect();
    set.extend(
        graph
            .repo_dependencies
            .values()
            .map(|node| Arc::clone(&node.package)),
    );
    for target in repo_targets {
        let name = target.rsplit('/').next().unwrap_or(target);
        if let Some(package) = repo.get(name) {
            set.push(Arc::clone(package));
        }
    }
    set
}

/// Conflicts between two packages that are both about to be installed;
/// pacman offers to remove installed packages itself.
pub(crate) fn unresolvable_conflicts(report: &ConflictReport) -> Vec<String> {
    let mut found = Vec::new();
    for (name, others) in &report.conflicts {
        if report.installed.contains(name) {
            continue;
        }
        for other in others {
            if name < other && !report.installed.contains(other) {
                found.push(format!("{name} conflicts with {other}"));
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use aurs_common::model::PackageSource;
    use aurs_common::{PackageDatabase, RegistryClient};

    use super::*;

    struct Db;

    impl PackageDatabase for Db {
        fn repo_packages(&self) -> Result<Vec<PackageRef>> {
            Ok(vec![
                PackageRef::new("git", "2.44-1", PackageSource::Repo).with_repository("extra"),
                PackageRef::new("go", "2:1.22-1", PackageSource::Repo).with_repository("extra"),
            ])
        }

        fn local_packages(&self) -> Result<Vec<PackageRef>> {
            Ok(vec![PackageRef::new("yay", "11.0-1", PackageSource::Local)])
        }

        fn repo_priority(&self) -> Result<Vec<String>> {
            Ok(vec!["core".to_string(), "extra".to_string()])
        }
    }

    struct Aur;

    impl RegistryClient for Aur {
        fn info(&self, names: &[String]) -> Result<Vec<PackageRef>> {
            let all = vec![
                PackageRef::new("yay", "12.3-1", PackageSource::Registry)
                    .with_depends(&["git"])
                    .with_make_depends(&["go>=1.21"]),
                PackageRef::new("paru", "2.0-1", PackageSource::Registry)
                    .with_conflicts(&["yay"]),
            ];
            Ok(all
                .into_iter()
                .filter(|p| names.contains(&p.name))
                .collect())
        }
    }

    fn plan(targets: &[&str], command: CommandType) -> Result<InstallPlan> {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::with_root(tmp.path());
        let session = Session::new(Arc::new(Db), Arc::new(Aur));
        let pool = WorkerPool::new(2);
        let (tx, _rx) = broadcast::channel(64);
        let targets: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
        OperationPlanner::new(&config, &session, &pool, PipelineFlags::default(), tx)
            .plan_operations(&targets, command)
    }

    #[test]
    fn test_classify_targets() {
        let repo = PackageUniverse::new(
            PackageSource::Repo,
            vec![PackageRef::new("git", "2.44-1", PackageSource::Repo)],
        );
        let targets: Vec<String> = ["git", "yay", "aur/git", "extra/go"]
            .iter()
            .map(|t| t.to_string())
            .collect();
        let (repo_targets, registry_targets) = classify_targets(&repo, &targets);
        assert_eq!(repo_targets, vec!["git", "extra/go"]);
        assert_eq!(registry_targets, vec!["yay", "git"]);
    }

    #[test]
    fn test_plan_builds_units_and_repo_dependencies() {
        let plan = plan(&["yay", "git"], CommandType::Install).unwrap();
        assert_eq!(plan.repo_targets, vec!["git"]);
        assert_eq!(plan.registry_names(), vec!["yay"]);
        assert_eq!(plan.units.len(), 1);
        assert_eq!(plan.units[0].package_base(), "yay");
        assert!(plan.dependencies["yay"].is_empty());
        assert_eq!(plan.graph.repo_packages_to_install(), vec!["git", "go"]);
    }

    #[test]
    fn test_conflict_with_installed_is_left_to_pacman() {
        let plan = plan(&["paru"], CommandType::Install).unwrap();
        assert!(plan.conflicts.installed.contains("yay"));
        assert_eq!(plan.units.len(), 1);
    }

    #[test]
    fn test_conflicting_targets_fail() {
        let err = plan(&["paru", "yay"], CommandType::Install).unwrap_err();
        assert!(matches!(err, AursError::Conflict(ref m) if m.contains("paru conflicts with yay")));
        assert_eq!(err.exit_code(), 131);
    }

    #[test]
    fn test_upgrade_targets_newer_foreign_packages() {
        let plan = plan(&[], CommandType::Upgrade).unwrap();
        assert_eq!(plan.registry_names(), vec!["yay"]);
    }

    #[test]
    fn test_unknown_target_is_not_found() {
        let err = plan(&["does-not-exist"], CommandType::Install).unwrap_err();
        assert_eq!(err.exit_code(), 6);
    }
}
