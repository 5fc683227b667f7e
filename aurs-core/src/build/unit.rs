// aurs-core/src/build/unit.rs
//! State machine for one package base: fetch, stage, resolve and install its
//! dependencies, build, and finally record the installed revision.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aurs_aio::fs::{copy_tree_excluding_git, move_file, read_to_string, remove_directory_recursive};
use aurs_common::config::Config;
use aurs_common::dependency::{DependencyExt, DependencyTag};
use aurs_common::error::{AursError, Result};
use aurs_common::model::{is_devel_name, vercmp, PackageRef, SrcInfo};
use aurs_common::pipeline::{PipelineEvent, PipelineFlags};
use aurs_common::universe::Satisfaction;
use aurs_common::Session;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};

use super::artifact::select_artifact;
use super::ledger::ArtifactLedger;
use super::revisions::RevisionStore;
use super::{BuildTool, InstallReason, Installer, SourceRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitState {
    Uncloned,
    Fetched,
    Staged,
    DepsResolved,
    DepsInstalled,
    Built,
    Installed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RepoState {
    NeedsClone,
    NeedsPull,
}

/// Everything a unit needs from the outside world while advancing.
pub struct BuildContext<'a> {
    pub config: &'a Config,
    pub session: &'a Session,
    pub source: &'a dyn SourceRepository,
    pub build_tool: &'a dyn BuildTool,
    pub installer: &'a dyn Installer,
    pub revisions: &'a RevisionStore,
    pub flags: PipelineFlags,
    pub events: broadcast::Sender<PipelineEvent>,
}

impl BuildContext<'_> {
    pub fn emit(&self, event: PipelineEvent) {
        // No subscriber is fine.
        let _ = self.events.send(event);
    }
}

/// How each dependency line of a unit will be met.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyPlan {
    /// Lines already satisfied by installed packages.
    pub satisfied: Vec<String>,
    /// Repository packages to install with `--asdeps`.
    pub from_repo: Vec<String>,
    /// Packages built by other units in this run.
    pub from_siblings: Vec<String>,
}

#[derive(Debug)]
pub struct PackageBuildUnit {
    package_base: String,
    members: Vec<Arc<PackageRef>>,
    repo_state: RepoState,
    state: UnitState,
    clone_dir: PathBuf,
    build_dir: PathBuf,
    srcinfo: Option<SrcInfo>,
    plan: Option<DependencyPlan>,
    built_artifacts: BTreeMap<String, PathBuf>,
    revision: Option<String>,
    failure: Option<String>,
    already_installed: bool,
}

impl PackageBuildUnit {
    pub fn new(package_base: impl Into<String>, members: Vec<Arc<PackageRef>>, config: &Config) -> Self {
        let package_base = package_base.into();
        let clone_dir = config.package_clone_path(&package_base);
        let repo_state = if clone_dir.join(".git").is_dir() {
            RepoState::NeedsPull
        } else {
            RepoState::NeedsClone
        };
        Self {
            build_dir: config.package_build_path(&package_base),
            package_base,
            members,
            repo_state,
            state: UnitState::Uncloned,
            clone_dir,
            srcinfo: None,
            plan: None,
            built_artifacts: BTreeMap::new(),
            revision: None,
            failure: None,
            already_installed: false,
        }
    }

    pub fn package_base(&self) -> &str {
        &self.package_base
    }

    pub fn members(&self) -> &[Arc<PackageRef>] {
        &self.members
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn repo_state(&self) -> RepoState {
        self.repo_state
    }

    pub fn clone_dir(&self) -> &Path {
        &self.clone_dir
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn plan(&self) -> Option<&DependencyPlan> {
        self.plan.as_ref()
    }

    pub fn built_artifacts(&self) -> &BTreeMap<String, PathBuf> {
        &self.built_artifacts
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_already_installed(&self) -> bool {
        self.already_installed
    }

    pub fn is_devel(&self) -> bool {
        is_devel_name(&self.package_base) || self.members.iter().any(|m| m.is_devel())
    }

    /// Forces the next fetch to clone from scratch.
    pub fn require_clone(&mut self) {
        self.repo_state = RepoState::NeedsClone;
        self.state = UnitState::Uncloned;
    }

    fn build_error(&self, message: impl std::fmt::Display) -> AursError {
        AursError::BuildError {
            package_base: self.package_base.clone(),
            message: message.to_string(),
        }
    }

    /// Runs transitions until the unit is built, turns out to be installed
    /// already, or an error stops it. `DependencyNotBuiltYet` and
    /// `CloneError` leave the unit resumable.
    #[instrument(skip_all, fields(package_base = %self.package_base))]
    pub fn advance(&mut self, ctx: &BuildContext<'_>, ledger: &ArtifactLedger) -> Result<UnitState> {
        loop {
            match self.state {
                UnitState::Uncloned => self.fetch(ctx)?,
                UnitState::Fetched => self.stage(ctx)?,
                UnitState::Staged => self.resolve_dependencies(ctx, ledger)?,
                UnitState::DepsResolved => self.install_dependencies(ctx, ledger)?,
                UnitState::DepsInstalled => self.build(ctx)?,
                UnitState::Built | UnitState::Installed | UnitState::Failed => {
                    return Ok(self.state)
                }
            }
            if self.already_installed {
                return Ok(self.state);
            }
        }
    }

    fn fetch(&mut self, ctx: &BuildContext<'_>) -> Result<()> {
        ctx.emit(PipelineEvent::FetchStarted {
            package_base: self.package_base.clone(),
        });
        let fetched = match self.repo_state {
            RepoState::NeedsClone => {
                remove_directory_recursive(&self.clone_dir)?;
                ctx.source.clone_repository(&self.package_base, &self.clone_dir)
            }
            RepoState::NeedsPull => ctx.source.pull(&self.clone_dir),
        };
        let revision = fetched
            .and_then(|()| ctx.source.head_revision(&self.clone_dir))
            .map_err(|e| AursError::CloneError {
                package_base: self.package_base.clone(),
                message: e.to_string(),
            })?;
        debug!("{} is at revision {}", self.package_base, revision);

        self.repo_state = RepoState::NeedsPull;
        self.revision = Some(revision.clone());
        self.already_installed = self.is_up_to_date(ctx)?;
        self.state = UnitState::Fetched;
        ctx.emit(PipelineEvent::FetchFinished {
            package_base: self.package_base.clone(),
            revision: Some(revision),
        });
        if self.already_installed {
            ctx.emit(PipelineEvent::UnitSkipped {
                package_base: self.package_base.clone(),
                reason: "up to date".to_string(),
            });
        }
        Ok(())
    }

    /// `--needed` staleness: every member installed at the registry version,
    /// or for VCS packages, built from the revision just fetched.
    fn is_up_to_date(&self, ctx: &BuildContext<'_>) -> Result<bool> {
        if !ctx.flags.needed {
            return Ok(false);
        }
        let local = ctx.session.local_universe()?;
        let all_installed = |same_version: bool| {
            self.members.iter().all(|member| match local.get(&member.name) {
                Some(installed) => {
                    !same_version || vercmp(&installed.version, &member.version).is_eq()
                }
                None => false,
            })
        };
        if self.is_devel() {
            let recorded = ctx.revisions.get(&self.package_base);
            Ok(all_installed(false) && recorded.is_some() && recorded == self.revision.as_deref())
        } else {
            Ok(all_installed(true))
        }
    }

    fn stage(&mut self, ctx: &BuildContext<'_>) -> Result<()> {
        copy_tree_excluding_git(&self.clone_dir, &self.build_dir)
            .map_err(|e| self.build_error(format!("could not stage sources: {e}")))?;

        let text = if self.is_devel() {
            debug!("Refreshing pkgver for {}", self.package_base);
            ctx.build_tool
                .refresh_pkgver(&self.build_dir)
                .map_err(|e| self.build_error(e))?;
            ctx.build_tool
                .print_srcinfo(&self.build_dir)
                .map_err(|e| self.build_error(e))?
        } else {
            read_to_string(&self.build_dir.join(".SRCINFO"))
                .map_err(|e| self.build_error(e))?
        };
        let srcinfo = SrcInfo::parse(&text).map_err(|e| self.build_error(e))?;

        let arch = &ctx.config.arch;
        let mut refreshed = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let package = srcinfo.package(&member.name, arch).ok_or_else(|| {
                self.build_error(format!(".SRCINFO does not define package '{}'", member.name))
            })?;
            refreshed.push(Arc::new(package));
        }
        self.members = refreshed;
        self.srcinfo = Some(srcinfo);
        self.state = UnitState::Staged;
        Ok(())
    }

    fn resolve_dependencies(&mut self, ctx: &BuildContext<'_>, ledger: &ArtifactLedger) -> Result<()> {
        let srcinfo = self
            .srcinfo
            .as_ref()
            .ok_or_else(|| self.build_error("metadata was not staged"))?;
        let exclude = if ctx.flags.nocheck {
            DependencyTag::TEST
        } else {
            DependencyTag::empty()
        };
        let dependencies = srcinfo.dependencies(&ctx.config.arch);
        let wanted = dependencies.filter_by_tags(
            DependencyTag::RUNTIME | DependencyTag::BUILD | DependencyTag::TEST,
            exclude,
        );

        let local = ctx.session.local_universe()?;
        let repo = ctx.session.repo_universe()?;
        let mut plan = DependencyPlan::default();
        let mut unsatisfied = Vec::new();

        for spec in wanted {
            if self.members.iter().any(|member| member.satisfies(spec)) {
                continue;
            }
            // A sibling in this run wins over an installed copy it will replace.
            if let Some(sibling) = ledger.producer(spec) {
                if ledger.is_up_to_date(sibling) {
                    plan.satisfied.push(spec.raw_line.clone());
                } else {
                    plan.from_siblings.push(sibling.to_string());
                }
                continue;
            }
            let matcher = spec.matcher();
            if local.satisfies(&matcher) {
                plan.satisfied.push(spec.raw_line.clone());
                continue;
            }
            match repo.find_satisfier(&matcher) {
                Satisfaction::Exact(package) => plan.from_repo.push(package.name.clone()),
                Satisfaction::Provided(entry) => plan.from_repo.push(entry.provider.name.clone()),
                Satisfaction::Mismatch { .. } | Satisfaction::Missing => {
                    unsatisfied.push(spec.raw_line.clone())
                }
            }
        }

        if !unsatisfied.is_empty() {
            return Err(AursError::DependencyError(format!(
                "'{}' needs {} which nothing can provide",
                self.package_base,
                unsatisfied.join(", ")
            )));
        }
        for list in [&mut plan.from_repo, &mut plan.from_siblings] {
            list.sort();
            list.dedup();
        }
        debug!(
            "{}: {} satisfied, repo {:?}, siblings {:?}",
            self.package_base,
            plan.satisfied.len(),
            plan.from_repo,
            plan.from_siblings
        );
        self.plan = Some(plan);
        self.state = UnitState::DepsResolved;
        Ok(())
    }

    fn install_dependencies(&mut self, ctx: &BuildContext<'_>, ledger: &ArtifactLedger) -> Result<()> {
        let plan = self.plan.clone().unwrap_or_default();

        let failed: Vec<&str> = plan
            .from_siblings
            .iter()
            .map(String::as_str)
            .filter(|name| ledger.is_failed(name))
            .collect();
        if !failed.is_empty() {
            return Err(AursError::DependencyError(format!(
                "'{}' depends on {} which could not be built",
                self.package_base,
                failed.join(", ")
            )));
        }

        let waiting_on: Vec<String> = plan
            .from_siblings
            .iter()
            .filter(|name| ledger.artifact(name).is_none() && !ledger.is_up_to_date(name))
            .cloned()
            .collect();
        if !waiting_on.is_empty() {
            ctx.emit(PipelineEvent::UnitWaiting {
                package_base: self.package_base.clone(),
                waiting_on: waiting_on.clone(),
            });
            return Err(AursError::DependencyNotBuiltYet {
                package_base: self.package_base.clone(),
                waiting_on,
            });
        }

        let artifacts: Vec<PathBuf> = plan
            .from_siblings
            .iter()
            .filter_map(|name| ledger.artifact(name).cloned())
            .collect();
        if !plan.from_repo.is_empty() || !artifacts.is_empty() {
            let mut packages = plan.from_repo.clone();
            packages.extend(plan.from_siblings.iter().cloned());
            ctx.emit(PipelineEvent::DependencyInstallStarted {
                package_base: self.package_base.clone(),
                packages,
            });
            let installed = ctx
                .installer
                .install_repo_packages(&plan.from_repo, InstallReason::Dependency)
                .and_then(|()| ctx.installer.install_files(&artifacts, InstallReason::Dependency));
            ctx.session.discard_local_cache();
            installed.map_err(|e| {
                AursError::DependencyError(format!(
                    "could not install dependencies of '{}': {e}",
                    self.package_base
                ))
            })?;
        }
        self.state = UnitState::DepsInstalled;
        Ok(())
    }

    fn build(&mut self, ctx: &BuildContext<'_>) -> Result<()> {
        ctx.emit(PipelineEvent::BuildStarted {
            package_base: self.package_base.clone(),
        });
        let planned = ctx
            .build_tool
            .package_list(&self.build_dir)
            .map_err(|e| self.build_error(e))?;
        ctx.build_tool
            .build(&self.build_dir, ctx.flags.nocheck)
            .map_err(|e| self.build_error(e))?;

        let cache_dir = ctx.config.package_cache_dir();
        let mut artifacts = BTreeMap::new();
        for member in &self.members {
            let produced = select_artifact(&planned, &member.name, &ctx.config.arch)
                .filter(|path| path.is_file())
                .ok_or_else(|| {
                    self.build_error(format!("no package file was produced for '{}'", member.name))
                })?;
            let file_name = produced
                .file_name()
                .ok_or_else(|| self.build_error(format!("bad artifact path {}", produced.display())))?;
            let cached = move_file(produced, &cache_dir.join(file_name))
                .map_err(|e| self.build_error(e))?;
            artifacts.insert(member.name.clone(), cached);
        }

        ctx.emit(PipelineEvent::BuildFinished {
            package_base: self.package_base.clone(),
            artifacts: artifacts.values().cloned().collect(),
        });
        self.built_artifacts = artifacts;
        self.state = UnitState::Built;
        Ok(())
    }

    /// Called once the built artifacts are installed.
    pub fn mark_installed(&mut self, revisions: &mut RevisionStore) {
        if let Some(revision) = &self.revision {
            revisions.record(&self.package_base, revision);
        }
        self.discard_build_dir();
        self.state = UnitState::Installed;
    }

    pub fn mark_failed(&mut self, error: &AursError) {
        self.failure = Some(error.to_string());
        self.discard_build_dir();
        self.state = UnitState::Failed;
    }

    pub fn discard_build_dir(&self) {
        if let Err(e) = remove_directory_recursive(&self.build_dir) {
            warn!(
                "Could not remove build directory {}: {}",
                self.build_dir.display(),
                e
            );
        }
    }
}
