// aurs/src/pipeline/runner.rs
use std::path::PathBuf;
use std::time::Instant;

use aurs_common::config::Config;
use aurs_common::error::{AursError, Result};
use aurs_common::pipeline::{PipelineEvent, PipelineFlags};
use aurs_core::build::{GitSourceRepository, InstallReason, RevisionStore};
use aurs_core::pipeline::BuildReport;
use aurs_core::{
    BuildContext, BuildScheduler, Installer, Makepkg, PacmanInstaller, WorkerPool,
};
use colored::Colorize;
use tokio::sync::broadcast;
use tracing::{debug, error, instrument};

use super::planner::{InstallPlan, OperationPlanner};
use super::{join_error, open_session};
use crate::cli::prompt::{confirm, PromptRecovery};

const EVENT_CHANNEL_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Install,
    Upgrade,
}

impl CommandType {
    /// Install reason for the packages the user asked for. Upgrades keep
    /// whatever reason the installed package already has.
    fn target_reason(self) -> InstallReason {
        match self {
            CommandType::Install => InstallReason::Explicit,
            CommandType::Upgrade => InstallReason::Keep,
        }
    }
}

#[derive(Debug, Default)]
struct RunSummary {
    built: usize,
    failed: usize,
    first_failure: Option<AursError>,
}

#[instrument(skip_all, fields(cmd = ?command_type, targets = ?targets))]
pub async fn run_pipeline(
    targets: &[String],
    command_type: CommandType,
    config: &Config,
    flags: PipelineFlags,
) -> Result<()> {
    let start_time = Instant::now();
    let (event_tx, event_rx) = broadcast::channel::<PipelineEvent>(EVENT_CHANNEL_SIZE);
    let status_handle = tokio::spawn(crate::cli::status::handle_events(event_rx));

    let worker_config = config.clone();
    let worker_targets = targets.to_vec();
    let worker_events = event_tx.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        execute(
            &worker_config,
            &worker_targets,
            command_type,
            flags,
            &worker_events,
        )
    })
    .await
    .map_err(join_error)
    .and_then(|result| result);

    let (success_count, fail_count) = match &outcome {
        Ok(summary) => (summary.built, summary.failed),
        Err(e) => {
            error!("RUNNER: pipeline failed: {}", e);
            (0, targets.len().max(1))
        }
    };
    event_tx
        .send(PipelineEvent::PipelineFinished {
            duration_secs: start_time.elapsed().as_secs_f64(),
            success_count,
            fail_count,
        })
        .ok();
    drop(event_tx);

    if let Err(join_err) = status_handle.await {
        error!("RUNNER: Status task join error: {}", join_err);
    }

    match outcome?.first_failure {
        Some(failure) => Err(failure),
        None => Ok(()),
    }
}

/// Plans, confirms, builds and installs. Runs on a blocking thread.
fn execute(
    config: &Config,
    targets: &[String],
    command_type: CommandType,
    flags: PipelineFlags,
    events: &broadcast::Sender<PipelineEvent>,
) -> Result<RunSummary> {
    let emit = |event: PipelineEvent| {
        let _ = events.send(event);
    };

    let pool = WorkerPool::with_default_size();
    let session = open_session(config, &pool)?;
    let plan = OperationPlanner::new(config, &session, &pool, flags, events.clone())
        .plan_operations(targets, command_type)?;

    if plan.is_empty() {
        emit(PipelineEvent::LogInfo {
            message: "Nothing to do.".to_string(),
        });
        return Ok(RunSummary::default());
    }

    print_plan(&plan);
    if !confirm("Proceed with installation?", true, flags.noconfirm)? {
        return Err(AursError::Cancelled("installation declined".to_string()));
    }

    let installer = PacmanInstaller::new(config.privilege_tool.clone(), flags.noconfirm);
    let InstallPlan {
        repo_targets,
        graph,
        units,
        dependencies,
        ..
    } = plan;

    if !repo_targets.is_empty() {
        emit(PipelineEvent::InstallStarted {
            packages: repo_targets.clone(),
        });
        installer.install_repo_packages(&repo_targets, command_type.target_reason())?;
        session.discard_local_cache();
        emit(PipelineEvent::InstallFinished {
            packages: repo_targets,
        });
    }

    if units.is_empty() {
        return Ok(RunSummary::default());
    }

    let mut revisions = RevisionStore::load(&config.revisions_path())?;
    let source = GitSourceRepository::new(config.aur_url.clone());
    let build_tool = Makepkg::new()?;
    let recovery = PromptRecovery::new(flags.noconfirm);

    emit(PipelineEvent::PipelineStarted {
        total_units: units.len(),
    });
    let mut report = {
        let ctx = BuildContext {
            config,
            session: &session,
            source: &source,
            build_tool: &build_tool,
            installer: &installer,
            revisions: &revisions,
            flags,
            events: events.clone(),
        };
        BuildScheduler::new(ctx, &recovery).run(units, &dependencies)?
    };

    for (base, reason) in &report.skipped {
        debug!("{} skipped: {}", base, reason);
    }

    if !report.built.is_empty() {
        let (explicit, as_deps) = partition_artifacts(&report, |name| graph.is_target(name));
        install_artifacts(&installer, &as_deps, InstallReason::Dependency, &emit)?;
        install_artifacts(&installer, &explicit, command_type.target_reason(), &emit)?;
        session.discard_local_cache();

        for unit in &mut report.built {
            unit.mark_installed(&mut revisions);
        }
        revisions.save()?;
    }

    Ok(RunSummary {
        built: report.built.len(),
        failed: report.failed.len(),
        first_failure: report.failed.into_iter().next().map(|(_, error)| error),
    })
}

fn install_artifacts(
    installer: &dyn Installer,
    files: &[PathBuf],
    reason: InstallReason,
    emit: &dyn Fn(PipelineEvent),
) -> Result<()> {
    if files.is_empty() {
        return Ok(());
    }
    let names: Vec<String> = files
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    emit(PipelineEvent::InstallStarted {
        packages: names.clone(),
    });
    installer.install_files(files, reason)?;
    emit(PipelineEvent::InstallFinished { packages: names });
    Ok(())
}

/// Built artifacts split into (explicitly requested, dependencies).
fn partition_artifacts<F>(report: &BuildReport, is_target: F) -> (Vec<PathBuf>, Vec<PathBuf>)
where
    F: Fn(&str) -> bool,
{
    let mut explicit = Vec::new();
    let mut as_deps = Vec::new();
    for unit in &report.built {
        for (name, path) in unit.built_artifacts() {
            if is_target(name) {
                explicit.push(path.clone());
            } else {
                as_deps.push(path.clone());
            }
        }
    }
    (explicit, as_deps)
}

fn print_plan(plan: &InstallPlan) {
    let aur = plan.registry_names();
    let repo_deps = plan.graph.repo_packages_to_install();
    if !plan.repo_targets.is_empty() {
        println!(
            "{} {} {}",
            "Repo".bold(),
            format!("({})", plan.repo_targets.len()).dimmed(),
            plan.repo_targets.join(" ")
        );
    }
    if !repo_deps.is_empty() {
        println!(
            "{} {} {}",
            "Repo Make/Depends".bold(),
            format!("({})", repo_deps.len()).dimmed(),
            repo_deps.join(" ")
        );
    }
    if !aur.is_empty() {
        println!(
            "{} {} {}",
            "AUR".bold(),
            format!("({})", aur.len()).dimmed(),
            aur.join(" ")
        );
    }
    let to_remove = plan.conflicts.installed_to_remove();
    if !to_remove.is_empty() {
        println!(
            "{} {}",
            "Conflicts with installed:".yellow().bold(),
            to_remove.join(" ")
        );
    }
}
