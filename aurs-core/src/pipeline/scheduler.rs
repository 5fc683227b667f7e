// aurs-core/src/pipeline/scheduler.rs
//! Drives package build units to completion in dependency order.
use std::collections::{BTreeMap, BTreeSet};

use aurs_aio::fs::remove_directory_recursive;
use aurs_common::dependency::topological_sort;
use aurs_common::error::{AursError, Result};
use aurs_common::pipeline::PipelineEvent;
use tracing::{debug, error, instrument, warn};

use crate::build::{ArtifactLedger, BuildContext, PackageBuildUnit, UnitState};

/// What to do after a unit's repository could not be cloned or updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneRecoveryAction {
    /// Discard local modifications and fetch again.
    Reset,
    /// Delete the working copy and clone from scratch.
    Reclone,
    /// Leave the unit (and everything needing it) unbuilt.
    Skip,
    /// Stop the whole run.
    Abort,
}

pub trait CloneRecovery {
    fn recover(&self, package_base: &str, error: &AursError) -> CloneRecoveryAction;
}

/// Recovery that never asks: skip the unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipFailedClones;

impl CloneRecovery for SkipFailedClones {
    fn recover(&self, _package_base: &str, _error: &AursError) -> CloneRecoveryAction {
        CloneRecoveryAction::Skip
    }
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub built: Vec<PackageBuildUnit>,
    pub failed: Vec<(String, AursError)>,
    pub skipped: Vec<(String, String)>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn built_bases(&self) -> Vec<&str> {
        self.built.iter().map(|unit| unit.package_base()).collect()
    }

    /// The error the CLI should exit with, if any unit failed.
    pub fn first_failure(&self) -> Option<&AursError> {
        self.failed.first().map(|(_, error)| error)
    }
}

pub struct BuildScheduler<'a> {
    ctx: BuildContext<'a>,
    recovery: &'a dyn CloneRecovery,
}

impl<'a> BuildScheduler<'a> {
    pub fn new(ctx: BuildContext<'a>, recovery: &'a dyn CloneRecovery) -> Self {
        Self { ctx, recovery }
    }

    pub fn context(&self) -> &BuildContext<'a> {
        &self.ctx
    }

    /// Builds `units`. `dependencies` maps each package base to the bases it
    /// needs built first; a cycle there fails before anything is fetched.
    #[instrument(skip_all, fields(units = units.len()))]
    pub fn run(
        &self,
        units: Vec<PackageBuildUnit>,
        dependencies: &BTreeMap<String, BTreeSet<String>>,
    ) -> Result<BuildReport> {
        let order = topological_sort(dependencies)?;
        let mut worklist = seed_in_order(units, &order);
        debug!(
            "Build order: {:?}",
            worklist.iter().map(|u| u.package_base()).collect::<Vec<_>>()
        );

        let mut ledger = ArtifactLedger::new();
        for unit in &worklist {
            ledger.register(unit.package_base(), unit.members());
        }

        let mut report = BuildReport::default();
        let mut waits: BTreeMap<String, usize> = BTreeMap::new();
        let mut recovered: BTreeSet<String> = BTreeSet::new();
        let mut index = 0;

        while !worklist.is_empty() {
            if index >= worklist.len() {
                index = 0;
            }
            let outcome = worklist[index].advance(&self.ctx, &ledger);
            let base = worklist[index].package_base().to_string();
            if worklist[index].state() != UnitState::Uncloned {
                // Staging may have replaced the members with regenerated metadata.
                ledger.register(&base, worklist[index].members());
            }

            match outcome {
                Ok(_) if worklist[index].is_already_installed() => {
                    debug!("{} is up to date, skipping", base);
                    let unit = worklist.remove(index);
                    unit.discard_build_dir();
                    ledger.mark_up_to_date(&base);
                    report.skipped.push((base, "up to date".to_string()));
                    waits.clear();
                }
                Ok(UnitState::Built) => {
                    let unit = worklist.remove(index);
                    ledger.record_built(unit.built_artifacts());
                    report.built.push(unit);
                    waits.clear();
                }
                Ok(state) => {
                    return Err(AursError::Generic(format!(
                        "'{base}' stopped unexpectedly in state {state:?}"
                    )));
                }
                Err(AursError::DependencyNotBuiltYet { waiting_on, .. }) => {
                    let count = waits.entry(base.clone()).or_default();
                    *count += 1;
                    debug!("{} waits on {:?} (attempt {})", base, waiting_on, count);
                    if *count > worklist.len() {
                        let units = worklist
                            .iter()
                            .map(|unit| unit.package_base().to_string())
                            .collect();
                        error!("No unit can make progress; giving up");
                        return Err(AursError::DependencyCycle { units });
                    }
                    index += 1;
                }
                Err(clone_error @ AursError::CloneError { .. }) => {
                    let action = if recovered.contains(&base) {
                        CloneRecoveryAction::Skip
                    } else {
                        self.recovery.recover(&base, &clone_error)
                    };
                    warn!("{}; recovering with {:?}", clone_error, action);
                    match action {
                        CloneRecoveryAction::Reset => {
                            recovered.insert(base.clone());
                            let unit = &worklist[index];
                            if let Err(e) = self.ctx.source.reset(unit.clone_dir()) {
                                warn!("Reset of {} failed: {}", unit.clone_dir().display(), e);
                            }
                        }
                        CloneRecoveryAction::Reclone => {
                            recovered.insert(base.clone());
                            let unit = &mut worklist[index];
                            remove_directory_recursive(unit.clone_dir())?;
                            unit.require_clone();
                        }
                        CloneRecoveryAction::Skip => {
                            let unit = worklist.remove(index);
                            unit.discard_build_dir();
                            ledger.mark_failed(&base);
                            self.ctx.emit(PipelineEvent::UnitSkipped {
                                package_base: base.clone(),
                                reason: clone_error.to_string(),
                            });
                            report.skipped.push((base, clone_error.to_string()));
                            waits.clear();
                        }
                        CloneRecoveryAction::Abort => {
                            return Err(AursError::Cancelled(clone_error.to_string()));
                        }
                    }
                }
                Err(failure) => {
                    let mut unit = worklist.remove(index);
                    unit.mark_failed(&failure);
                    ledger.mark_failed(&base);
                    self.ctx
                        .emit(PipelineEvent::build_failed(base.clone(), &failure));
                    error!("{}", failure);
                    if self.ctx.flags.strict {
                        return Err(failure);
                    }
                    report.failed.push((base, failure));
                    waits.clear();
                }
            }
        }

        debug!(
            "Scheduler finished: {} built, {} failed, {} skipped",
            report.built.len(),
            report.failed.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

/// Orders units by `order`; bases absent from it keep their relative order
/// at the end.
fn seed_in_order(units: Vec<PackageBuildUnit>, order: &[String]) -> Vec<PackageBuildUnit> {
    let rank: BTreeMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(i, base)| (base.as_str(), i))
        .collect();
    let mut units = units;
    units.sort_by_key(|unit| rank.get(unit.package_base()).copied().unwrap_or(usize::MAX));
    units
}
