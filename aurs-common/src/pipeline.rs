// aurs-common/src/pipeline.rs
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::AursError;

/// Switches collected from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineFlags {
    /// Skip packages already installed at the target version.
    pub needed: bool,
    /// Never prompt; take the default answer everywhere.
    pub noconfirm: bool,
    /// Abort the whole run on the first failed unit.
    pub strict: bool,
    /// Skip `check()` and ignore `checkdepends`.
    pub nocheck: bool,
    /// Treat VCS packages as upgrade candidates.
    pub devel: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    PipelineStarted {
        total_units: usize,
    },
    PipelineFinished {
        duration_secs: f64,
        success_count: usize,
        fail_count: usize,
    },
    PlanningStarted,
    DependencyResolutionStarted,
    DependencyResolutionFinished {
        registry_count: usize,
        repo_count: usize,
    },
    FetchStarted {
        package_base: String,
    },
    FetchFinished {
        package_base: String,
        revision: Option<String>,
    },
    UnitSkipped {
        package_base: String,
        reason: String,
    },
    DependencyInstallStarted {
        package_base: String,
        packages: Vec<String>,
    },
    UnitWaiting {
        package_base: String,
        waiting_on: Vec<String>,
    },
    BuildStarted {
        package_base: String,
    },
    BuildFinished {
        package_base: String,
        artifacts: Vec<PathBuf>,
    },
    BuildFailed {
        package_base: String,
        error: String,
    },
    InstallStarted {
        packages: Vec<String>,
    },
    InstallFinished {
        packages: Vec<String>,
    },
    LogInfo {
        message: String,
    },
    LogWarn {
        message: String,
    },
    LogError {
        message: String,
    },
}

impl PipelineEvent {
    // AursError kept for internal use, but events use String for error messages
    pub fn build_failed(package_base: String, error: &AursError) -> Self {
        PipelineEvent::BuildFailed {
            package_base,
            error: error.to_string(),
        }
    }
}
