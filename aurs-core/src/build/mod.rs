// aurs-core/src/build/mod.rs
//! Per-package-base build machinery and the seams it talks through.
use std::path::{Path, PathBuf};

use aurs_common::error::Result;

pub mod artifact;
pub mod ledger;
pub mod revisions;
pub mod source;
pub mod unit;

pub use artifact::{parse_artifact_name, select_artifact, ArtifactName};
pub use ledger::ArtifactLedger;
pub use revisions::RevisionStore;
pub use source::GitSourceRepository;
pub use unit::{BuildContext, DependencyPlan, PackageBuildUnit, RepoState, UnitState};

/// Working copies of package bases.
pub trait SourceRepository: Send + Sync {
    fn clone_repository(&self, package_base: &str, dest: &Path) -> Result<()>;
    /// Fast-forwards an existing working copy.
    fn pull(&self, dest: &Path) -> Result<()>;
    /// Throws away local modifications.
    fn reset(&self, dest: &Path) -> Result<()>;
    fn head_revision(&self, dest: &Path) -> Result<String>;
}

/// The package build tool (makepkg), always run inside a staged directory.
pub trait BuildTool: Send + Sync {
    /// Artifact paths a build would produce, without building.
    fn package_list(&self, build_dir: &Path) -> Result<Vec<PathBuf>>;
    fn print_srcinfo(&self, build_dir: &Path) -> Result<String>;
    /// Downloads sources and runs `pkgver()` for VCS packages.
    fn refresh_pkgver(&self, build_dir: &Path) -> Result<()>;
    fn build(&self, build_dir: &Path, nocheck: bool) -> Result<()>;
}

/// Install reason recorded in the local database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallReason {
    /// Whatever pacman would record: explicit for new packages, unchanged
    /// for reinstalls.
    Keep,
    Dependency,
    Explicit,
}

impl InstallReason {
    pub fn pacman_flag(self) -> Option<&'static str> {
        match self {
            InstallReason::Keep => None,
            InstallReason::Dependency => Some("--asdeps"),
            InstallReason::Explicit => Some("--asexplicit"),
        }
    }
}

/// The binary package manager's install operations.
pub trait Installer: Send + Sync {
    fn install_repo_packages(&self, names: &[String], reason: InstallReason) -> Result<()>;
    fn install_files(&self, paths: &[PathBuf], reason: InstallReason) -> Result<()>;
}
