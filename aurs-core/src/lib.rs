// aurs-core/src/lib.rs

pub mod build;
pub mod check;
pub mod makepkg;
pub mod pacman;
pub mod pipeline;
pub mod registry;

pub use build::{BuildContext, BuildTool, Installer, PackageBuildUnit, SourceRepository};
pub use check::UpdateInfo;
pub use makepkg::Makepkg;
pub use pacman::{PacmanDatabase, PacmanInstaller};
pub use pipeline::{BuildReport, BuildScheduler, WorkerPool};
pub use registry::BatchedRegistry;
