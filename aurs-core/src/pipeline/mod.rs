pub mod engine;
pub mod scheduler;

pub use engine::{preload_snapshots, WorkerPool};
pub use scheduler::{BuildReport, BuildScheduler, CloneRecovery, CloneRecoveryAction, SkipFailedClones};
