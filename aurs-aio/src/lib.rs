// aurs-aio/src/lib.rs
//! Blocking IO operations for aurs (filesystem, json, git, process)

pub mod fs;
pub mod git2;
pub mod json_io;
pub mod process;

pub use self::git2::{clone_repo, has_local_changes, head_revision, reset_hard, update_repo, UpdateOutcome};
pub use json_io::{read_json_or_default, read_json_sync, write_json_sync};
pub use process::{run_command_inherit, run_command_sync};
