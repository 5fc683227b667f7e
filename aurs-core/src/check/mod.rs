pub mod update;

pub use update::{check_for_updates, foreign_packages, UpdateInfo};
