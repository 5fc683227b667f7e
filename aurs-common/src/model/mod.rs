// aurs-common/src/model/mod.rs
pub mod package;
pub mod srcinfo;
pub mod version;

pub use package::{is_devel_name, PackageRef, PackageSource, DEVEL_SUFFIXES};
pub use srcinfo::SrcInfo;
pub use version::{vercmp, VersionConstraint, VersionMatcher, VersionOperator};
