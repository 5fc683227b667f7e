// aurs-common/src/lib.rs
pub mod config;
pub mod dependency;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod session;
pub mod universe;

// Re-export key types
pub use config::Config;
pub use error::{AursError, Result};
pub use model::{PackageRef, PackageSource, SrcInfo};
pub use session::Session;
pub use universe::{PackageDatabase, PackageUniverse, RegistryClient};
