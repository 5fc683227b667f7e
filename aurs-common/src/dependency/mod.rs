// aurs-common/src/dependency/mod.rs
pub mod conflicts;
pub mod definition;
pub mod provides;
pub mod resolver;

pub use conflicts::{ConflictChecker, ConflictReport};
pub use definition::{DependencyExt, DependencySpec, DependencyTag};
pub use provides::{ProvidesEntry, ProvidesIndex};
pub use resolver::{
    topological_sort, DependencyResolver, ResolutionContext, ResolutionNode, ResolvedGraph,
};
