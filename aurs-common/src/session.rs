// aurs-common/src/session.rs
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::dependency::{
    ConflictChecker, ConflictReport, DependencyResolver, ResolutionContext, ResolvedGraph,
};
use crate::error::Result;
use crate::model::{PackageRef, PackageSource};
use crate::universe::{PackageDatabase, PackageUniverse, RegistryClient, RegistryMemo};

/// Per-run context: the query backends plus cached snapshots of each
/// universe. Snapshots are shared as `Arc` and replaced, never mutated.
pub struct Session {
    database: Arc<dyn PackageDatabase>,
    registry: Arc<dyn RegistryClient>,
    repo: Mutex<Option<Arc<PackageUniverse>>>,
    local: Mutex<Option<Arc<PackageUniverse>>>,
    repo_priority: Mutex<Option<Arc<Vec<String>>>>,
    memo: Mutex<RegistryMemo>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    pub fn new(database: Arc<dyn PackageDatabase>, registry: Arc<dyn RegistryClient>) -> Self {
        Self {
            database,
            registry,
            repo: Mutex::new(None),
            local: Mutex::new(None),
            repo_priority: Mutex::new(None),
            memo: Mutex::new(RegistryMemo::new()),
        }
    }

    pub fn database(&self) -> &Arc<dyn PackageDatabase> {
        &self.database
    }

    pub fn registry(&self) -> &Arc<dyn RegistryClient> {
        &self.registry
    }

    pub fn repo_universe(&self) -> Result<Arc<PackageUniverse>> {
        let mut slot = lock(&self.repo);
        if let Some(universe) = slot.as_ref() {
            return Ok(Arc::clone(universe));
        }
        let universe = Arc::new(PackageUniverse::new(
            PackageSource::Repo,
            self.database.repo_packages()?,
        ));
        debug!("Loaded {} repository packages", universe.len());
        *slot = Some(Arc::clone(&universe));
        Ok(universe)
    }

    pub fn local_universe(&self) -> Result<Arc<PackageUniverse>> {
        let mut slot = lock(&self.local);
        if let Some(universe) = slot.as_ref() {
            return Ok(Arc::clone(universe));
        }
        let universe = Arc::new(PackageUniverse::new(
            PackageSource::Local,
            self.database.local_packages()?,
        ));
        debug!("Loaded {} installed packages", universe.len());
        *slot = Some(Arc::clone(&universe));
        Ok(universe)
    }

    /// Seeds the snapshots from packages loaded elsewhere (e.g. concurrently).
    pub fn install_snapshots(&self, repo: Vec<PackageRef>, local: Vec<PackageRef>) {
        *lock(&self.repo) = Some(Arc::new(PackageUniverse::new(PackageSource::Repo, repo)));
        *lock(&self.local) = Some(Arc::new(PackageUniverse::new(PackageSource::Local, local)));
    }

    pub fn repo_priority(&self) -> Result<Arc<Vec<String>>> {
        let mut slot = lock(&self.repo_priority);
        if let Some(priority) = slot.as_ref() {
            return Ok(Arc::clone(priority));
        }
        let priority = Arc::new(self.database.repo_priority()?);
        *slot = Some(Arc::clone(&priority));
        Ok(priority)
    }

    /// Drops the installed-package snapshot; call after every install or removal.
    pub fn discard_local_cache(&self) {
        debug!("Discarding installed package snapshot");
        *lock(&self.local) = None;
    }

    /// AUR records for `names` through the run's memo.
    pub fn registry_info(&self, names: &[String]) -> Result<Vec<Arc<PackageRef>>> {
        lock(&self.memo).fetch(self.registry.as_ref(), names)
    }

    pub fn resolve(&self, targets: &[String], include_check_depends: bool) -> Result<ResolvedGraph> {
        let repo = self.repo_universe()?;
        let local = self.local_universe()?;
        let mut memo = lock(&self.memo);
        let mut resolver = DependencyResolver::new(ResolutionContext {
            repo: &repo,
            local: &local,
            registry: self.registry.as_ref(),
            memo: &mut memo,
            include_check_depends,
        });
        resolver.resolve_targets(targets)
    }

    pub fn check_conflicts(&self, install_set: &[Arc<PackageRef>]) -> Result<ConflictReport> {
        let local = self.local_universe()?;
        let priority = self.repo_priority()?;
        Ok(ConflictChecker::new(&local, &priority).check(install_set))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingDatabase {
        local_loads: AtomicUsize,
    }

    impl PackageDatabase for CountingDatabase {
        fn repo_packages(&self) -> Result<Vec<PackageRef>> {
            Ok(vec![PackageRef::new("glibc", "2.39-1", PackageSource::Repo)])
        }

        fn local_packages(&self) -> Result<Vec<PackageRef>> {
            self.local_loads.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    struct EmptyRegistry;

    impl RegistryClient for EmptyRegistry {
        fn info(&self, _names: &[String]) -> Result<Vec<PackageRef>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_local_snapshot_is_cached_until_discarded() {
        let database = Arc::new(CountingDatabase::default());
        let session = Session::new(database.clone(), Arc::new(EmptyRegistry));
        session.local_universe().unwrap();
        session.local_universe().unwrap();
        assert_eq!(database.local_loads.load(Ordering::SeqCst), 1);
        session.discard_local_cache();
        session.local_universe().unwrap();
        assert_eq!(database.local_loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_repo_snapshot_is_shared() {
        let session = Session::new(
            Arc::new(CountingDatabase::default()),
            Arc::new(EmptyRegistry),
        );
        let a = session.repo_universe().unwrap();
        let b = session.repo_universe().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.contains("glibc"));
    }
}
