// aurs-core/src/check/update.rs

use std::sync::Arc;

use aurs_common::error::Result;
use aurs_common::model::{vercmp, PackageRef};
use aurs_common::{PackageUniverse, Session};
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct UpdateInfo {
    pub name: String,
    pub package_base: String,
    pub installed_version: String,
    pub available_version: String,
    /// VCS package listed because `--devel` was given, not for a newer version.
    pub devel: bool,
}

/// Installed packages no configured repository knows about.
pub fn foreign_packages(repo: &PackageUniverse, local: &PackageUniverse) -> Vec<Arc<PackageRef>> {
    local
        .iter()
        .filter(|package| !repo.contains(&package.name))
        .cloned()
        .collect()
}

/// Foreign packages whose AUR version is newer than the installed one, plus
/// every VCS package when `devel` is set.
#[instrument(skip(session))]
pub fn check_for_updates(session: &Session, devel: bool) -> Result<Vec<UpdateInfo>> {
    let repo = session.repo_universe()?;
    let local = session.local_universe()?;
    let foreign = foreign_packages(&repo, &local);
    let names: Vec<String> = foreign.iter().map(|p| p.name.clone()).collect();
    debug!("{} foreign package(s) to check against the AUR", names.len());

    let mut updates = Vec::new();
    for remote in session.registry_info(&names)? {
        let Some(installed) = local.get(&remote.name) else {
            continue;
        };
        let newer = vercmp(&remote.version, &installed.version).is_gt();
        let devel_candidate = devel && remote.is_devel();
        if !newer && !devel_candidate {
            continue;
        }
        updates.push(UpdateInfo {
            name: remote.name.clone(),
            package_base: remote.package_base.clone(),
            installed_version: installed.version.clone(),
            available_version: remote.version.clone(),
            devel: !newer,
        });
    }
    updates.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(updates)
}
