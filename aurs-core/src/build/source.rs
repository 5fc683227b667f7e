// aurs-core/src/build/source.rs
use std::path::Path;

use aurs_aio::git2::{clone_repo, head_revision, reset_hard, update_repo, UpdateOutcome};
use aurs_common::error::Result;
use tracing::debug;

use super::SourceRepository;

/// AUR git repositories, `{aur_url}/{package_base}.git`.
#[derive(Debug, Clone)]
pub struct GitSourceRepository {
    aur_url: String,
}

impl GitSourceRepository {
    pub fn new(aur_url: impl Into<String>) -> Self {
        Self {
            aur_url: aur_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, package_base: &str) -> String {
        format!("{}/{}.git", self.aur_url, package_base)
    }
}

impl SourceRepository for GitSourceRepository {
    fn clone_repository(&self, package_base: &str, dest: &Path) -> Result<()> {
        clone_repo(&self.url_for(package_base), dest)
    }

    fn pull(&self, dest: &Path) -> Result<()> {
        if update_repo(dest)? == UpdateOutcome::UpToDate {
            debug!("{} is already current", dest.display());
        }
        Ok(())
    }

    fn reset(&self, dest: &Path) -> Result<()> {
        reset_hard(dest)
    }

    fn head_revision(&self, dest: &Path) -> Result<String> {
        head_revision(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_trims_trailing_slash() {
        let source = GitSourceRepository::new("https://aur.archlinux.org/");
        assert_eq!(source.url_for("yay"), "https://aur.archlinux.org/yay.git");
    }
}
