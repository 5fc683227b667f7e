/*
File: aurs-aio/src/git2.rs
Purpose: Synchronous Git operations on AUR package repositories using git2.
*/
use std::path::Path;

use aurs_common::error::{AursError, Result};
use git2::build::CheckoutBuilder;
use git2::{FetchOptions, Repository, ResetType, StatusOptions};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    FastForwarded,
}

/// Clones `url` into `dest`. Contains blocking network and filesystem I/O.
pub fn clone_repo(url: &str, dest: &Path) -> Result<()> {
    debug!("Cloning {} into {}", url, dest.display());
    Repository::clone(url, dest).map_err(|e| {
        error!("Failed to clone {}: {}", url, e);
        AursError::Generic(format!("Failed to clone {url}: {e}"))
    })?;
    Ok(())
}

fn open(repo_path: &Path) -> Result<Repository> {
    Repository::open(repo_path).map_err(|e| {
        error!("Failed open repo {}: {}", repo_path.display(), e);
        AursError::Generic(format!(
            "Failed to open repository {}: {e}",
            repo_path.display()
        ))
    })
}

/// Fetches `origin` and fast-forwards the checked-out branch.
pub fn update_repo(repo_path: &Path) -> Result<UpdateOutcome> {
    debug!("Updating git repository at: {}", repo_path.display());
    let repo = open(repo_path)?;

    let head = repo
        .head()
        .map_err(|e| AursError::Generic(format!("Failed to read HEAD: {e}")))?;
    let branch = head
        .shorthand()
        .filter(|_| head.is_branch())
        .ok_or_else(|| {
            AursError::Generic(format!(
                "Repository {} has a detached HEAD",
                repo_path.display()
            ))
        })?
        .to_string();
    drop(head);

    let mut remote = repo.find_remote("origin").map_err(|e| {
        error!("Failed find remote 'origin' in {}: {}", repo_path.display(), e);
        AursError::Generic(format!("Failed to find remote 'origin': {e}"))
    })?;
    let mut fetch_options = FetchOptions::new();
    debug!("Fetching updates for {}", repo_path.display());
    remote
        .fetch(
            &["refs/heads/*:refs/remotes/origin/*"],
            Some(&mut fetch_options),
            None,
        )
        .map_err(|e| {
            error!("Failed fetch repo {}: {}", repo_path.display(), e);
            AursError::Generic(format!("Failed to fetch updates: {e}"))
        })?;

    let local_branch_name = format!("refs/heads/{branch}");
    let remote_branch_name = format!("refs/remotes/origin/{branch}");
    let remote_branch_ref = repo.find_reference(&remote_branch_name).map_err(|e| {
        AursError::Generic(format!(
            "Failed to find remote tracking branch '{remote_branch_name}': {e}"
        ))
    })?;
    let fetch_commit = repo
        .reference_to_annotated_commit(&remote_branch_ref)
        .map_err(|e| {
            AursError::Generic(format!(
                "Failed to get commit from '{remote_branch_name}': {e}"
            ))
        })?;

    let (analysis, _) = repo
        .merge_analysis(&[&fetch_commit])
        .map_err(|e| AursError::Generic(format!("Failed to analyze merge: {e}")))?;

    if analysis.is_up_to_date() {
        debug!("Repository {} already up-to-date.", repo_path.display());
        return Ok(UpdateOutcome::UpToDate);
    }

    if analysis.is_fast_forward() {
        let mut local_ref = repo.find_reference(&local_branch_name).map_err(|e| {
            AursError::Generic(format!("Failed to find local branch '{local_branch_name}': {e}"))
        })?;
        local_ref
            .set_target(
                fetch_commit.id(),
                &format!("Fast-forward {local_branch_name} to origin"),
            )
            .map_err(|e| AursError::Generic(format!("Failed to fast-forward: {e}")))?;
        repo.set_head(&local_branch_name)
            .map_err(|e| AursError::Generic(format!("Failed to set HEAD: {e}")))?;
        repo.checkout_head(Some(CheckoutBuilder::default().force()))
            .map_err(|e| AursError::Generic(format!("Failed to checkout HEAD: {e}")))?;
        debug!(
            "Fast-forwarded '{}' in {}",
            local_branch_name,
            repo_path.display()
        );
        Ok(UpdateOutcome::FastForwarded)
    } else {
        warn!(
            "Repository {} has diverged from origin ({:?})",
            repo_path.display(),
            analysis
        );
        Err(AursError::Generic(format!(
            "{} has local commits or changes and cannot be fast-forwarded",
            repo_path.display()
        )))
    }
}

/// Discards local modifications to tracked files.
pub fn reset_hard(repo_path: &Path) -> Result<()> {
    debug!("Resetting {} to HEAD", repo_path.display());
    let repo = open(repo_path)?;
    let head = repo.head()?.peel_to_commit()?;
    repo.reset(head.as_object(), ResetType::Hard, None)?;
    Ok(())
}

/// Commit id of HEAD as a hex string.
pub fn head_revision(repo_path: &Path) -> Result<String> {
    let repo = open(repo_path)?;
    let commit = repo.head()?.peel_to_commit()?;
    Ok(commit.id().to_string())
}

/// Whether tracked files differ from HEAD.
pub fn has_local_changes(repo_path: &Path) -> Result<bool> {
    let repo = open(repo_path)?;
    let mut options = StatusOptions::new();
    options.include_untracked(false);
    let statuses = repo.statuses(Some(&mut options))?;
    Ok(!statuses.is_empty())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use git2::{Commit, Oid, Signature};

    use super::*;

    fn commit_file(repo: &Repository, name: &str, content: &str) -> Oid {
        let workdir = repo.workdir().unwrap();
        fs::write(workdir.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("aurs", "aurs@example.org").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, "update", &tree, &parents)
            .unwrap()
    }

    #[test]
    fn test_clone_then_fast_forward() {
        let tmp = tempfile::tempdir().unwrap();
        let upstream_path = tmp.path().join("upstream");
        let upstream = Repository::init(&upstream_path).unwrap();
        commit_file(&upstream, "PKGBUILD", "pkgver=1");

        let clone_path = tmp.path().join("clone");
        clone_repo(upstream_path.to_str().unwrap(), &clone_path).unwrap();
        assert_eq!(update_repo(&clone_path).unwrap(), UpdateOutcome::UpToDate);

        let new_head = commit_file(&upstream, "PKGBUILD", "pkgver=2");
        assert_eq!(update_repo(&clone_path).unwrap(), UpdateOutcome::FastForwarded);
        assert_eq!(head_revision(&clone_path).unwrap(), new_head.to_string());
        assert_eq!(
            fs::read_to_string(clone_path.join("PKGBUILD")).unwrap(),
            "pkgver=2"
        );
    }

    #[test]
    fn test_reset_discards_local_edits() {
        let tmp = tempfile::tempdir().unwrap();
        let upstream_path = tmp.path().join("upstream");
        let upstream = Repository::init(&upstream_path).unwrap();
        commit_file(&upstream, "PKGBUILD", "pkgver=1");
        let clone_path = tmp.path().join("clone");
        clone_repo(upstream_path.to_str().unwrap(), &clone_path).unwrap();

        fs::write(clone_path.join("PKGBUILD"), "tampered").unwrap();
        assert!(has_local_changes(&clone_path).unwrap());
        reset_hard(&clone_path).unwrap();
        assert!(!has_local_changes(&clone_path).unwrap());
        assert_eq!(
            fs::read_to_string(clone_path.join("PKGBUILD")).unwrap(),
            "pkgver=1"
        );
    }

    #[test]
    fn test_clone_of_missing_repo_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing");
        assert!(clone_repo(missing.to_str().unwrap(), &tmp.path().join("clone")).is_err());
    }
}
