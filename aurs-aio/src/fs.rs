/*
File: aurs-aio/src/fs.rs
Purpose: Primitive synchronous filesystem operations.
*/
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use aurs_common::error::{AursError, Result};
use tempfile::NamedTempFile;
use tracing::{debug, error};
use walkdir::WalkDir;

/// Creates a directory and all of its parents.
pub fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| {
        error!("Failed to create directory {}: {}", path.display(), e);
        AursError::Io(Arc::new(e))
    })
}

/// Removes a directory tree; a missing directory is not an error.
pub fn remove_directory_recursive(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!("Removed directory {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            error!("Failed to remove directory {}: {}", path.display(), e);
            Err(AursError::Io(Arc::new(e)))
        }
    }
}

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        AursError::IoError(format!("Failed to read {}: {}", path.display(), e))
    })
}

/// Atomically writes data to a file using a temporary file in the same
/// directory.
pub fn atomic_write_file(original_path: &Path, content: &[u8]) -> Result<()> {
    let dir = original_path.parent().ok_or_else(|| {
        AursError::IoError(format!(
            "Cannot get parent directory for {}",
            original_path.display()
        ))
    })?;
    create_dir_all(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    let temp_path = temp_file.path().to_path_buf();
    debug!(
        "Atomically writing {} bytes to {} via temp file {}",
        content.len(),
        original_path.display(),
        temp_path.display()
    );

    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.as_file().sync_all()?;

    temp_file.persist(original_path).map_err(|e| {
        error!(
            "Failed to persist temporary file {} over {}: {}",
            temp_path.display(),
            original_path.display(),
            e.error
        );
        AursError::Io(Arc::new(e.error))
    })?;
    Ok(())
}

/// Copies a working copy into `dest`, leaving out `.git`. `dest` is
/// recreated from scratch.
pub fn copy_tree_excluding_git(src: &Path, dest: &Path) -> Result<u64> {
    remove_directory_recursive(dest)?;
    create_dir_all(dest)?;

    let mut copied = 0u64;
    let walker = WalkDir::new(src)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(|e| {
            AursError::IoError(format!("Failed to walk {}: {}", src.display(), e))
        })?;
        let relative = entry.path().strip_prefix(src).map_err(|e| {
            AursError::Generic(format!(
                "Path {} escaped {}: {}",
                entry.path().display(),
                src.display(),
                e
            ))
        })?;
        let target = dest.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            std::os::unix::fs::symlink(&link, &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    debug!(
        "Copied {} file(s) from {} to {}",
        copied,
        src.display(),
        dest.display()
    );
    Ok(copied)
}

/// Moves a file, falling back to copy + remove across filesystems.
pub fn move_file(src: &Path, dest: &Path) -> Result<PathBuf> {
    if let Some(parent) = dest.parent() {
        create_dir_all(parent)?;
    }
    if fs::rename(src, dest).is_err() {
        debug!(
            "rename {} -> {} failed, copying instead",
            src.display(),
            dest.display()
        );
        fs::copy(src, dest)?;
        fs::remove_file(src)?;
    }
    Ok(dest.to_path_buf())
}
