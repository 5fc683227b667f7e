// aurs-core/src/makepkg.rs
use std::path::{Path, PathBuf};

use aurs_aio::process::{run_command_inherit, run_command_sync, stdout_or_error};
use aurs_common::error::{AursError, Result};
use tracing::debug;

use crate::build::BuildTool;
use crate::pacman::require_binary;

const MAKEPKG: &str = "makepkg";

/// `BuildTool` that shells out to makepkg.
#[derive(Debug, Clone)]
pub struct Makepkg {
    binary: PathBuf,
}

impl Makepkg {
    pub fn new() -> Result<Self> {
        Ok(Self {
            binary: require_binary(MAKEPKG)?,
        })
    }

    /// Uses a specific executable instead of the one on `PATH`.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn program(&self) -> String {
        self.binary.display().to_string()
    }

    fn capture(&self, build_dir: &Path, args: &[&str]) -> Result<String> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let output = run_command_sync(&self.program(), &args, Some(build_dir), &[])?;
        stdout_or_error(MAKEPKG, &output)
    }

    fn interactive(&self, build_dir: &Path, args: &[&str]) -> Result<()> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let status = run_command_inherit(&self.program(), &args, Some(build_dir), &[])?;
        if status.success() {
            Ok(())
        } else {
            Err(AursError::CommandExecError(format!(
                "{} {} exited with {}",
                MAKEPKG,
                args.join(" "),
                status
            )))
        }
    }
}

impl BuildTool for Makepkg {
    fn package_list(&self, build_dir: &Path) -> Result<Vec<PathBuf>> {
        let listed = self.capture(build_dir, &["--packagelist"])?;
        let paths: Vec<PathBuf> = listed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                let path = PathBuf::from(line);
                if path.is_absolute() {
                    path
                } else {
                    build_dir.join(path)
                }
            })
            .collect();
        debug!("makepkg will produce {:?}", paths);
        Ok(paths)
    }

    fn print_srcinfo(&self, build_dir: &Path) -> Result<String> {
        self.capture(build_dir, &["--printsrcinfo"])
    }

    fn refresh_pkgver(&self, build_dir: &Path) -> Result<()> {
        self.interactive(
            build_dir,
            &["--nobuild", "--nodeps", "--noprepare", "--skipinteg"],
        )
    }

    fn build(&self, build_dir: &Path, nocheck: bool) -> Result<()> {
        let mut args = vec!["--force", "--noconfirm"];
        if nocheck {
            args.push("--nocheck");
        }
        self.interactive(build_dir, &args)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Mutex;

    use super::*;

    // Writing a script while another test forks can make exec fail with ETXTBSY.
    static SERIAL: Mutex<()> = Mutex::new(());

    fn fake_makepkg(dir: &Path, script: &str) -> Makepkg {
        let path = dir.join("makepkg");
        fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        Makepkg::with_binary(path)
    }

    #[test]
    fn test_package_list_resolves_relative_paths() {
        let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        let tmp = tempfile::tempdir().unwrap();
        let tool = fake_makepkg(
            tmp.path(),
            "echo /pkgdest/foo-1-1-x86_64.pkg.tar.zst\necho foo-docs-1-1-any.pkg.tar.zst",
        );
        let paths = tool.package_list(tmp.path()).unwrap();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/pkgdest/foo-1-1-x86_64.pkg.tar.zst"),
                tmp.path().join("foo-docs-1-1-any.pkg.tar.zst"),
            ]
        );
    }

    #[test]
    fn test_build_passes_nocheck_and_reports_failure() {
        let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        let tmp = tempfile::tempdir().unwrap();
        let tool = fake_makepkg(
            tmp.path(),
            "echo \"$@\" > args.txt\ncase \"$*\" in *--nocheck*) exit 0;; *) exit 4;; esac",
        );
        tool.build(tmp.path(), true).unwrap();
        let args = fs::read_to_string(tmp.path().join("args.txt")).unwrap();
        assert_eq!(args.trim(), "--force --noconfirm --nocheck");

        let err = tool.build(tmp.path(), false).unwrap_err();
        assert!(matches!(err, AursError::CommandExecError(_)));
    }

    #[test]
    fn test_printsrcinfo_is_captured() {
        let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        let tmp = tempfile::tempdir().unwrap();
        let tool = fake_makepkg(tmp.path(), "echo pkgbase = foo");
        assert_eq!(tool.print_srcinfo(tmp.path()).unwrap().trim(), "pkgbase = foo");
    }
}
