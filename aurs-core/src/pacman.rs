// aurs-core/src/pacman.rs
//! Adapters over the pacman command line: package database queries and
//! installation.
use std::collections::BTreeMap;
use std::path::PathBuf;

use aurs_aio::process::{run_command_inherit, run_command_sync, stdout_or_error, with_privilege};
use aurs_common::dependency::{DependencySpec, DependencyTag};
use aurs_common::error::{AursError, Result};
use aurs_common::model::{PackageRef, PackageSource};
use aurs_common::universe::PackageDatabase;
use tracing::{debug, instrument};

use crate::build::{InstallReason, Installer};

const PACMAN: &str = "pacman";
const PACMAN_CONF: &str = "pacman-conf";
const C_LOCALE: [(&str, &str); 1] = [("LANG", "C")];

/// Absolute path of `binary`, or `NotFound` when it is not on `PATH`.
pub fn require_binary(binary: &str) -> Result<PathBuf> {
    which::which(binary)
        .map_err(|e| AursError::NotFound(format!("'{binary}' is not available on PATH: {e}")))
}

type Record = BTreeMap<String, Vec<String>>;

/// Splits `pacman -Si` / `pacman -Qi` output into `Field : value` records.
/// Continuation lines (indented) append to the previous field.
fn parse_records(text: &str) -> Vec<Record> {
    let mut records = Vec::new();
    let mut current = Record::new();
    let mut last_key: Option<String> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            last_key = None;
            continue;
        }
        if line.starts_with(char::is_whitespace) {
            if let Some(values) = last_key.as_ref().and_then(|key| current.get_mut(key)) {
                values.push(line.trim().to_string());
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            current
                .entry(key.clone())
                .or_default()
                .push(value.trim().to_string());
            last_key = Some(key);
        }
    }
    if !current.is_empty() {
        records.push(current);
    }
    records
}

fn field<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .and_then(|values| values.first())
        .map(String::as_str)
        .filter(|value| !value.is_empty() && *value != "None")
}

/// Whitespace separated list field (`Depends On`, `Provides`, ...).
fn list_field(record: &Record, key: &str) -> Vec<String> {
    record
        .get(key)
        .into_iter()
        .flatten()
        .flat_map(|value| value.split_whitespace())
        .filter(|item| *item != "None")
        .map(str::to_string)
        .collect()
}

/// `Optional Deps` carries one `name: description` entry per line.
fn optional_field(record: &Record) -> Vec<String> {
    record
        .get("Optional Deps")
        .into_iter()
        .flatten()
        .map(|value| value.trim_end_matches("[installed]").trim())
        .filter(|value| !value.is_empty() && *value != "None")
        .map(str::to_string)
        .collect()
}

/// Parses `LANG=C pacman -Si` (REPO) or `pacman -Qi` (LOCAL) output.
pub fn parse_package_info(text: &str, source: PackageSource) -> Result<Vec<PackageRef>> {
    let mut packages = Vec::new();
    for record in parse_records(text) {
        let name = field(&record, "Name")
            .ok_or_else(|| AursError::ParseError("pacman output", "record without Name".into()))?;
        let version = field(&record, "Version").ok_or_else(|| {
            AursError::ParseError("pacman output", format!("'{name}' has no Version"))
        })?;

        let mut package = PackageRef::new(name, version, source);
        if let Some(base) = field(&record, "Base") {
            package.package_base = base.to_string();
        }
        package.repository = field(&record, "Repository").map(str::to_string);
        package.description = field(&record, "Description").map(str::to_string);
        package.url = field(&record, "URL").map(str::to_string);
        package.depends =
            DependencySpec::parse_all(&list_field(&record, "Depends On"), DependencyTag::RUNTIME);
        package.opt_depends =
            DependencySpec::parse_all(&optional_field(&record), DependencyTag::OPTIONAL);
        package.provides =
            DependencySpec::parse_all(&list_field(&record, "Provides"), DependencyTag::empty());
        package.conflicts =
            DependencySpec::parse_all(&list_field(&record, "Conflicts With"), DependencyTag::empty());
        package.replaces =
            DependencySpec::parse_all(&list_field(&record, "Replaces"), DependencyTag::empty());
        packages.push(package);
    }
    Ok(packages)
}

/// `PackageDatabase` backed by the pacman CLI.
#[derive(Debug, Clone, Default)]
pub struct PacmanDatabase;

impl PacmanDatabase {
    pub fn new() -> Result<Self> {
        require_binary(PACMAN)?;
        Ok(Self)
    }

    fn query(&self, flag: &str) -> Result<String> {
        let output = run_command_sync(PACMAN, &[flag.to_string()], None, &C_LOCALE)?;
        stdout_or_error(PACMAN, &output)
    }
}

impl PackageDatabase for PacmanDatabase {
    #[instrument(skip(self))]
    fn repo_packages(&self) -> Result<Vec<PackageRef>> {
        let packages = parse_package_info(&self.query("-Si")?, PackageSource::Repo)?;
        debug!("pacman reported {} repository packages", packages.len());
        Ok(packages)
    }

    #[instrument(skip(self))]
    fn local_packages(&self) -> Result<Vec<PackageRef>> {
        let packages = parse_package_info(&self.query("-Qi")?, PackageSource::Local)?;
        debug!("pacman reported {} installed packages", packages.len());
        Ok(packages)
    }

    fn repo_priority(&self) -> Result<Vec<String>> {
        let output = run_command_sync(PACMAN_CONF, &["--repo-list".to_string()], None, &C_LOCALE)?;
        Ok(stdout_or_error(PACMAN_CONF, &output)?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Installs packages through `pacman`, prefixed with the privilege tool.
#[derive(Debug, Clone)]
pub struct PacmanInstaller {
    privilege_tool: Option<String>,
    noconfirm: bool,
}

impl PacmanInstaller {
    pub fn new(privilege_tool: Option<String>, noconfirm: bool) -> Self {
        Self {
            privilege_tool,
            noconfirm,
        }
    }

    fn run(&self, mut args: Vec<String>) -> Result<()> {
        if self.noconfirm {
            args.push("--noconfirm".to_string());
        }
        let (command, args) = with_privilege(self.privilege_tool.as_deref(), PACMAN, &args);
        let status = run_command_inherit(&command, &args, None, &[])?;
        if status.success() {
            Ok(())
        } else {
            Err(AursError::InstallError(format!(
                "{} {} exited with {}",
                command,
                args.join(" "),
                status
            )))
        }
    }
}

fn install_args<I>(operation: &[&str], reason: InstallReason, operands: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args: Vec<String> = operation.iter().map(|arg| arg.to_string()).collect();
    args.extend(reason.pacman_flag().map(str::to_string));
    args.extend(operands);
    args
}

impl Installer for PacmanInstaller {
    fn install_repo_packages(&self, names: &[String], reason: InstallReason) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        self.run(install_args(&["-S", "--needed"], reason, names.iter().cloned()))
    }

    fn install_files(&self, paths: &[PathBuf], reason: InstallReason) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let operands = paths.iter().map(|p| p.display().to_string());
        self.run(install_args(&["-U"], reason, operands))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SI_OUTPUT: &str = "\
Repository      : core
Name            : glibc
Version         : 2.39-1
Description     : GNU C Library
Architecture    : x86_64
URL             : https://www.gnu.org/software/libc
Provides        : libc.so=6-64  libm.so=6-64
Depends On      : linux-api-headers>=4.10  tzdata  filesystem
Optional Deps   : gd: for memusagestat
                  perl: for mtrace
Conflicts With  : None
Replaces        : None

Repository      : extra
Name            : git
Version         : 2.44.0-1
Description     : the fast distributed version control system
Architecture    : x86_64
URL             : https://git-scm.com/
Provides        : None
Depends On      : curl  expat  perl>=5.14.0
Optional Deps   : None
Conflicts With  : git-git
Replaces        : git-core
";

    #[test]
    fn test_parses_repository_records() {
        let packages = parse_package_info(SI_OUTPUT, PackageSource::Repo).unwrap();
        assert_eq!(packages.len(), 2);

        let glibc = &packages[0];
        assert_eq!(glibc.name, "glibc");
        assert_eq!(glibc.version, "2.39-1");
        assert_eq!(glibc.repository.as_deref(), Some("core"));
        assert_eq!(glibc.package_base, "glibc");
        assert_eq!(glibc.provides.len(), 2);
        assert_eq!(glibc.provides[0].package_name, "libc.so");
        assert_eq!(glibc.depends[0].raw_line, "linux-api-headers>=4.10");
        assert_eq!(glibc.opt_depends.len(), 2);
        assert_eq!(glibc.opt_depends[1].package_name, "perl");
        assert!(glibc.conflicts.is_empty());

        let git = &packages[1];
        assert_eq!(git.conflicts[0].package_name, "git-git");
        assert_eq!(git.replaces[0].package_name, "git-core");
        assert!(git.opt_depends.is_empty());
    }

    #[test]
    fn test_local_records_strip_installed_marker() {
        let qi = "\
Name            : yay
Version         : 12.3.5-1
Depends On      : pacman>5  git
Optional Deps   : sudo: privilege elevation [installed]
Install Reason  : Explicitly installed
";
        let packages = parse_package_info(qi, PackageSource::Local).unwrap();
        assert_eq!(packages[0].source, PackageSource::Local);
        assert_eq!(packages[0].opt_depends[0].raw_line, "sudo: privilege elevation");
        assert_eq!(packages[0].opt_depends[0].package_name, "sudo");
        assert!(packages[0].repository.is_none());
    }

    #[test]
    fn test_record_without_version_is_rejected() {
        let err = parse_package_info("Name : broken\n", PackageSource::Local).unwrap_err();
        assert!(matches!(err, AursError::ParseError(_, _)));
    }

    #[test]
    fn test_empty_output_has_no_packages() {
        assert!(parse_package_info("\n\n", PackageSource::Repo).unwrap().is_empty());
    }

    #[test]
    fn test_install_args_carry_the_reason() {
        let files = vec!["/cache/yay-12.3-1-x86_64.pkg.tar.zst".to_string()];
        assert_eq!(
            install_args(&["-U"], InstallReason::Explicit, files.clone()),
            vec!["-U", "--asexplicit", "/cache/yay-12.3-1-x86_64.pkg.tar.zst"]
        );
        assert_eq!(
            install_args(&["-S", "--needed"], InstallReason::Dependency, vec!["git".to_string()]),
            vec!["-S", "--needed", "--asdeps", "git"]
        );
        assert_eq!(install_args(&["-U"], InstallReason::Keep, files).len(), 2);
    }
}
