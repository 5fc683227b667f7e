// aurs-common/src/model/srcinfo.rs
//! Parser for the `.SRCINFO` build metadata file.

use std::collections::BTreeMap;

use crate::dependency::{DependencySpec, DependencyTag};
use crate::error::{AursError, Result};
use crate::model::package::{PackageRef, PackageSource};

type Section = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SrcInfo {
    pub package_base: String,
    base: Section,
    packages: Vec<(String, Section)>,
}

enum Cursor {
    None,
    Base,
    Package(usize),
}

impl SrcInfo {
    pub fn parse(text: &str) -> Result<Self> {
        let mut info = SrcInfo::default();
        let mut cursor = Cursor::None;

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                AursError::ParseError(
                    ".SRCINFO",
                    format!("line {}: expected 'key = value', got '{line}'", lineno + 1),
                )
            })?;
            let key = key.trim();
            let value = value.trim();

            match key {
                "pkgbase" => {
                    info.package_base = value.to_string();
                    cursor = Cursor::Base;
                }
                "pkgname" => {
                    info.packages.push((value.to_string(), Section::new()));
                    cursor = Cursor::Package(info.packages.len() - 1);
                }
                _ => {
                    let section = match cursor {
                        Cursor::Base => &mut info.base,
                        Cursor::Package(idx) => &mut info.packages[idx].1,
                        Cursor::None => {
                            return Err(AursError::ParseError(
                                ".SRCINFO",
                                format!("line {}: '{key}' appears before pkgbase", lineno + 1),
                            ))
                        }
                    };
                    let values = section.entry(key.to_string()).or_default();
                    // `depends =` with no value clears the inherited list.
                    if !value.is_empty() {
                        values.push(value.to_string());
                    }
                }
            }
        }

        if info.package_base.is_empty() {
            return Err(AursError::ParseError(
                ".SRCINFO",
                "missing pkgbase".to_string(),
            ));
        }
        if info.packages.is_empty() {
            return Err(AursError::ParseError(
                ".SRCINFO",
                format!("no pkgname sections for '{}'", info.package_base),
            ));
        }
        Ok(info)
    }

    pub fn package_names(&self) -> Vec<&str> {
        self.packages.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn base_value(&self, key: &str) -> Option<&str> {
        self.base
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Values for `key` as seen by `pkgname`: its own section wins over the base.
    pub fn values(&self, pkgname: &str, key: &str) -> &[String] {
        let own = self
            .packages
            .iter()
            .find(|(name, _)| name == pkgname)
            .and_then(|(_, section)| section.get(key));
        match own.or_else(|| self.base.get(key)) {
            Some(values) => values,
            None => &[],
        }
    }

    /// Plain values plus the `key_<arch>` variant.
    pub fn arch_values(&self, pkgname: &str, key: &str, arch: &str) -> Vec<String> {
        let mut values = self.values(pkgname, key).to_vec();
        values.extend_from_slice(self.values(pkgname, &format!("{key}_{arch}")));
        values
    }

    pub fn pkgver(&self) -> Option<&str> {
        self.base_value("pkgver")
    }

    /// `epoch:pkgver-pkgrel`, with the epoch omitted when unset or zero.
    pub fn full_version(&self) -> String {
        let pkgver = self.base_value("pkgver").unwrap_or("0");
        let pkgrel = self.base_value("pkgrel").unwrap_or("1");
        match self.base_value("epoch") {
            Some(epoch) if epoch != "0" => format!("{epoch}:{pkgver}-{pkgrel}"),
            _ => format!("{pkgver}-{pkgrel}"),
        }
    }

    pub fn install_script(&self, pkgname: &str) -> Option<&str> {
        self.values(pkgname, "install").first().map(String::as_str)
    }

    pub fn architectures(&self, pkgname: &str) -> &[String] {
        self.values(pkgname, "arch")
    }

    /// Projects one `pkgname` section into a registry `PackageRef`.
    pub fn package(&self, pkgname: &str, arch: &str) -> Option<PackageRef> {
        if !self.packages.iter().any(|(name, _)| name == pkgname) {
            return None;
        }
        let specs = |key: &str, tags: DependencyTag| {
            DependencySpec::parse_all(&self.arch_values(pkgname, key, arch), tags)
        };

        let mut package = PackageRef::new(pkgname, self.full_version(), PackageSource::Registry)
            .with_base(self.package_base.clone());
        package.description = self.values(pkgname, "pkgdesc").first().cloned();
        package.url = self.values(pkgname, "url").first().cloned();
        package.depends = specs("depends", DependencyTag::RUNTIME);
        package.make_depends = specs("makedepends", DependencyTag::BUILD);
        package.check_depends = specs("checkdepends", DependencyTag::TEST);
        package.opt_depends = specs("optdepends", DependencyTag::OPTIONAL);
        package.provides = specs("provides", DependencyTag::empty());
        package.conflicts = specs("conflicts", DependencyTag::empty());
        package.replaces = specs("replaces", DependencyTag::empty());
        Some(package)
    }

    pub fn packages(&self, arch: &str) -> Vec<PackageRef> {
        self.packages
            .iter()
            .filter_map(|(name, _)| self.package(name, arch))
            .collect()
    }

    /// Every runtime, build and check dependency across all members, deduplicated
    /// by line.
    pub fn dependencies(&self, arch: &str) -> Vec<DependencySpec> {
        let mut seen = std::collections::BTreeSet::new();
        let mut out = Vec::new();
        for package in self.packages(arch) {
            for spec in package.build_dependencies(true) {
                if seen.insert(spec.raw_line.clone()) {
                    out.push(spec.clone());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPLIT: &str = r#"
pkgbase = python-foo
	pkgdesc = Foo bindings
	pkgver = 1.2.3
	pkgrel = 2
	epoch = 1
	url = https://example.org
	arch = x86_64
	arch = aarch64
	makedepends = python-build
	checkdepends = python-pytest
	depends = glibc
	depends_x86_64 = lib32-glibc

pkgname = python-foo
	depends = python
	depends = glibc>=2.38
	provides = foo=1.2.3

pkgname = python-foo-docs
	arch = any
	depends =
	install = docs.install
"#;

    #[test]
    fn test_parse_split_package() {
        let info = SrcInfo::parse(SPLIT).unwrap();
        assert_eq!(info.package_base, "python-foo");
        assert_eq!(info.package_names(), vec!["python-foo", "python-foo-docs"]);
        assert_eq!(info.full_version(), "1:1.2.3-2");
    }

    #[test]
    fn test_package_section_overrides_base() {
        let info = SrcInfo::parse(SPLIT).unwrap();
        assert_eq!(info.values("python-foo", "depends"), ["python", "glibc>=2.38"]);
        assert!(info.values("python-foo-docs", "depends").is_empty());
        assert_eq!(info.architectures("python-foo-docs"), ["any"]);
        assert_eq!(info.architectures("python-foo"), ["x86_64", "aarch64"]);
        assert_eq!(info.install_script("python-foo-docs"), Some("docs.install"));
        assert_eq!(info.install_script("python-foo"), None);
    }

    #[test]
    fn test_arch_suffixed_values_are_appended() {
        let info = SrcInfo::parse(SPLIT).unwrap();
        let deps = info.arch_values("python-foo", "depends", "x86_64");
        assert_eq!(deps, vec!["python", "glibc>=2.38", "lib32-glibc"]);
        let deps = info.arch_values("python-foo", "depends", "aarch64");
        assert_eq!(deps, vec!["python", "glibc>=2.38"]);
    }

    #[test]
    fn test_dependencies_union_members() {
        let info = SrcInfo::parse(SPLIT).unwrap();
        let names: Vec<String> = info
            .dependencies("x86_64")
            .into_iter()
            .map(|d| d.package_name)
            .collect();
        assert!(names.contains(&"python".to_string()));
        assert!(names.contains(&"python-build".to_string()));
        assert!(names.contains(&"python-pytest".to_string()));
        assert!(names.contains(&"lib32-glibc".to_string()));
    }

    #[test]
    fn test_package_projection_carries_provides() {
        let info = SrcInfo::parse(SPLIT).unwrap();
        let pkg = info.package("python-foo", "x86_64").unwrap();
        assert_eq!(pkg.package_base, "python-foo");
        assert_eq!(pkg.version, "1:1.2.3-2");
        assert_eq!(pkg.provides[0].package_name, "foo");
        assert!(info.package("missing", "x86_64").is_none());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(SrcInfo::parse("pkgname = x").is_err());
        assert!(SrcInfo::parse("pkgbase = x\nnot a pair").is_err());
        assert!(SrcInfo::parse("pkgbase = x\npkgver = 1").is_err());
    }
}
