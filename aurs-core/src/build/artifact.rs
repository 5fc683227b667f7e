// aurs-core/src/build/artifact.rs
use std::path::{Path, PathBuf};

/// Components of a `name-pkgver-pkgrel-arch.pkg.tar.*` file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName<'a> {
    pub name: &'a str,
    pub version: String,
    pub arch: &'a str,
}

pub fn parse_artifact_name(file_name: &str) -> Option<ArtifactName<'_>> {
    let stem = &file_name[..file_name.find(".pkg.tar")?];
    let mut parts = stem.rsplitn(4, '-');
    let arch = parts.next()?;
    let pkgrel = parts.next()?;
    let pkgver = parts.next()?;
    let name = parts.next()?;
    if name.is_empty() || pkgver.is_empty() || pkgrel.is_empty() || arch.is_empty() {
        return None;
    }
    Some(ArtifactName {
        name,
        version: format!("{pkgver}-{pkgrel}"),
        arch,
    })
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// Picks the artifact for `pkgname`, preferring one built for `arch` over an
/// `any` package. Signatures and unrelated files are ignored.
pub fn select_artifact<'a>(candidates: &'a [PathBuf], pkgname: &str, arch: &str) -> Option<&'a PathBuf> {
    candidates
        .iter()
        .filter(|path| !path.to_string_lossy().ends_with(".sig"))
        .filter_map(|path| {
            let parsed = parse_artifact_name(file_name(path)?)?;
            if parsed.name != pkgname {
                return None;
            }
            let rank = if parsed.arch == arch {
                0
            } else if parsed.arch == "any" {
                1
            } else {
                return None;
            };
            Some((rank, path))
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_artifact_name_handles_dashed_names() {
        let parsed = parse_artifact_name("python-foo-bar-1:2.0.r3.gabc-2-x86_64.pkg.tar.zst").unwrap();
        assert_eq!(parsed.name, "python-foo-bar");
        assert_eq!(parsed.version, "1:2.0.r3.gabc-2");
        assert_eq!(parsed.arch, "x86_64");
        assert!(parse_artifact_name("PKGBUILD").is_none());
        assert!(parse_artifact_name("x-1.pkg.tar.zst").is_none());
    }

    #[test]
    fn test_exact_arch_preferred_over_any() {
        let candidates = vec![
            PathBuf::from("/b/foo-1-1-any.pkg.tar.zst"),
            PathBuf::from("/b/foo-1-1-x86_64.pkg.tar.zst"),
            PathBuf::from("/b/foo-1-1-x86_64.pkg.tar.zst.sig"),
            PathBuf::from("/b/foo-debug-1-1-x86_64.pkg.tar.zst"),
        ];
        assert_eq!(
            select_artifact(&candidates, "foo", "x86_64"),
            Some(&candidates[1])
        );
        assert_eq!(
            select_artifact(&candidates, "foo-debug", "x86_64"),
            Some(&candidates[3])
        );
    }

    #[test]
    fn test_any_used_when_no_exact_match() {
        let candidates = vec![
            PathBuf::from("/b/foo-1-1-aarch64.pkg.tar.zst"),
            PathBuf::from("/b/foo-1-1-any.pkg.tar.xz"),
        ];
        assert_eq!(
            select_artifact(&candidates, "foo", "x86_64"),
            Some(&candidates[1])
        );
        assert_eq!(select_artifact(&candidates, "bar", "x86_64"), None);
    }
}
