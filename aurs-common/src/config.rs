// aurs-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use tracing::debug;

use super::error::{AursError, Result};

const DEFAULT_RPC_URL: &str = "https://aur.archlinux.org/rpc/";
const DEFAULT_AUR_URL: &str = "https://aur.archlinux.org";
const DEFAULT_PRIVILEGE_TOOL: &str = "sudo";
const DEFAULT_RPC_BATCH_SIZE: usize = 200;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const REVISIONS_FILENAME: &str = "revisions.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub cache_root: PathBuf,
    pub state_root: PathBuf,
    pub rpc_url: String,
    pub aur_url: String,
    pub arch: String,
    /// `None` when running as root or when `AURS_PRIVILEGE_TOOL` is empty.
    pub privilege_tool: Option<String>,
    pub rpc_batch_size: usize,
    pub http_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading aurs configuration");
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        debug!("Configuration loaded successfully.");
        Ok(config)
    }

    /// Builds a configuration from an arbitrary key lookup; `load` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let project_dirs = ProjectDirs::from("org", "aurs", "aurs");

        let cache_root = match var("AURS_CACHE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => project_dirs
                .as_ref()
                .map(|dirs| dirs.cache_dir().to_path_buf())
                .ok_or_else(|| {
                    AursError::Config("Could not determine a cache directory".to_string())
                })?,
        };
        debug!("Effective cache root set to: {}", cache_root.display());

        let state_root = match var("AURS_STATE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => project_dirs
                .as_ref()
                .map(|dirs| {
                    dirs.state_dir()
                        .unwrap_or_else(|| dirs.data_local_dir())
                        .to_path_buf()
                })
                .unwrap_or_else(|| cache_root.join("state")),
        };

        let rpc_url = var("AURS_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        let aur_url = var("AURS_AUR_URL")
            .unwrap_or_else(|| DEFAULT_AUR_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let arch = var("AURS_ARCH").unwrap_or_else(|| env::consts::ARCH.to_string());

        // An explicitly empty value disables the privilege tool.
        let privilege_tool = match lookup("AURS_PRIVILEGE_TOOL") {
            Some(tool) if tool.trim().is_empty() => None,
            Some(tool) => Some(tool),
            None => Some(DEFAULT_PRIVILEGE_TOOL.to_string()),
        };

        let rpc_batch_size = match var("AURS_RPC_BATCH_SIZE") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(AursError::Config(format!(
                        "AURS_RPC_BATCH_SIZE must be a positive integer, got '{raw}'"
                    )))
                }
            },
            None => DEFAULT_RPC_BATCH_SIZE,
        };

        let http_timeout = match var("AURS_HTTP_TIMEOUT_SECS") {
            Some(raw) => parse_timeout(&raw)?,
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            cache_root,
            state_root,
            rpc_url,
            aur_url,
            arch,
            privilege_tool,
            rpc_batch_size,
            http_timeout,
        })
    }

    /// Configuration rooted at a single directory, used by tests and dry runs.
    pub fn with_root(root: &Path) -> Self {
        Self {
            cache_root: root.join("cache"),
            state_root: root.join("state"),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            aur_url: DEFAULT_AUR_URL.to_string(),
            arch: env::consts::ARCH.to_string(),
            privilege_tool: None,
            rpc_batch_size: DEFAULT_RPC_BATCH_SIZE,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    pub fn clone_dir(&self) -> PathBuf {
        self.cache_root.join("clone")
    }

    pub fn build_dir(&self) -> PathBuf {
        self.cache_root.join("build")
    }

    pub fn package_cache_dir(&self) -> PathBuf {
        self.cache_root.join("pkg")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.state_root.join("logs")
    }

    pub fn revisions_path(&self) -> PathBuf {
        self.state_root.join(REVISIONS_FILENAME)
    }

    pub fn package_clone_path(&self, package_base: &str) -> PathBuf {
        self.clone_dir().join(package_base)
    }

    pub fn package_build_path(&self, package_base: &str) -> PathBuf {
        self.build_dir().join(package_base)
    }
}

/// Accepts either a bare number of seconds or a humantime string like `1m 30s`.
fn parse_timeout(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(raw).map_err(|e| {
        AursError::Config(format!("Invalid AURS_HTTP_TIMEOUT_SECS '{raw}': {e}"))
    })
}

pub fn load_config() -> Result<Config> {
    Config::load()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup_from(&[("AURS_CACHE_DIR", "/tmp/aurs-cache")]))
            .unwrap();
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.aur_url, DEFAULT_AUR_URL);
        assert_eq!(config.rpc_batch_size, 200);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.privilege_tool.as_deref(), Some("sudo"));
        assert_eq!(config.clone_dir(), PathBuf::from("/tmp/aurs-cache/clone"));
    }

    #[test]
    fn test_overrides_are_honoured() {
        let config = Config::from_lookup(lookup_from(&[
            ("AURS_CACHE_DIR", "/c"),
            ("AURS_STATE_DIR", "/s"),
            ("AURS_AUR_URL", "http://localhost:8080/"),
            ("AURS_ARCH", "aarch64"),
            ("AURS_PRIVILEGE_TOOL", ""),
            ("AURS_RPC_BATCH_SIZE", "50"),
            ("AURS_HTTP_TIMEOUT_SECS", "1m"),
        ]))
        .unwrap();
        assert_eq!(config.arch, "aarch64");
        assert_eq!(config.privilege_tool, None);
        assert_eq!(config.rpc_batch_size, 50);
        assert_eq!(config.http_timeout, Duration::from_secs(60));
        assert_eq!(config.aur_url, "http://localhost:8080");
        assert_eq!(config.revisions_path(), PathBuf::from("/s/revisions.json"));
    }

    #[test]
    fn test_invalid_batch_size_is_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("AURS_CACHE_DIR", "/c"),
            ("AURS_RPC_BATCH_SIZE", "zero"),
        ]));
        assert!(matches!(result, Err(AursError::Config(_))));
    }
}
