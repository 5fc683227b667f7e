// aurs-core/src/build/revisions.rs
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use aurs_aio::json_io::{read_json_or_default, write_json_sync};
use aurs_common::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub revision: String,
    pub recorded_at: DateTime<Utc>,
}

/// Git revision each package base was last installed from, persisted as JSON.
#[derive(Debug, Clone)]
pub struct RevisionStore {
    path: PathBuf,
    records: BTreeMap<String, RevisionRecord>,
}

impl RevisionStore {
    pub fn load(path: &Path) -> Result<Self> {
        let records: BTreeMap<String, RevisionRecord> = read_json_or_default(path)?;
        debug!("Loaded {} recorded revision(s) from {}", records.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    /// An empty store that saves to `path`.
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            records: BTreeMap::new(),
        }
    }

    pub fn get(&self, package_base: &str) -> Option<&str> {
        self.records
            .get(package_base)
            .map(|record| record.revision.as_str())
    }

    pub fn record(&mut self, package_base: &str, revision: &str) {
        self.records.insert(
            package_base.to_string(),
            RevisionRecord {
                revision: revision.to_string(),
                recorded_at: Utc::now(),
            },
        );
    }

    pub fn save(&self) -> Result<()> {
        write_json_sync(&self.path, &self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_survive_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("revisions.json");

        let mut store = RevisionStore::load(&path).unwrap();
        assert!(store.is_empty());
        store.record("yay-git", "abc123");
        store.record("paru", "def456");
        store.record("yay-git", "fff000");
        store.save().unwrap();

        let reloaded = RevisionStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("yay-git"), Some("fff000"));
        assert_eq!(reloaded.get("missing"), None);
    }
}
