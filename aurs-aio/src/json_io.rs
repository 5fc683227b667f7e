// aurs-aio/src/json_io.rs
use std::path::Path;

use aurs_common::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Writes serializable data to a JSON file (pretty-printed, atomic).
pub fn write_json_sync<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    debug!("Writing JSON to: {}", path.display());
    let json_bytes = serde_json::to_vec_pretty(data)?;
    crate::fs::atomic_write_file(path, &json_bytes)
}

pub fn read_json_sync<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Reading JSON from: {}", path.display());
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Like `read_json_sync`, but a missing file yields `T::default()`.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        debug!("{} does not exist yet, using defaults", path.display());
        return Ok(T::default());
    }
    read_json_sync(path)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_round_trip_through_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state/revisions.json");
        let mut data = BTreeMap::new();
        data.insert("yay".to_string(), "abc123".to_string());
        write_json_sync(&path, &data).unwrap();
        let back: BTreeMap<String, String> = read_json_sync(&path).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_missing_file_yields_default() {
        let tmp = tempfile::tempdir().unwrap();
        let data: BTreeMap<String, String> =
            read_json_or_default(&tmp.path().join("missing.json")).unwrap();
        assert!(data.is_empty());
    }
}
