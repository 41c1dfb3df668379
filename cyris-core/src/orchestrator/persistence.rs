//! Persisted state layout and write-tmp+rename durability, per §6/§5:
//! readers of `range.json` see either the pre- or post-write state, never
//! a torn write.

use std::path::{Path, PathBuf};

use crate::error::{CyrisError, Result};
use crate::model::RangeRecord;

/// Resolves the on-disk layout under a configured base path.
pub struct RangeStore {
    base: PathBuf,
}

impl RangeStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn range_dir(&self, range_id: &str) -> PathBuf {
        self.base.join("ranges").join(range_id)
    }

    pub fn disks_dir(&self, range_id: &str) -> PathBuf {
        self.range_dir(range_id).join("disks")
    }

    pub fn keys_dir(&self, range_id: &str) -> PathBuf {
        self.range_dir(range_id).join("keys")
    }

    pub fn logs_dir(&self, range_id: &str) -> PathBuf {
        self.range_dir(range_id).join("logs")
    }

    pub fn record_path(&self, range_id: &str) -> PathBuf {
        self.range_dir(range_id).join("range.json")
    }

    pub fn ip_cache_path(&self) -> PathBuf {
        self.base.join("ip-cache.json")
    }

    pub fn network_alloc_path(&self) -> PathBuf {
        self.base.join("network-alloc.json")
    }

    pub fn ensure_layout(&self, range_id: &str) -> Result<()> {
        for dir in [self.range_dir(range_id), self.disks_dir(range_id), self.keys_dir(range_id), self.logs_dir(range_id)] {
            std::fs::create_dir_all(&dir).map_err(|e| CyrisError::Internal(format!("cannot create {}: {e}", dir.display())))?;
        }
        Ok(())
    }

    /// Writes `record` via write-tmp-then-rename so a reader never
    /// observes a partially-written file.
    pub fn save(&self, record: &RangeRecord) -> Result<()> {
        self.ensure_layout(&record.range_id)?;
        let path = self.record_path(&record.range_id);
        write_json_atomic(&path, record)
    }

    pub fn load(&self, range_id: &str) -> Result<RangeRecord> {
        let path = self.record_path(range_id);
        let text = std::fs::read_to_string(&path)
            .map_err(|e| CyrisError::Validation(format!("no such range '{range_id}': {e}")))?;
        serde_json::from_str(&text).map_err(|e| CyrisError::Internal(format!("corrupt range.json for '{range_id}': {e}")))
    }

    pub fn exists(&self, range_id: &str) -> bool {
        self.record_path(range_id).exists()
    }

    /// Physically deletes a range's directory (disks, keys, logs, record).
    /// Used by the CLI's `destroy --rm`; the orchestrator itself never
    /// calls this, so a destroyed-but-retained record stays inspectable.
    pub fn remove(&self, range_id: &str) -> Result<()> {
        let dir = self.range_dir(range_id);
        if dir.exists() {
            std::fs::remove_dir_all(&dir).map_err(|e| CyrisError::Internal(format!("cannot remove {}: {e}", dir.display())))?;
        }
        Ok(())
    }

    /// Lists every persisted range record under the base path.
    pub fn list(&self) -> Result<Vec<RangeRecord>> {
        let ranges_dir = self.base.join("ranges");
        if !ranges_dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&ranges_dir)
            .map_err(|e| CyrisError::Internal(format!("cannot list {}: {e}", ranges_dir.display())))?
        {
            let entry = entry.map_err(|e| CyrisError::Internal(format!("directory entry error: {e}")))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(range_id) = entry.file_name().to_str() {
                if let Ok(record) = self.load(range_id) {
                    out.push(record);
                }
            }
        }
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    pub fn log_path_for_step(&self, range_id: &str, step: &str) -> PathBuf {
        self.logs_dir(range_id).join(format!("{step}.log"))
    }
}

/// Serializes `value` to `path` atomically: write to `path.tmp`, then
/// `rename` over the destination (same filesystem, so `rename` is atomic).
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CyrisError::Internal(format!("cannot create {}: {e}", parent.display())))?;
    }
    let tmp = path.with_extension("json.tmp");
    let text = serde_json::to_string_pretty(value).map_err(|e| CyrisError::Internal(format!("serialize failed: {e}")))?;
    std::fs::write(&tmp, text).map_err(|e| CyrisError::Internal(format!("write {} failed: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path).map_err(|e| CyrisError::Internal(format!("rename {} failed: {e}", tmp.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RangeRecord;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = RangeStore::new(dir.path());
        let record = RangeRecord::new("101", "abc123");
        store.save(&record).unwrap();
        let loaded = store.load("101").unwrap();
        assert_eq!(loaded.range_id, "101");
    }

    #[test]
    fn list_enumerates_all_persisted_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let store = RangeStore::new(dir.path());
        store.save(&RangeRecord::new("101", "h1")).unwrap();
        store.save(&RangeRecord::new("102", "h2")).unwrap();
        let all = store.list().unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn load_of_unknown_range_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = RangeStore::new(dir.path());
        assert!(store.load("nope").is_err());
    }
}
