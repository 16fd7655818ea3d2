//! Timestamp-versioned snapshot storage.
//!
//! Layout, preserved bit-exact for downstream consumers:
//!
//! ```text
//! <root>/<device>/<running|startup>/<YYYYMMDDHHMM>/<hostname>_<kind>.txt
//! <root>/<device>/diff/<YYYYMMDDHHMM>/<hostname>_diff.txt
//! <root>/reports/<YYYYMMDD>.txt        (append-only, multiple runs per day)
//! ```
//!
//! A version directory, once created, is never modified or deleted here;
//! unchanged content is deduplicated against the latest stored version
//! instead of being written again.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::{debug, info};

use crate::device::{ConfigKind, Device};
use crate::error::StoreError;

/// Result of a store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    /// Path of the snapshot file (new, or the deduplicated previous one).
    pub path: PathBuf,

    /// Whether a new version directory was created.
    pub is_new_version: bool,
}

/// A previously persisted snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Path of the snapshot file.
    pub path: PathBuf,

    /// The stored configuration text.
    pub content: String,
}

/// Manages the per-device, per-kind version tree under one root directory.
pub struct SnapshotStore {
    root: PathBuf,
    clock: fn() -> DateTime<Local>,
}

impl SnapshotStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: Local::now,
        }
    }

    /// Replace the clock used for version stamps. Tests inject a stepping
    /// clock so two writes in the same minute still get distinct versions.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Local>) -> Self {
        self.clock = clock;
        self
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist `content` for (device, kind), deduplicating against the
    /// latest stored version.
    ///
    /// Returns the existing path with `is_new_version = false` when the
    /// content is byte-identical to the latest snapshot; otherwise writes a
    /// new version directory keyed by the current minute.
    pub fn store(
        &self,
        device: &Device,
        kind: ConfigKind,
        content: &str,
    ) -> Result<StoredSnapshot, StoreError> {
        if let Some(latest) = self.latest(device, kind)? {
            if latest.content == content {
                debug!(
                    "device {} - {} config unchanged, reusing {}",
                    device.label(),
                    kind,
                    latest.path.display()
                );
                return Ok(StoredSnapshot {
                    path: latest.path,
                    is_new_version: false,
                });
            }
        }

        let version_dir = self
            .kind_dir(device, kind)
            .join((self.clock)().format("%Y%m%d%H%M").to_string());
        fs::create_dir_all(&version_dir).map_err(|e| StoreError::io(&version_dir, e))?;

        let path = version_dir.join(format!("{}_{}.txt", device.hostname, kind));
        fs::write(&path, content).map_err(|e| StoreError::io(&path, e))?;

        info!(
            "device {} - {} config saved to {}",
            device.label(),
            kind,
            path.display()
        );

        Ok(StoredSnapshot {
            path,
            is_new_version: true,
        })
    }

    /// The most recently stored snapshot for (device, kind), if any.
    ///
    /// "Latest" is the lexicographically greatest 12-digit version directory,
    /// which matches timestamp order for the `%Y%m%d%H%M` stamp format.
    pub fn latest(
        &self,
        device: &Device,
        kind: ConfigKind,
    ) -> Result<Option<Snapshot>, StoreError> {
        let Some(dir) = self.latest_version_dir(&self.kind_dir(device, kind))? else {
            return Ok(None);
        };

        let path = dir.join(format!("{}_{}.txt", device.hostname, kind));
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
        Ok(Some(Snapshot { path, content }))
    }

    /// Write a rendered diff report for a device:
    /// `<root>/<device>/diff/<YYYYMMDDHHMM>/<hostname>_diff.txt`.
    pub fn write_diff_report(&self, device: &Device, text: &str) -> Result<PathBuf, StoreError> {
        let dir = self
            .root
            .join(device.storage_name())
            .join("diff")
            .join((self.clock)().format("%Y%m%d%H%M").to_string());
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let path = dir.join(format!("{}_diff.txt", device.hostname));
        fs::write(&path, text).map_err(|e| StoreError::io(&path, e))?;
        Ok(path)
    }

    /// Append a run summary to today's report file:
    /// `<root>/reports/<YYYYMMDD>.txt`.
    pub fn append_run_summary(&self, text: &str) -> Result<PathBuf, StoreError> {
        let dir = self.root.join("reports");
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let path = dir.join(format!("{}.txt", (self.clock)().format("%Y%m%d")));
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(text.as_bytes())
            .map_err(|e| StoreError::io(&path, e))?;
        Ok(path)
    }

    fn kind_dir(&self, device: &Device, kind: ConfigKind) -> PathBuf {
        self.root.join(device.storage_name()).join(kind.as_str())
    }

    /// Lexicographically greatest 12-digit subdirectory, or None.
    fn latest_version_dir(&self, dir: &Path) -> Result<Option<PathBuf>, StoreError> {
        if !dir.exists() {
            return Ok(None);
        }

        let mut latest: Option<String> = None;
        for entry in fs::read_dir(dir).map_err(|e| StoreError::io(dir, e))? {
            let entry = entry.map_err(|e| StoreError::io(dir, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.len() != 12 || !name.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            if latest.as_deref().map_or(true, |cur| name.as_str() > cur) {
                latest = Some(name);
            }
        }

        Ok(latest.map(|name| dir.join(name)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};

    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;
    use crate::device::Vendor;

    static TICKS: AtomicI64 = AtomicI64::new(0);

    /// Clock advancing one minute per call, so every store call lands in a
    /// fresh version directory.
    fn stepping_clock() -> DateTime<Local> {
        let tick = TICKS.fetch_add(1, Ordering::SeqCst);
        Local
            .with_ymd_and_hms(2026, 8, 23, 10, 0, 0)
            .unwrap()
            .checked_add_signed(chrono::Duration::minutes(tick))
            .unwrap()
    }

    fn device() -> Device {
        Device {
            hostname: "10.0.0.1".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string().into(),
            port: 22,
            device_type: Vendor::Huawei,
            device_name: "core-sw1".to_string(),
        }
    }

    fn store(tmp: &TempDir) -> SnapshotStore {
        SnapshotStore::new(tmp.path()).with_clock(stepping_clock)
    }

    #[test]
    fn test_first_store_creates_new_version() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        let stored = store.store(&device(), ConfigKind::Running, "X").unwrap();
        assert!(stored.is_new_version);
        assert!(stored.path.exists());
        assert!(stored.path.ends_with("10.0.0.1_running.txt"));
        assert!(stored.path.starts_with(tmp.path().join("core-sw1/running")));
    }

    #[test]
    fn test_idempotent_storage() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        let first = store.store(&device(), ConfigKind::Running, "X").unwrap();
        let second = store.store(&device(), ConfigKind::Running, "X").unwrap();

        assert!(!second.is_new_version);
        assert_eq!(second.path, first.path);

        let versions = fs::read_dir(tmp.path().join("core-sw1/running"))
            .unwrap()
            .count();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_version_on_change() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        let first = store.store(&device(), ConfigKind::Running, "X").unwrap();
        let second = store.store(&device(), ConfigKind::Running, "Y").unwrap();

        assert!(second.is_new_version);
        assert_ne!(second.path, first.path);

        // Both versions retrievable
        assert_eq!(fs::read_to_string(&first.path).unwrap(), "X");
        assert_eq!(fs::read_to_string(&second.path).unwrap(), "Y");

        // latest() sees the new one
        let latest = store.latest(&device(), ConfigKind::Running).unwrap().unwrap();
        assert_eq!(latest.content, "Y");
        assert_eq!(latest.path, second.path);
    }

    #[test]
    fn test_latest_is_none_without_snapshots() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        assert!(store.latest(&device(), ConfigKind::Startup).unwrap().is_none());
    }

    #[test]
    fn test_kinds_are_versioned_independently() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        store.store(&device(), ConfigKind::Running, "R").unwrap();
        store.store(&device(), ConfigKind::Startup, "S").unwrap();

        assert_eq!(
            store.latest(&device(), ConfigKind::Running).unwrap().unwrap().content,
            "R"
        );
        assert_eq!(
            store.latest(&device(), ConfigKind::Startup).unwrap().unwrap().content,
            "S"
        );
    }

    #[test]
    fn test_diff_report_path_layout() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        let path = store.write_diff_report(&device(), "report body").unwrap();
        assert!(path.ends_with("10.0.0.1_diff.txt"));
        assert!(path.starts_with(tmp.path().join("core-sw1/diff")));
        assert_eq!(fs::read_to_string(&path).unwrap(), "report body");
    }

    #[test]
    fn test_run_summary_appends() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        let path = store.append_run_summary("first run\n").unwrap();
        store.append_run_summary("second run\n").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("first run"));
        assert!(content.contains("second run"));
        assert!(path.starts_with(tmp.path().join("reports")));
    }
}
