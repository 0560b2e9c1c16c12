//! Versioned artifact store over flat timestamp-named JSON files.
//!
//! Both the raw snapshot store and the derived artifact store share one
//! addressing scheme: files are named `{prefix}_{YYYYmmdd_HHMMSS}.json` and
//! the most recent artifact for a prefix is the lexicographically last match.
//! The scheme is reconstructible from a directory listing alone; there is no
//! index or pointer file. Snapshots are append-only and artifacts are never
//! edited in place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// Timestamp format embedded in artifact filenames.
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const STAMP_LEN: usize = 15;

/// A flat directory of timestamp-named JSON artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All files matching `{prefix}_*.json`, sorted by filename ascending.
    /// Lexicographic order on the embedded stamp is chronological order.
    fn matching_files(&self, prefix: &str) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let wanted = format!("{prefix}_");
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension().is_some_and(|ext| ext == "json")
                    && p.file_stem()
                        .and_then(|s| s.to_str())
                        .is_some_and(|s| s.starts_with(&wanted))
            })
            .collect();
        files.sort();
        files
    }

    /// Path of the most recent artifact for a prefix, if any exists.
    pub fn latest_path(&self, prefix: &str) -> Option<PathBuf> {
        self.matching_files(prefix).into_iter().next_back()
    }

    /// Load the most recent artifact for a prefix.
    ///
    /// Returns `Ok(None)` when no file matches. A corrupt or unreadable file
    /// is logged and reported as `Err` so callers can decide whether the
    /// source is simply absent or broken.
    pub fn latest<T: DeserializeOwned>(&self, prefix: &str) -> io::Result<Option<T>> {
        let Some(path) = self.latest_path(prefix) else {
            return Ok(None);
        };
        debug!(path = %path.display(), "loading latest artifact");
        match load_json(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to load artifact");
                Err(err)
            }
        }
    }

    /// Artifacts whose filename stamp falls within the last `lookback_days`
    /// before `now`, sorted ascending. Files with unparseable stamps are
    /// skipped.
    pub fn history(&self, prefix: &str, lookback_days: i64, now: DateTime<Utc>) -> Vec<PathBuf> {
        let cutoff = now - chrono::Duration::days(lookback_days);
        self.matching_files(prefix)
            .into_iter()
            .filter(|path| {
                stamp_of(path, prefix).is_some_and(|stamp| stamp >= cutoff && stamp <= now)
            })
            .collect()
    }

    /// Persist a new artifact stamped with the current time.
    ///
    /// Never overwrites: a collision within the same second gets a numeric
    /// suffix after the stamp, which still sorts later lexicographically.
    pub fn write<T: Serialize>(&self, prefix: &str, value: &T) -> io::Result<PathBuf> {
        self.write_at(prefix, value, Utc::now())
    }

    /// Persist a new artifact stamped with an explicit time. Used by tests
    /// and by callers that seed historical snapshots.
    pub fn write_at<T: Serialize>(
        &self,
        prefix: &str,
        value: &T,
        stamp: DateTime<Utc>,
    ) -> io::Result<PathBuf> {
        let base = format!("{prefix}_{}", stamp.format(STAMP_FORMAT));
        let mut path = self.root.join(format!("{base}.json"));
        let mut counter = 1;
        while path.exists() {
            path = self.root.join(format!("{base}_{counter}.json"));
            counter += 1;
        }
        atomic_write_json(&path, value)?;
        debug!(path = %path.display(), "wrote artifact");
        Ok(path)
    }
}

/// Parse the timestamp embedded in an artifact filename.
fn stamp_of(path: &Path, prefix: &str) -> Option<DateTime<Utc>> {
    let stem = path.file_stem()?.to_str()?;
    let rest = stem.strip_prefix(prefix)?.strip_prefix('_')?;
    if rest.len() < STAMP_LEN {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(&rest[..STAMP_LEN], STAMP_FORMAT).ok()?;
    Some(naive.and_utc())
}

/// Atomically write pretty-printed JSON: write to a `.tmp` sibling, then
/// rename onto the target. Creates parent directories if needed.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json.as_bytes())?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Load and deserialize JSON from a file.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> io::Result<T> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn at(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_latest_wins_by_lexicographic_order() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        store.write_at("velocity_enterprise", &1u32, at(2026, 8, 1, 6)).unwrap();
        store.write_at("velocity_enterprise", &2u32, at(2026, 8, 15, 6)).unwrap();
        store.write_at("velocity_enterprise", &3u32, at(2026, 8, 10, 6)).unwrap();

        let latest: Option<u32> = store.latest("velocity_enterprise").unwrap();
        assert_eq!(latest, Some(2));
    }

    #[test]
    fn test_latest_ignores_other_prefixes() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        store.write_at("velocity_enterprise", &1u32, at(2026, 8, 1, 6)).unwrap();
        store.write_at("insights_enterprise", &9u32, at(2026, 8, 20, 6)).unwrap();

        let latest: Option<u32> = store.latest("velocity_enterprise").unwrap();
        assert_eq!(latest, Some(1));
    }

    #[test]
    fn test_latest_missing_directory_is_none() {
        let store = ArtifactStore::new("/nonexistent/adoptrack");
        let latest: io::Result<Option<u32>> = store.latest("quality_validation");
        assert_eq!(latest.unwrap(), None);
    }

    #[test]
    fn test_corrupt_artifact_is_an_error_not_none() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        fs::write(dir.path().join("github_20260801_060000.json"), "{not json").unwrap();

        let result: io::Result<Option<u32>> = store.latest("github");
        assert!(result.is_err());
    }

    #[test]
    fn test_history_respects_lookback_window() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let now = at(2026, 8, 31, 12);

        store.write_at("github", &1u32, at(2026, 6, 1, 6)).unwrap(); // too old
        store.write_at("github", &2u32, at(2026, 8, 5, 6)).unwrap();
        store.write_at("github", &3u32, at(2026, 8, 30, 6)).unwrap();

        let history = store.history("github", 30, now);
        assert_eq!(history.len(), 2);
        // Ascending order: earliest qualifying first.
        let v: u32 = load_json(&history[0]).unwrap();
        assert_eq!(v, 2);
        let v: u32 = load_json(&history[1]).unwrap();
        assert_eq!(v, 3);
    }

    #[test]
    fn test_same_second_writes_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let stamp = at(2026, 8, 31, 12);

        let first = store.write_at("comparative_analysis", &1u32, stamp).unwrap();
        let second = store.write_at("comparative_analysis", &2u32, stamp).unwrap();
        assert_ne!(first, second);

        // Latest-wins still resolves to the later write.
        let latest: Option<u32> = store.latest("comparative_analysis").unwrap();
        assert_eq!(latest, Some(2));
    }

    #[test]
    fn test_no_tmp_leftover_after_write() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = store.write_at("quality_validation", &42u32, at(2026, 8, 31, 12)).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }
}
