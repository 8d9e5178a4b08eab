//! Durable per-user view preferences, kept out of the main store.
//!
//! The original product parked these in browser storage as JSON blobs under
//! fixed keys. Here that becomes an explicit key-value port: callers code
//! against [`PrefStore`], production uses the file-backed [`FilePrefs`], and
//! tests use [`MemPrefs`]. The stored JSON shapes keep the original keys and
//! carry a schema version.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::warn;

// ── Fixed keys ───────────────────────────────────────────────────────

pub const NOTIFICATIONS_KEY: &str = "notifications";
pub const BOARD_GROUPS_KEY: &str = "board_groups";
pub const TOP_TABS_KEY: &str = "top_tabs";

pub fn board_view_key(board_id: i64) -> String {
    format!("board_view::{board_id}")
}

// ── Port ─────────────────────────────────────────────────────────────

/// Key-value persistence for user preferences. Values are JSON documents.
pub trait PrefStore {
    fn get_raw(&self, key: &str) -> Option<String>;
    fn set_raw(&mut self, key: &str, value: String) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Read a typed preference. A missing key or a blob that no longer parses
/// both read as absent; stale blobs are not deleted.
pub fn get_pref<T: DeserializeOwned>(store: &dyn PrefStore, key: &str) -> Option<T> {
    let raw = store.get_raw(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Unreadable preference under {key}: {e}");
            None
        }
    }
}

pub fn set_pref<T: Serialize>(store: &mut dyn PrefStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value).context("failed to marshal preference")?;
    store.set_raw(key, raw)
}

// ── Implementations ──────────────────────────────────────────────────

/// File-backed preferences: one JSON document on disk holding every key.
/// The whole document is rewritten on each change.
pub struct FilePrefs {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FilePrefs {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let data = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read prefs: {}", path.display()))?;
            match serde_json::from_str(&data) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Invalid prefs file {}: {e}", path.display());
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    fn flush(&self) -> Result<()> {
        let data = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, data)
            .with_context(|| format!("failed to write prefs: {}", self.path.display()))
    }
}

impl PrefStore for FilePrefs {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set_raw(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// In-memory preferences for tests and in-process callers.
#[derive(Default)]
pub struct MemPrefs {
    entries: BTreeMap<String, String>,
}

impl PrefStore for MemPrefs {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set_raw(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

// ── Stored shapes ────────────────────────────────────────────────────

fn default_version() -> u32 {
    1
}

/// Per-board table view preferences (`board_view::<id>`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardViewSettings {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub visible_columns: Vec<String>,
    #[serde(default)]
    pub sort_column: Option<String>,
    #[serde(default)]
    pub sort_descending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A named bundle of boards shown together in the sidebar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardGroup {
    pub name: String,
    pub board_ids: Vec<i64>,
}

/// Append to the notification feed, newest last.
pub fn append_notification(store: &mut dyn PrefStore, notification: Notification) -> Result<()> {
    let mut feed: Vec<Notification> = get_pref(store, NOTIFICATIONS_KEY).unwrap_or_default();
    feed.push(notification);
    set_pref(store, NOTIFICATIONS_KEY, &feed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_prefs_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        {
            let mut prefs = FilePrefs::open(&path).unwrap();
            let view = BoardViewSettings {
                version: 1,
                visible_columns: vec!["Name".into(), "Amount".into()],
                sort_column: Some("Amount".into()),
                sort_descending: true,
            };
            set_pref(&mut prefs, &board_view_key(3), &view).unwrap();
        }

        let prefs = FilePrefs::open(&path).unwrap();
        let view: BoardViewSettings = get_pref(&prefs, &board_view_key(3)).unwrap();
        assert_eq!(view.visible_columns, vec!["Name", "Amount"]);
        assert!(view.sort_descending);

        // Unknown board reads as absent.
        assert!(get_pref::<BoardViewSettings>(&prefs, &board_view_key(4)).is_none());
    }

    #[test]
    fn test_corrupt_blob_reads_as_absent() {
        let mut prefs = MemPrefs::default();
        prefs.set_raw(TOP_TABS_KEY, "not json".to_string()).unwrap();
        assert!(get_pref::<Vec<String>>(&prefs, TOP_TABS_KEY).is_none());
    }

    #[test]
    fn test_notification_feed_appends() {
        let mut prefs = MemPrefs::default();
        for title in ["Deal won", "Lead assigned"] {
            append_notification(
                &mut prefs,
                Notification {
                    title: title.to_string(),
                    body: String::new(),
                    read: false,
                    created_at: Utc::now(),
                },
            )
            .unwrap();
        }

        let feed: Vec<Notification> = get_pref(&prefs, NOTIFICATIONS_KEY).unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[1].title, "Lead assigned");
    }

    #[test]
    fn test_board_groups_round_trip() {
        let mut prefs = MemPrefs::default();
        let groups = vec![BoardGroup {
            name: "Sales".to_string(),
            board_ids: vec![1, 4],
        }];
        set_pref(&mut prefs, BOARD_GROUPS_KEY, &groups).unwrap();

        let loaded: Vec<BoardGroup> = get_pref(&prefs, BOARD_GROUPS_KEY).unwrap();
        assert_eq!(loaded[0].board_ids, vec![1, 4]);

        prefs.remove(BOARD_GROUPS_KEY).unwrap();
        assert!(get_pref::<Vec<BoardGroup>>(&prefs, BOARD_GROUPS_KEY).is_none());
    }
}
