use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::core::record::{Entity, Record};
use crate::error::CacheError;

/// Bump when the snapshot layout changes; older snapshots are ignored.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Durable key/value storage scoped to this device.
///
/// Every write is a whole-value overwrite.
pub trait LocalCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl LocalCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    // Write to a temp file of our own and rename it over the snapshot, so a
    // crash never leaves half a snapshot and concurrent writers never share one.
    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            key: key.to_string(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(io_err)?;
        let tmp = self
            .dir
            .join(format!("{}.json.{}.tmp", key, uuid::Uuid::new_v4().simple()));
        std::fs::write(&tmp, value).map_err(io_err)?;
        std::fs::rename(&tmp, self.path_for(key)).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            io_err(e)
        })
    }
}

/// In-process cache for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A panic while holding the lock cannot leave a half-written String behind.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot<F> {
    version: u32,
    saved_at: DateTime<Utc>,
    items: Vec<Record<F>>,
}

pub fn serialize_items<F: Entity>(items: &[Record<F>]) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Snapshot {
        version: SNAPSHOT_VERSION,
        saved_at: Utc::now(),
        items: items.to_vec(),
    })
}

/// `None` for unparseable snapshots or ones written by another format version.
pub fn deserialize_items<F: Entity>(raw: &str) -> Option<Vec<Record<F>>> {
    match serde_json::from_str::<Snapshot<F>>(raw) {
        Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => Some(snapshot.items),
        Ok(snapshot) => {
            log::warn!(
                "Ignoring {} snapshot with version {} (expected {})",
                F::COLLECTION,
                snapshot.version,
                SNAPSHOT_VERSION
            );
            None
        }
        Err(e) => {
            log::warn!("Ignoring unreadable {} snapshot: {}", F::COLLECTION, e);
            None
        }
    }
}

/// Read this collection's snapshot; read errors count as "no snapshot".
pub fn read_snapshot<F: Entity>(cache: &dyn LocalCache) -> Option<Vec<Record<F>>> {
    match cache.get(F::CACHE_KEY) {
        Ok(Some(raw)) => deserialize_items(&raw),
        Ok(None) => None,
        Err(e) => {
            log::error!("{}", e);
            None
        }
    }
}

pub fn write_snapshot<F: Entity>(
    cache: &dyn LocalCache,
    items: &[Record<F>],
) -> Result<(), CacheError> {
    let json = serialize_items(items).map_err(|source| CacheError::Serialize {
        key: F::CACHE_KEY.to_string(),
        source,
    })?;
    cache.set(F::CACHE_KEY, &json)
}

/// Mirror `items` to the cache. A failing cache is logged and never blocks the caller.
pub fn mirror<F: Entity>(cache: &dyn LocalCache, items: &[Record<F>]) {
    match write_snapshot(cache, items) {
        Ok(()) => log::debug!("Mirrored {} {} to cache", items.len(), F::COLLECTION),
        Err(e) => log::error!("Failed to mirror {}: {}", F::COLLECTION, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::habit::Habit;
    use crate::core::record::RecordId;
    use crate::core::task::Task;
    use chrono::NaiveDate;

    fn sample() -> Vec<Record<Task>> {
        let mut done = Record::new_local("owner-1", Task::new("Done thing"));
        done.fields.completed = true;
        done.fields.due_date = NaiveDate::from_ymd_opt(2026, 4, 30);
        let mut remote = Record::new_local("owner-1", Task::new("Server thing"));
        remote.id = RecordId::from("task-1");
        vec![done, remote]
    }

    #[test]
    fn snapshot_round_trip_is_exact() {
        let items = sample();
        let raw = serialize_items(&items).unwrap();
        let back: Vec<Record<Task>> = deserialize_items(&raw).unwrap();
        assert_eq!(back, items);
        assert_eq!(back[0].created_at, items[0].created_at);
        assert_eq!(back[0].updated_at, items[0].updated_at);
    }

    #[test]
    fn stale_version_is_ignored() {
        let raw = serde_json::json!({
            "version": SNAPSHOT_VERSION + 1,
            "saved_at": Utc::now(),
            "items": [],
        })
        .to_string();
        assert!(deserialize_items::<Task>(&raw).is_none());
        assert!(deserialize_items::<Task>("not json").is_none());
    }

    #[test]
    fn collections_use_separate_keys() {
        let cache = MemoryCache::new();
        write_snapshot(&cache, &sample()).unwrap();
        assert!(read_snapshot::<Task>(&cache).is_some());
        assert!(read_snapshot::<Habit>(&cache).is_none());
    }

    #[test]
    fn file_cache_overwrites_whole_snapshot() {
        let dir = std::env::temp_dir().join(format!("nook-cache-{}", uuid::Uuid::new_v4()));
        let cache = FileCache::new(&dir);
        assert_eq!(cache.get("nook.tasks").unwrap(), None);

        cache.set("nook.tasks", "first").unwrap();
        cache.set("nook.tasks", "second").unwrap();
        assert_eq!(cache.get("nook.tasks").unwrap().as_deref(), Some("second"));
        assert!(cache.path_for("nook.tasks").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn concurrent_writers_never_collide() {
        let dir = std::env::temp_dir().join(format!("nook-cache-{}", uuid::Uuid::new_v4()));
        let cache = FileCache::new(&dir);

        std::thread::scope(|scope| {
            for writer in 0..8 {
                let cache = &cache;
                scope.spawn(move || {
                    for round in 0..25 {
                        cache
                            .set("nook.tasks", &format!("{}-{}", writer, round))
                            .unwrap();
                    }
                });
            }
        });

        let last = cache.get("nook.tasks").unwrap().unwrap();
        assert!(last.ends_with("-24"));
        let leftovers = std::fs::read_dir(&dir)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path() != cache.path_for("nook.tasks"))
            .count();
        assert_eq!(leftovers, 0);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
