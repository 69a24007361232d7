//! End-to-end load/mutate/degrade behaviour through the public API, with an
//! in-memory remote that can be told to fail.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use nook::core::habit::{Habit, HabitToggle};
use nook::core::record::{Entity, Record, RecordId};
use nook::core::task::{Task, TaskPatch, TaskToggle};
use nook::error::RemoteError;
use nook::sync::cache::{LocalCache, MemoryCache, read_snapshot, write_snapshot};
use nook::sync::identity::StaticIdentity;
use nook::sync::remote::RemoteCollection;
use nook::sync::{Collection, Mode};
use nook::widgets::{Backends, Dashboard};

// ============================================================================
// Mock remote
// ============================================================================

struct FlakyRemote<F: Entity> {
    rows: Mutex<Vec<Record<F>>>,
    list_error: Option<String>,
    writes_fail: Mutex<bool>,
    next_id: Mutex<u32>,
}

impl<F: Entity> FlakyRemote<F> {
    fn new(rows: Vec<Record<F>>) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(rows),
            list_error: None,
            writes_fail: Mutex::new(false),
            next_id: Mutex::new(0),
        })
    }

    fn unreachable(message: &str) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(Vec::new()),
            list_error: Some(message.to_string()),
            writes_fail: Mutex::new(true),
            next_id: Mutex::new(0),
        })
    }

    fn go_offline(&self) {
        *self.writes_fail.lock().unwrap() = true;
    }

    fn check_writes(&self) -> Result<(), RemoteError> {
        if *self.writes_fail.lock().unwrap() {
            return Err(RemoteError::new("Network error"));
        }
        Ok(())
    }
}

#[async_trait]
impl<F: Entity> RemoteCollection<F> for FlakyRemote<F> {
    async fn list(&self, _owner_id: &str) -> Result<Vec<Record<F>>, RemoteError> {
        match &self.list_error {
            Some(message) => Err(RemoteError::new(message.clone())),
            None => Ok(self.rows.lock().unwrap().clone()),
        }
    }

    async fn create(&self, owner_id: &str, fields: &F) -> Result<Record<F>, RemoteError> {
        self.check_writes()?;
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let record = Record {
            id: RecordId::from(format!("{}-{}", F::KIND, 100 + *next)),
            owner_id: owner_id.to_string(),
            fields: fields.clone(),
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().insert(0, record.clone());
        Ok(record)
    }

    async fn update(&self, id: &RecordId, patch: &F::Patch) -> Result<Record<F>, RemoteError> {
        self.check_writes()?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| RemoteError::new("not found"))?;
        row.fields.apply(patch);
        Ok(row.clone())
    }

    async fn delete(&self, id: &RecordId) -> Result<(), RemoteError> {
        self.check_writes()?;
        self.rows.lock().unwrap().retain(|r| &r.id != id);
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn task(id: &str, label: &str) -> Record<Task> {
    let at = Utc.with_ymd_and_hms(2026, 4, 20, 8, 30, 0).unwrap();
    Record {
        id: RecordId::from(id),
        owner_id: "user-1".to_string(),
        fields: Task::new(label),
        created_at: at,
        updated_at: at,
    }
}

fn signed_in<F: Entity>(
    cache: Arc<MemoryCache>,
    remote: Arc<FlakyRemote<F>>,
) -> Collection<F> {
    Collection::new(cache, remote, Arc::new(StaticIdentity::owner("user-1")))
}

fn cached<F: Entity>(cache: &MemoryCache) -> Vec<Record<F>> {
    read_snapshot(cache).expect("snapshot present")
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn unreachable_remote_falls_back_to_cached_snapshot() {
    let cache = Arc::new(MemoryCache::new());
    let snapshot = vec![task("task-1", "Pay rent"), task("task-2", "Call plumber")];
    write_snapshot(cache.as_ref(), &snapshot).unwrap();

    let tasks = signed_in(cache.clone(), FlakyRemote::<Task>::unreachable("Network error"));
    tasks.load().await;

    let state = tasks.state();
    assert_eq!(state.items, snapshot);
    assert_eq!(state.mode, Mode::Local);
    assert_eq!(state.mode.to_string(), "LOCAL");
    assert_eq!(state.error.as_deref(), Some("Failed to load tasks"));
    assert!(!state.is_loading);
}

#[tokio::test]
async fn local_create_is_immediate_and_local() {
    let cache = Arc::new(MemoryCache::new());
    let tasks: Collection<Task> = Collection::new(
        cache.clone(),
        FlakyRemote::new(Vec::new()),
        Arc::new(StaticIdentity::anonymous()),
    );
    tasks.load().await;
    assert_eq!(tasks.mode(), Mode::Local);

    tasks.create(Task::new("Buy milk")).unwrap().await;

    let items = tasks.items();
    assert_eq!(items[0].fields.label, "Buy milk");
    assert!(!items[0].fields.completed);
    assert!(items[0].id.as_str().starts_with("local-"));
    assert_eq!(cached::<Task>(&cache), items);
}

#[tokio::test]
async fn failed_remote_update_keeps_edit_and_goes_local() {
    let cache = Arc::new(MemoryCache::new());
    let remote = FlakyRemote::new(vec![task("task-1", "Pay rent"), task("task-2", "Call plumber")]);
    let tasks = signed_in(cache.clone(), remote.clone());
    tasks.load().await;
    assert_eq!(tasks.mode(), Mode::Remote);

    remote.go_offline();
    let id = RecordId::from("task-1");
    tasks.update(&id, TaskPatch::completed(true)).unwrap().await;

    assert!(tasks.get(&id).unwrap().fields.completed);
    assert_eq!(tasks.mode(), Mode::Local);
    let snapshot = cached::<Task>(&cache);
    assert!(snapshot.iter().find(|r| r.id == id).unwrap().fields.completed);
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn failed_remote_create_keeps_the_new_record() {
    let cache = Arc::new(MemoryCache::new());
    let remote = FlakyRemote::new(Vec::new());
    let tasks = signed_in(cache.clone(), remote.clone());
    tasks.load().await;
    remote.go_offline();

    tasks.create(Task::new("Book dentist")).unwrap().await;

    assert!(tasks.items().iter().any(|r| r.fields.label == "Book dentist"));
    assert_eq!(tasks.mode(), Mode::Local);
    assert_eq!(tasks.error().as_deref(), Some("Failed to save task"));
}

#[tokio::test]
async fn confirmed_ids_never_carry_the_local_prefix() {
    let cache = Arc::new(MemoryCache::new());
    let remote = FlakyRemote::new(Vec::new());
    let tasks = signed_in(cache.clone(), remote.clone());
    tasks.load().await;

    for label in ["One", "Two", "Three"] {
        tasks.create(Task::new(label)).unwrap().await;
    }
    let items = tasks.items();
    assert!(items.iter().all(|r| !r.id.is_local()));
    let labels: Vec<&str> = items.iter().map(|r| r.fields.label.as_str()).collect();
    assert_eq!(labels, vec!["Three", "Two", "One"]);

    // after a degrade, new ids are local again
    remote.go_offline();
    tasks.create(Task::new("Offline")).unwrap().await;
    tasks.create(Task::new("Still offline")).unwrap().await;
    let items = tasks.items();
    assert!(items[0].id.is_local());
    assert!(items[1].id.is_local());
}

#[tokio::test]
async fn cache_mirrors_every_mutation_exactly() {
    let cache = Arc::new(MemoryCache::new());
    let remote = FlakyRemote::new(vec![task("task-1", "Pay rent")]);
    let tasks = signed_in(cache.clone(), remote.clone());
    tasks.load().await;

    tasks.create(Task::new("Water plants")).unwrap().await;
    assert_eq!(cached::<Task>(&cache), tasks.items());

    let id = RecordId::from("task-1");
    tasks.toggle(&id, TaskToggle::Completed).unwrap().await;
    assert_eq!(cached::<Task>(&cache), tasks.items());

    remote.go_offline();
    tasks.update(&id, TaskPatch::label("Pay rent (March)")).unwrap().await;
    assert_eq!(cached::<Task>(&cache), tasks.items());

    tasks.delete(&id).await;
    assert_eq!(cached::<Task>(&cache), tasks.items());
}

#[tokio::test]
async fn habit_toggle_twice_is_identity() {
    let cache = Arc::new(MemoryCache::new());
    let remote = FlakyRemote::<Habit>::new(Vec::new());
    let habits = signed_in(cache.clone(), remote);
    habits.load().await;
    habits.create(Habit::new("Meditate")).unwrap().await;

    let before = habits.items();
    let id = before[0].id.clone();
    habits.toggle(&id, HabitToggle::Day(3)).unwrap().await;
    assert!(habits.get(&id).unwrap().fields.week[3]);
    habits.toggle(&id, HabitToggle::Day(3)).unwrap().await;

    let after = habits.items();
    assert_eq!(after[0].fields, before[0].fields);
    assert_eq!(after.len(), before.len());
}

#[tokio::test]
async fn anonymous_dashboard_survives_remount() {
    let cache: Arc<dyn LocalCache> = Arc::new(MemoryCache::new());
    let backends = Backends {
        cache,
        identity: Arc::new(StaticIdentity::anonymous()),
        remote: None,
        access_token: None,
    };

    let first = Dashboard::new(&backends, std::time::Duration::from_millis(5));
    first.load().await;
    let link_count = first.links.ordered().len();
    first.links.add("blog.rust-lang.org", "Rust blog").unwrap().await;
    drop(first);

    let second = Dashboard::new(&backends, std::time::Duration::from_millis(5));
    second.load().await;
    assert_eq!(second.links.ordered().len(), link_count + 1);
    assert_eq!(second.links.ordered().last().unwrap().fields.title, "Rust blog");
}
