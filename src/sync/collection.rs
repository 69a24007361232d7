use chrono::Utc;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use super::cache::{self, LocalCache};
use super::identity::IdentityResolver;
use super::remote::RemoteCollection;
use super::transition::{self, Change};
use super::{CollectionState, Mode};
use crate::core::record::{ANONYMOUS_OWNER, Entity, Record, RecordId};
use crate::error::{RemoteError, ValidationError};

/// The remote half of a mutation. The optimistic apply has already happened
/// when this is handed out; await it or spawn it, dropping it only skips the
/// remote write.
pub type Persist = BoxFuture<'static, ()>;

fn settled() -> Persist {
    futures::future::ready(()).boxed()
}

/// Optimistic, local-first collection of one entity kind.
///
/// Cloning is cheap and every clone drives the same state.
pub struct Collection<F: Entity> {
    inner: Arc<Inner<F>>,
}

impl<F: Entity> Clone for Collection<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<F: Entity> {
    state: watch::Sender<CollectionState<F>>,
    owner: Mutex<Option<String>>,
    /// Changes applied while a load was in flight, replayed when it lands.
    held: Mutex<Vec<Change<F>>>,
    /// Bumped by every load; only the newest one publishes.
    generation: AtomicU64,
    cache: Arc<dyn LocalCache>,
    remote: Option<Arc<dyn RemoteCollection<F>>>,
    identity: Arc<dyn IdentityResolver>,
}

/// What a validated update/toggle/delete did to `items`.
enum Applied<P> {
    Missing,
    Done { mode: Mode, patch: P },
}

impl<F: Entity> Collection<F> {
    pub fn new(
        cache: Arc<dyn LocalCache>,
        remote: Arc<dyn RemoteCollection<F>>,
        identity: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self::build(cache, Some(remote), identity)
    }

    /// A collection with no remote service configured; it always runs from cache.
    pub fn local_only(cache: Arc<dyn LocalCache>, identity: Arc<dyn IdentityResolver>) -> Self {
        Self::build(cache, None, identity)
    }

    fn build(
        cache: Arc<dyn LocalCache>,
        remote: Option<Arc<dyn RemoteCollection<F>>>,
        identity: Arc<dyn IdentityResolver>,
    ) -> Self {
        let (state, _) = watch::channel(CollectionState::mounting());
        Self {
            inner: Arc::new(Inner {
                state,
                owner: Mutex::new(None),
                held: Mutex::new(Vec::new()),
                generation: AtomicU64::new(0),
                cache,
                remote,
                identity,
            }),
        }
    }

    pub fn state(&self) -> CollectionState<F> {
        self.inner.state.borrow().clone()
    }

    /// Observe every state change from here on.
    pub fn subscribe(&self) -> watch::Receiver<CollectionState<F>> {
        self.inner.state.subscribe()
    }

    pub fn items(&self) -> Vec<Record<F>> {
        self.inner.state.borrow().items.clone()
    }

    pub fn get(&self, id: &RecordId) -> Option<Record<F>> {
        self.inner.current(id)
    }

    pub fn mode(&self) -> Mode {
        self.inner.state.borrow().mode
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }

    /// Resolve identity and load from the remote service, falling back to the
    /// cache and finally to seed data. Starts a fresh session: a previous
    /// degrade to local mode is forgotten.
    ///
    /// Mutations made while the load is in flight are replayed on top of the
    /// loaded items and, when the load comes back remote, sent to the service.
    pub async fn load(&self) {
        let inner = &self.inner;
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        inner.state.send_modify(|s| s.is_loading = true);

        let owner = inner.identity.current_owner_id().await;
        *inner.owner() = owner.clone();

        let (items, mode, error) = match (owner.clone(), &inner.remote) {
            (Some(owner_id), Some(remote)) => match remote.list(&owner_id).await {
                Ok(items) => {
                    log::info!("Loaded {} {} from remote", items.len(), F::COLLECTION);
                    (items, Mode::Remote, None)
                }
                Err(e) => {
                    log::warn!("Failed to load {} from remote: {}", F::COLLECTION, e);
                    (
                        inner.cached_or_seed(&owner_id),
                        Mode::Local,
                        Some(format!("Failed to load {}", F::COLLECTION)),
                    )
                }
            },
            (Some(owner_id), None) => (inner.cached_or_seed(&owner_id), Mode::Local, None),
            (None, _) => (inner.cached_or_seed(ANONYMOUS_OWNER), Mode::Local, None),
        };

        let mut held = Vec::new();
        let published = inner.state.send_if_modified(|s| {
            if inner.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            held = std::mem::take(&mut *inner.held());
            s.items = transition::replay(items, &held);
            s.mode = mode;
            s.error = error;
            s.is_loading = false;
            cache::mirror(inner.cache.as_ref(), &s.items);
            true
        });
        if !published {
            log::debug!("Newer load of {} in flight, dropping this result", F::COLLECTION);
            return;
        }
        if held.is_empty() {
            return;
        }

        log::info!("Replayed {} {} change(s) made while loading", held.len(), F::KIND);
        if let (Mode::Remote, Some(owner_id), Some(remote)) = (mode, owner, inner.remote.clone()) {
            inner.push_held(&owner_id, remote.as_ref(), held).await;
        }
    }

    /// Re-run the load after the identity changed.
    pub async fn reload(&self) {
        log::info!("Reloading {}", F::COLLECTION);
        self.load().await;
    }

    /// Prepend a new record. In remote mode it is provisional until the
    /// service confirms it, at which point the server's id replaces the local one.
    pub fn create(&self, fields: F) -> Result<Persist, ValidationError> {
        fields.validate()?;

        let owner = self.inner.owner().clone();
        let record = Record::new_local(owner.as_deref().unwrap_or(ANONYMOUS_OWNER), fields.clone());
        let provisional = record.id.clone();

        let mut mode = Mode::Local;
        self.inner.state.send_modify(|state| {
            state.items = transition::prepend(&state.items, record.clone());
            mode = self.inner.settle_apply(state, || Change::Created(record));
        });
        log::info!("Created {} {} ({})", F::KIND, provisional, mode);

        let (Mode::Remote, Some(owner_id), Some(remote)) = (mode, owner, self.inner.remote.clone())
        else {
            return Ok(settled());
        };

        let inner = Arc::clone(&self.inner);
        Ok(async move {
            if !inner.still_remote() {
                return;
            }
            match remote.create(&owner_id, &fields).await {
                Ok(confirmed) => inner.confirm(&provisional, &fields, confirmed),
                Err(e) => inner.degrade(format!("Failed to save {}", F::KIND), &e),
            }
        }
        .boxed())
    }

    pub fn update(&self, id: &RecordId, patch: F::Patch) -> Result<Persist, ValidationError> {
        let applied = self.inner.apply_patch(id, |_| Ok(patch))?;
        Ok(self.inner.persist_update(id, applied))
    }

    /// Flip one boolean field; an update whose patch is derived from the current value.
    pub fn toggle(&self, id: &RecordId, field: F::Toggle) -> Result<Persist, ValidationError> {
        let applied = self
            .inner
            .apply_patch(id, |current| current.toggle_patch(field))?;
        Ok(self.inner.persist_update(id, applied))
    }

    /// Remove a record. Never fails; an unknown id is a no-op.
    pub fn delete(&self, id: &RecordId) -> Persist {
        let mut mode = None;
        self.inner.state.send_if_modified(|state| {
            let Some(next) = transition::remove(&state.items, id) else {
                return false;
            };
            state.items = next;
            mode = Some(self.inner.settle_apply(state, || Change::Deleted(id.clone())));
            true
        });

        let Some(mode) = mode else {
            log::debug!("Ignoring delete of unknown {} {}", F::KIND, id);
            return settled();
        };
        log::info!("Deleted {} {} ({})", F::KIND, id, mode);

        let (Mode::Remote, Some(remote)) = (mode, self.inner.remote.clone()) else {
            return settled();
        };
        if id.is_local() {
            log::warn!(
                "Deleting {} {} before the server confirmed it; the remote copy may linger",
                F::KIND,
                id
            );
        }

        let inner = Arc::clone(&self.inner);
        let id = id.clone();
        async move {
            if !inner.still_remote() {
                return;
            }
            match remote.delete(&id).await {
                Ok(()) => inner.mirror_current(),
                Err(e) => inner.degrade(format!("Failed to delete {}", F::KIND), &e),
            }
        }
        .boxed()
    }
}

impl<F: Entity> Inner<F> {
    fn owner(&self) -> MutexGuard<'_, Option<String>> {
        self.owner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cached_or_seed(&self, owner_id: &str) -> Vec<Record<F>> {
        match cache::read_snapshot::<F>(self.cache.as_ref()) {
            Some(items) if !items.is_empty() => {
                log::info!("Loaded {} {} from cache", items.len(), F::COLLECTION);
                items
            }
            _ => {
                let seeded: Vec<Record<F>> = F::seed()
                    .into_iter()
                    .map(|fields| Record::new_local(owner_id, fields))
                    .collect();
                log::info!("Seeding {} default {}", seeded.len(), F::COLLECTION);
                seeded
            }
        }
    }

    fn held(&self) -> MutexGuard<'_, Vec<Change<F>>> {
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current(&self, id: &RecordId) -> Option<Record<F>> {
        self.state.borrow().items.iter().find(|r| &r.id == id).cloned()
    }

    /// Finish an optimistic apply: mirror it and report the mode it ran in.
    /// While a load is in flight the change is held for that load instead and
    /// counts as local, so nothing reaches the cache or the service early.
    fn settle_apply(
        &self,
        state: &CollectionState<F>,
        change: impl FnOnce() -> Change<F>,
    ) -> Mode {
        if state.is_loading {
            self.held().push(change());
            return Mode::Local;
        }
        cache::mirror(self.cache.as_ref(), &state.items);
        state.mode
    }

    /// Send changes held during a load once it came back remote. Creates go
    /// out with the record's current fields, so edits made to them before the
    /// service saw them ride along.
    async fn push_held(
        &self,
        owner_id: &str,
        remote: &dyn RemoteCollection<F>,
        held: Vec<Change<F>>,
    ) {
        for change in held {
            if !self.still_remote() {
                return;
            }
            match change {
                Change::Created(record) => {
                    let Some(current) = self.current(&record.id) else {
                        log::debug!("{} {} removed while loading", F::KIND, record.id);
                        continue;
                    };
                    match remote.create(owner_id, &current.fields).await {
                        Ok(confirmed) => self.confirm(&record.id, &current.fields, confirmed),
                        Err(e) => return self.degrade(format!("Failed to save {}", F::KIND), &e),
                    }
                }
                Change::Patched { id, patch, .. } if !id.is_local() => {
                    if self.current(&id).is_none() {
                        continue;
                    }
                    if let Err(e) = remote.update(&id, &patch).await {
                        return self.degrade(format!("Failed to update {}", F::KIND), &e);
                    }
                }
                Change::Deleted(id) if !id.is_local() => {
                    if let Err(e) = remote.delete(&id).await {
                        return self.degrade(format!("Failed to delete {}", F::KIND), &e);
                    }
                }
                _ => {}
            }
        }
        self.mirror_current();
    }

    fn still_remote(&self) -> bool {
        let remote = self.state.borrow().mode == Mode::Remote;
        if !remote {
            log::debug!("Session already local, skipping remote {} write", F::KIND);
        }
        remote
    }

    /// Validate and optimistically apply a patch built from the current value.
    /// Lookup, validation and apply happen under one lock.
    fn apply_patch(
        &self,
        id: &RecordId,
        make_patch: impl FnOnce(&F) -> Result<F::Patch, ValidationError>,
    ) -> Result<Applied<F::Patch>, ValidationError> {
        let mut outcome = Ok(Applied::Missing);
        self.state.send_if_modified(|state| {
            let Some(current) = state.items.iter().find(|r| &r.id == id) else {
                return false;
            };
            let patch = match make_patch(&current.fields) {
                Ok(patch) => patch,
                Err(e) => {
                    outcome = Err(e);
                    return false;
                }
            };
            let mut candidate = current.fields.clone();
            candidate.apply(&patch);
            if let Err(e) = candidate.validate() {
                outcome = Err(e);
                return false;
            }
            let now = Utc::now();
            let Some(next) = transition::patch(&state.items, id, &patch, now) else {
                return false;
            };
            state.items = next;
            let mode = self.settle_apply(state, || Change::Patched {
                id: id.clone(),
                patch: patch.clone(),
                at: now,
            });
            outcome = Ok(Applied::Done { mode, patch });
            true
        });
        outcome
    }

    fn persist_update(self: &Arc<Self>, id: &RecordId, applied: Applied<F::Patch>) -> Persist {
        let (mode, patch) = match applied {
            Applied::Missing => {
                log::debug!("Ignoring update of unknown {} {}", F::KIND, id);
                return settled();
            }
            Applied::Done { mode, patch } => (mode, patch),
        };
        log::info!("Updated {} {} ({})", F::KIND, id, mode);

        let (Mode::Remote, Some(remote)) = (mode, self.remote.clone()) else {
            return settled();
        };
        if id.is_local() {
            log::warn!(
                "Updating {} {} before the server confirmed it; this edit is not reconciled",
                F::KIND,
                id
            );
        }

        let inner = Arc::clone(self);
        let id = id.clone();
        async move {
            if !inner.still_remote() {
                return;
            }
            // The server's copy is not spliced back in: newer optimistic edits
            // may already be on top of the one being confirmed.
            match remote.update(&id, &patch).await {
                Ok(_) => inner.mirror_current(),
                Err(e) => inner.degrade(format!("Failed to update {}", F::KIND), &e),
            }
        }
        .boxed()
    }

    /// Replace a provisional record with the server-confirmed one, in place.
    fn confirm(&self, provisional: &RecordId, sent: &F, mut confirmed: Record<F>) {
        let confirmed_id = confirmed.id.clone();
        let spliced = self.state.send_if_modified(|state| {
            let Some(current) = state.items.iter().find(|r| &r.id == provisional) else {
                return false;
            };
            if current.fields != *sent {
                log::warn!(
                    "{} {} changed while awaiting confirmation as {}; keeping local fields",
                    F::KIND,
                    provisional,
                    confirmed.id
                );
                confirmed.fields = current.fields.clone();
                confirmed.updated_at = current.updated_at;
            }
            let Some(next) = transition::confirm(&state.items, provisional, confirmed) else {
                return false;
            };
            state.items = next;
            cache::mirror(self.cache.as_ref(), &state.items);
            true
        });

        if spliced {
            log::info!("Confirmed {} {} as {}", F::KIND, provisional, confirmed_id);
        } else {
            log::warn!(
                "{} {} was removed before the server confirmed it as {}",
                F::KIND,
                provisional,
                confirmed_id
            );
        }
    }

    fn mirror_current(&self) {
        cache::mirror(self.cache.as_ref(), &self.state.borrow().items);
    }

    /// One-way switch to local mode. The optimistic items stay as they are and
    /// become the cache's source of truth.
    fn degrade(&self, message: String, cause: &RemoteError) {
        log::warn!("{}: {}; continuing in local mode", message, cause);
        self.state.send_modify(|state| {
            state.mode = Mode::Local;
            state.error = Some(message);
            cache::mirror(self.cache.as_ref(), &state.items);
        });
    }
}
