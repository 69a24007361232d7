pub mod habits;
pub mod links;
pub mod notes;
pub mod tasks;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{NookConfig, RemoteConfig};
use crate::core::record::Entity;
use crate::sync::Collection;
use crate::sync::cache::{FileCache, LocalCache};
use crate::sync::identity::{IdentityResolver, KeyringIdentity, StaticIdentity};
use crate::sync::remote::{RemoteCollection, RestRemote};

pub use habits::HabitGrid;
pub use links::LinkDock;
pub use notes::{NoteBuffer, NotePad};
pub use tasks::TaskList;

/// Everything needed to build a collection for any entity kind.
#[derive(Clone)]
pub struct Backends {
    pub cache: Arc<dyn LocalCache>,
    pub identity: Arc<dyn IdentityResolver>,
    pub remote: Option<RemoteConfig>,
    pub access_token: Option<String>,
}

impl Backends {
    /// Backends described by the config: file cache, the configured owner or
    /// the keyring session, and the remote service if one is set up.
    pub async fn from_config(config: &NookConfig) -> Self {
        if let Err(e) = config.ensure_dirs() {
            log::error!("Failed to create {}: {}", config.cache_directory.display(), e);
        }
        let cache: Arc<dyn LocalCache> = Arc::new(FileCache::new(&config.cache_directory));

        let mut access_token = None;
        let identity: Arc<dyn IdentityResolver> = match (&config.owner_id, &config.remote) {
            (Some(owner), _) => Arc::new(StaticIdentity::owner(owner.clone())),
            (None, Some(remote)) => {
                let keyring = KeyringIdentity::new(&remote.url);
                access_token = keyring.session().await.map(|s| s.access_token);
                Arc::new(keyring)
            }
            (None, None) => Arc::new(StaticIdentity::anonymous()),
        };

        Self {
            cache,
            identity,
            remote: config.remote.clone(),
            access_token,
        }
    }

    pub fn collection<F: Entity>(&self) -> Collection<F> {
        let Some(remote) = self.remote_for::<F>() else {
            return Collection::local_only(self.cache.clone(), self.identity.clone());
        };
        Collection::new(self.cache.clone(), remote, self.identity.clone())
    }

    fn remote_for<F: Entity>(&self) -> Option<Arc<dyn RemoteCollection<F>>> {
        let config = self.remote.as_ref()?;
        match RestRemote::<F>::new(&config.url, &config.api_key) {
            Ok(remote) => {
                let remote = match &self.access_token {
                    Some(token) => remote.with_access_token(token.clone()),
                    None => remote,
                };
                Some(Arc::new(remote))
            }
            Err(e) => {
                log::error!("Remote {} unavailable: {}", F::COLLECTION, e);
                None
            }
        }
    }
}

/// The four data-backed widgets, each with its own collection.
pub struct Dashboard {
    pub tasks: TaskList,
    pub habits: HabitGrid,
    pub links: LinkDock,
    pub notes: NotePad,
}

impl Dashboard {
    pub fn new(backends: &Backends, note_autosave: Duration) -> Self {
        Self {
            tasks: TaskList::new(backends.collection()),
            habits: HabitGrid::new(backends.collection()),
            links: LinkDock::new(backends.collection()),
            notes: NotePad::new(backends.collection(), note_autosave),
        }
    }

    /// Mount every widget: load all collections side by side.
    pub async fn load(&self) {
        futures::join!(
            self.tasks.collection().load(),
            self.habits.collection().load(),
            self.links.collection().load(),
            self.notes.collection().load(),
        );
        if let Some(persist) = self.notes.ensure_note() {
            persist.await;
        }
    }
}
