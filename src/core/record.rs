use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ValidationError;

/// Prefix carried by every id minted on this device.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Owner recorded on records created while nobody is signed in.
pub const ANONYMOUS_OWNER: &str = "local";

/// Record identifier: either opaque and server-issued, or `local-<uuid>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Mint a fresh device-local id.
    pub fn local() -> Self {
        Self(format!("{}{}", LOCAL_ID_PREFIX, Uuid::new_v4()))
    }

    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<F> {
    pub id: RecordId,
    pub owner_id: String,
    pub fields: F,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<F> Record<F> {
    /// A record minted on this device, stamped with the current time.
    pub fn new_local(owner_id: impl Into<String>, fields: F) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::local(),
            owner_id: owner_id.into(),
            fields,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An entity kind the collection engine can manage.
///
/// Implementors are the payload stored in [`Record::fields`]. Each kind names
/// its collection, supplies seed data, validates itself and knows how to apply
/// a partial update.
pub trait Entity:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Partial update sent to `update`; only the set fields change.
    type Patch: Clone + fmt::Debug + Serialize + Send + Sync + 'static;

    /// Boolean field addressed by `toggle`.
    type Toggle: Copy + fmt::Debug + Send + Sync + 'static;

    /// Singular name used in log lines and error messages ("task").
    const KIND: &'static str;

    /// Plural collection name: remote table and load error message ("tasks").
    const COLLECTION: &'static str;

    /// Fixed cache key holding this collection's snapshot.
    const CACHE_KEY: &'static str;

    /// Default items used only when both cache and remote yield nothing.
    fn seed() -> Vec<Self>;

    fn validate(&self) -> Result<(), ValidationError>;

    fn apply(&mut self, patch: &Self::Patch);

    /// The patch that flips `field` on this value.
    fn toggle_patch(&self, field: Self::Toggle) -> Result<Self::Patch, ValidationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_are_prefixed_and_unique() {
        let a = RecordId::local();
        let b = RecordId::local();
        assert!(a.is_local());
        assert!(a.as_str().starts_with("local-"));
        assert_ne!(a, b);
    }

    #[test]
    fn server_ids_are_not_local() {
        assert!(!RecordId::from("task-1").is_local());
        assert!(!RecordId::from("8f14e45f-ceea-467f-a8e5-6b4c1f2d9a10").is_local());
    }

    #[test]
    fn id_serializes_as_plain_string() {
        let id = RecordId::from("task-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"task-1\"");
    }
}
