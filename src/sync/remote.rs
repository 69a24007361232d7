use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

use crate::core::record::{Entity, Record, RecordId};
use crate::error::RemoteError;

/// CRUD API of the remote persistence service for one entity kind.
#[async_trait]
pub trait RemoteCollection<F: Entity>: Send + Sync {
    async fn list(&self, owner_id: &str) -> Result<Vec<Record<F>>, RemoteError>;

    async fn create(&self, owner_id: &str, fields: &F) -> Result<Record<F>, RemoteError>;

    async fn update(&self, id: &RecordId, patch: &F::Patch) -> Result<Record<F>, RemoteError>;

    async fn delete(&self, id: &RecordId) -> Result<(), RemoteError>;
}

/// Wire shape of a row: metadata columns next to the entity's own columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Row<F> {
    id: String,
    owner_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(flatten)]
    fields: F,
}

impl<F> From<Row<F>> for Record<F> {
    fn from(row: Row<F>) -> Self {
        Self {
            id: RecordId::from(row.id),
            owner_id: row.owner_id,
            fields: row.fields,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Serialize)]
struct NewRow<'a, F> {
    owner_id: &'a str,
    #[serde(flatten)]
    fields: &'a F,
}

/// PostgREST-style HTTP client: one table per collection under `/rest/v1`.
pub struct RestRemote<F> {
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    http: Client,
    _entity: PhantomData<fn() -> F>,
}

impl<F: Entity> RestRemote<F> {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| RemoteError::new(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            access_token: None,
            http,
            _entity: PhantomData,
        })
    }

    /// Authenticate requests as the signed-in user instead of the anonymous key.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, F::COLLECTION)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    /// Exactly one row is expected back from a `return=representation` write.
    async fn single_row(resp: reqwest::Response, what: &str) -> Result<Record<F>, RemoteError> {
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RemoteError::new(format!("{} returned {}: {}", what, status, text)));
        }
        let mut rows: Vec<Row<F>> = resp
            .json()
            .await
            .map_err(|e| RemoteError::new(format!("Failed to parse {} response: {}", what, e)))?;
        match rows.len() {
            1 => Ok(rows.remove(0).into()),
            0 => Err(RemoteError::new(format!("{} matched no rows", what))),
            n => Err(RemoteError::new(format!("{} returned {} rows", what, n))),
        }
    }
}

#[async_trait]
impl<F: Entity> RemoteCollection<F> for RestRemote<F> {
    async fn list(&self, owner_id: &str) -> Result<Vec<Record<F>>, RemoteError> {
        let resp = self
            .request(reqwest::Method::GET, &self.table_url())
            .query(&[
                ("owner_id", format!("eq.{}", owner_id)),
                ("order", "created_at.desc".to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RemoteError::new(format!(
                "Listing {} returned {}: {}",
                F::COLLECTION,
                status,
                text
            )));
        }

        let rows: Vec<Row<F>> = resp.json().await.map_err(|e| {
            RemoteError::new(format!("Failed to parse {} listing: {}", F::COLLECTION, e))
        })?;
        log::debug!("Listed {} remote {}", rows.len(), F::COLLECTION);
        Ok(rows.into_iter().map(Record::from).collect())
    }

    async fn create(&self, owner_id: &str, fields: &F) -> Result<Record<F>, RemoteError> {
        let resp = self
            .request(reqwest::Method::POST, &self.table_url())
            .header("Prefer", "return=representation")
            .json(&NewRow { owner_id, fields })
            .send()
            .await?;
        Self::single_row(resp, &format!("Creating {}", F::KIND)).await
    }

    async fn update(&self, id: &RecordId, patch: &F::Patch) -> Result<Record<F>, RemoteError> {
        let resp = self
            .request(reqwest::Method::PATCH, &self.table_url())
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await?;
        Self::single_row(resp, &format!("Updating {} {}", F::KIND, id)).await
    }

    async fn delete(&self, id: &RecordId) -> Result<(), RemoteError> {
        let resp = self
            .request(reqwest::Method::DELETE, &self.table_url())
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            // Already gone on the server is what we wanted anyway.
            StatusCode::NOT_FOUND => Ok(()),
            s => Err(RemoteError::new(format!(
                "Deleting {} {} returned {}",
                F::KIND,
                id,
                s
            ))),
        }
    }
}
