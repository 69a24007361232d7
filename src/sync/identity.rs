use async_trait::async_trait;
use std::collections::HashMap;

pub(crate) const SERVICE_NAME: &str = "nook-session";

/// Resolves who is using the dashboard, if anyone.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn current_owner_id(&self) -> Option<String>;
}

/// A fixed identity, e.g. from config or the command line. `None` is anonymous.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<String>);

impl StaticIdentity {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn owner(id: impl Into<String>) -> Self {
        Self(Some(id.into()))
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentity {
    async fn current_owner_id(&self) -> Option<String> {
        self.0.clone()
    }
}

/// A signed-in session: the owner id and the access token the remote expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub owner_id: String,
    pub access_token: String,
}

/// Session kept in the system keyring via Secret Service, keyed by server URL.
#[derive(Debug, Clone)]
pub struct KeyringIdentity {
    server: String,
}

impl KeyringIdentity {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
        }
    }

    pub async fn session(&self) -> Option<Session> {
        match load_session(&self.server).await {
            Ok(session) => session,
            Err(e) => {
                log::warn!("Keyring unavailable, continuing anonymously: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl IdentityResolver for KeyringIdentity {
    async fn current_owner_id(&self) -> Option<String> {
        self.session().await.map(|s| s.owner_id)
    }
}

async fn keyring() -> Result<oo7::Keyring, String> {
    oo7::Keyring::new()
        .await
        .map_err(|e| format!("Failed to connect to keyring: {}", e))
}

/// Items are keyed by service and server, so sessions for different
/// remotes live side by side.
fn session_attrs(server: &str) -> HashMap<&str, &str> {
    HashMap::from([("service", SERVICE_NAME), ("server", server)])
}

async fn session_items(keyring: &oo7::Keyring, server: &str) -> Result<Vec<oo7::Item>, String> {
    keyring
        .search_items(&session_attrs(server))
        .await
        .map_err(|e| format!("Failed to search keyring: {}", e))
}

/// Store the session for `server`, replacing any previous one.
pub async fn store_session(server: &str, session: &Session) -> Result<(), String> {
    let secret = format!("{}:{}", session.owner_id, session.access_token);
    keyring()
        .await?
        .create_item(
            &format!("Nook session ({})", server),
            &session_attrs(server),
            secret.as_bytes(),
            true,
        )
        .await
        .map_err(|e| format!("Failed to store session: {}", e))
}

pub async fn load_session(server: &str) -> Result<Option<Session>, String> {
    let keyring = keyring().await?;
    let Some(item) = session_items(&keyring, server).await?.into_iter().next() else {
        return Ok(None);
    };
    let secret = item
        .secret()
        .await
        .map_err(|e| format!("Failed to read secret: {}", e))?;
    let secret = String::from_utf8(secret.to_vec())
        .map_err(|e| format!("Invalid UTF-8 in secret: {}", e))?;
    Ok(parse_secret(&secret))
}

/// Sign out of `server`. Missing sessions are fine.
pub async fn clear_session(server: &str) -> Result<(), String> {
    let keyring = keyring().await?;
    for item in session_items(&keyring, server).await? {
        item.delete()
            .await
            .map_err(|e| format!("Failed to delete session: {}", e))?;
    }
    Ok(())
}

fn parse_secret(secret: &str) -> Option<Session> {
    let (owner_id, access_token) = secret.split_once(':')?;
    if owner_id.is_empty() {
        return None;
    }
    Some(Session {
        owner_id: owner_id.to_string(),
        access_token: access_token.to_string(),
    })
}
