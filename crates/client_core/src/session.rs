//! Signed-in state shared by the API client and every view that cares about it.
//!
//! A single [`Session`] is created at startup and injected wherever it is
//! needed. Observers call [`Session::subscribe`] when they mount; dropping the
//! returned [`SessionSubscription`] unsubscribes them.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use shared::{domain::CreatorUuid, protocol::AuthTokens};
use storage::KeyValueStore;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};

pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const CREATOR_UUID_KEY: &str = "creator_uuid";
pub const CREATOR_PROFILE_KEY: &str = "creator_profile";

const ALL_KEYS: [&str; 4] = [
    AUTH_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    CREATOR_UUID_KEY,
    CREATOR_PROFILE_KEY,
];

pub struct Session {
    store: Arc<dyn KeyValueStore>,
    access_token: RwLock<Option<String>>,
    signed_in: watch::Sender<bool>,
}

impl Session {
    /// Opens the session, restoring a previously persisted access token.
    pub async fn open(store: Arc<dyn KeyValueStore>) -> ClientResult<Arc<Self>> {
        let token = store
            .get(AUTH_TOKEN_KEY)
            .await
            .map_err(ClientError::Storage)?
            .filter(|token| !token.trim().is_empty());
        let (signed_in, _) = watch::channel(token.is_some());
        debug!(restored = token.is_some(), "session opened");
        Ok(Arc::new(Self {
            store,
            access_token: RwLock::new(token),
            signed_in,
        }))
    }

    pub fn is_signed_in(&self) -> bool {
        *self.signed_in.borrow()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.access_token.read().await.clone()
    }

    pub async fn refresh_token(&self) -> ClientResult<Option<String>> {
        self.store
            .get(REFRESH_TOKEN_KEY)
            .await
            .map_err(ClientError::Storage)
    }

    pub async fn creator_uuid(&self) -> ClientResult<Option<CreatorUuid>> {
        Ok(self
            .store
            .get(CREATOR_UUID_KEY)
            .await
            .map_err(ClientError::Storage)?
            .map(CreatorUuid))
    }

    pub async fn sign_in(&self, tokens: &AuthTokens) -> ClientResult<()> {
        if tokens.access_token.trim().is_empty() {
            return Err(ClientError::validation("access token is empty"));
        }

        self.put(AUTH_TOKEN_KEY, &tokens.access_token).await?;
        if let Some(refresh) = &tokens.refresh_token {
            self.put(REFRESH_TOKEN_KEY, refresh).await?;
        }
        if let Some(uuid) = &tokens.uuid {
            self.put(CREATOR_UUID_KEY, uuid.as_str()).await?;
        }

        *self.access_token.write().await = Some(tokens.access_token.clone());
        self.signed_in.send_replace(true);
        info!(creator = ?tokens.uuid, "signed in");
        Ok(())
    }

    /// Clears every persisted session key and notifies subscribers.
    pub async fn sign_out(&self) -> ClientResult<()> {
        for key in ALL_KEYS {
            self.store.remove(key).await.map_err(ClientError::Storage)?;
        }
        *self.access_token.write().await = None;
        self.signed_in.send_replace(false);
        info!("signed out");
        Ok(())
    }

    pub async fn save_creator<T: Serialize>(&self, profile: &T) -> ClientResult<()> {
        let raw =
            serde_json::to_string(profile).map_err(|err| ClientError::Decode(err.to_string()))?;
        self.put(CREATOR_PROFILE_KEY, &raw).await
    }

    pub async fn creator<T: DeserializeOwned>(&self) -> ClientResult<Option<T>> {
        let Some(raw) = self
            .store
            .get(CREATOR_PROFILE_KEY)
            .await
            .map_err(ClientError::Storage)?
        else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| ClientError::Decode(err.to_string()))
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            rx: self.signed_in.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.signed_in.receiver_count()
    }

    async fn put(&self, key: &str, value: &str) -> ClientResult<()> {
        self.store
            .put(key, value)
            .await
            .map_err(ClientError::Storage)
    }
}

pub struct SessionSubscription {
    rx: watch::Receiver<bool>,
}

impl SessionSubscription {
    pub fn is_signed_in(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits for the next login-state change. `None` once the session is gone.
    pub async fn changed(&mut self) -> Option<bool> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
