use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::Serialize;
use tokio::sync::watch;

use super::RestClient;
use super::session::TokenResponse;
use crate::auth::{AuthBackend, AuthSession};
use crate::repository::StorageError;

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Password auth against the hosted backend's `/auth/v1` endpoints.
///
/// The session lives in the table client so later requests run as the
/// signed-in user.
#[derive(Clone)]
pub struct RestAuth {
    client: RestClient,
}

impl RestAuth {
    #[must_use]
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthBackend for RestAuth {
    /// Restores a saved session on first call and refreshes it when it is
    /// about to expire. A session that cannot be refreshed reads as `None`.
    async fn current_session(&self) -> Result<Option<AuthSession>, StorageError> {
        if self.client.restore_session().await?.is_some() {
            self.client.refresh_if_stale().await;
        }
        Ok(self.client.session())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, StorageError> {
        let url = self.client.auth_url("token");
        let response = self
            .client
            .send(
                self.client
                    .request(Method::POST, &url)
                    .query(&[("grant_type", "password")])
                    .json(&Credentials { email, password }),
            )
            .await?;
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let session = body.into_session(email, Utc::now())?;
        self.client.install_session(Some(session.clone())).await?;
        tracing::debug!(user = %session.user_id, "signed in");
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), StorageError> {
        let url = self.client.auth_url("signup");
        self.client
            .send(
                self.client
                    .request(Method::POST, &url)
                    .json(&Credentials { email, password }),
            )
            .await?;
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), StorageError> {
        if self.client.access_token().is_some() {
            let url = self.client.auth_url("logout");
            let result = self
                .client
                .send(self.client.request(Method::POST, &url))
                .await;
            // The local session is dropped even when the server call fails.
            self.client.install_session(None).await?;
            result?;
            return Ok(());
        }
        self.client.install_session(None).await
    }

    fn session_changes(&self) -> Option<watch::Receiver<Option<AuthSession>>> {
        Some(self.client.session_changes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::BackendConfig;
    use crate::repository::{InMemoryRepository, PreferenceRepository};
    use crate::rest::SESSION_PREFERENCE_KEY;
    use std::sync::Arc;

    #[tokio::test]
    async fn saved_session_is_current_after_restart() {
        let store = InMemoryRepository::new();
        let saved = AuthSession {
            user_id: quiz_core::model::UserId::new("u1").unwrap(),
            email: "a@example.com".into(),
            access_token: "jwt".into(),
            refresh_token: Some("r1".into()),
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
        };
        store
            .set_preference(SESSION_PREFERENCE_KEY, &serde_json::to_string(&saved).unwrap())
            .await
            .unwrap();

        let config = BackendConfig::new("https://x.test", "anon").unwrap();
        let client = RestClient::new(&config)
            .unwrap()
            .with_session_store(Arc::new(store.clone()));
        let auth = RestAuth::new(client);
        assert_eq!(auth.current_session().await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn sign_out_without_session_clears_saved_copy() {
        let store = InMemoryRepository::new();
        store.set_preference(SESSION_PREFERENCE_KEY, "stale").await.unwrap();
        let config = BackendConfig::new("https://x.test", "anon").unwrap();
        let client = RestClient::new(&config)
            .unwrap()
            .with_session_store(Arc::new(store.clone()));
        let auth = RestAuth::new(client);
        let mut changes = auth.session_changes().unwrap();

        auth.sign_out().await.unwrap();
        assert_eq!(
            store.get_preference(SESSION_PREFERENCE_KEY).await.unwrap().as_deref(),
            Some("")
        );
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), None);
        assert_eq!(auth.current_session().await.unwrap(), None);
    }
}
