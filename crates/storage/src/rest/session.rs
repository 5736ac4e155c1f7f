//! Session tokens for the hosted backend: refresh and persistence.

use chrono::{DateTime, Duration, Utc};
use quiz_core::model::UserId;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::RestClient;
use crate::auth::AuthSession;
use crate::repository::{PreferenceRepository, StorageError};

/// Preference key the signed-in session is saved under. An empty value means
/// signed out.
pub const SESSION_PREFERENCE_KEY: &str = "auth_session";

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

#[derive(Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Body of every `/auth/v1/token` grant.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: TokenUser,
}

impl TokenResponse {
    /// `expires_at` wins over `expires_in` when the backend sends both.
    pub(crate) fn into_session(
        self,
        fallback_email: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthSession, StorageError> {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| self.expires_in.map(|secs| now + Duration::seconds(secs)));
        Ok(AuthSession {
            user_id: UserId::new(self.user.id).map_err(ser)?,
            email: self.user.email.unwrap_or_else(|| fallback_email.to_owned()),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        })
    }
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

impl RestClient {
    pub(crate) fn session(&self) -> Option<AuthSession> {
        self.session.borrow().clone()
    }

    pub(crate) fn access_token(&self) -> Option<String> {
        self.session
            .borrow()
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    pub(crate) fn session_changes(&self) -> watch::Receiver<Option<AuthSession>> {
        self.session.subscribe()
    }

    /// Make `session` current and save it. `None` signs out locally.
    pub(crate) async fn install_session(
        &self,
        session: Option<AuthSession>,
    ) -> Result<(), StorageError> {
        let raw = match &session {
            Some(session) => serde_json::to_string(session).map_err(ser)?,
            None => String::new(),
        };
        self.session.send_replace(session);
        match &self.session_store {
            Some(store) => store.set_preference(SESSION_PREFERENCE_KEY, &raw).await,
            None => Ok(()),
        }
    }

    /// The current session, loading the saved one first if nothing is in
    /// memory yet. An unreadable saved session is discarded.
    pub(crate) async fn restore_session(&self) -> Result<Option<AuthSession>, StorageError> {
        if let Some(session) = self.session() {
            return Ok(Some(session));
        }
        let Some(store) = &self.session_store else {
            return Ok(None);
        };
        let raw = store.get_preference(SESSION_PREFERENCE_KEY).await?;
        let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
            return Ok(None);
        };
        match serde_json::from_str::<AuthSession>(&raw) {
            Ok(session) => {
                tracing::debug!(user = %session.user_id, "restored saved session");
                self.session.send_replace(Some(session.clone()));
                Ok(Some(session))
            }
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable saved session");
                store.set_preference(SESSION_PREFERENCE_KEY, "").await?;
                Ok(None)
            }
        }
    }

    /// Refresh ahead of expiry. A failed refresh ends the session.
    pub(crate) async fn refresh_if_stale(&self) {
        let Some(session) = self.session() else {
            return;
        };
        if session.is_stale(Utc::now()) {
            self.refresh_session(&session.access_token).await;
        }
    }

    /// Trade the refresh token for a new session.
    ///
    /// `stale` is the access token the caller found wanting; when another task
    /// has already replaced it nothing is sent. Returns whether a session is
    /// current afterwards. On failure the session is cleared, which subscribers
    /// of `session_changes` see as a sign-out.
    pub(crate) async fn refresh_session(&self, stale: &str) -> bool {
        let _guard = self.refresh_lock.lock().await;
        let Some(current) = self.session() else {
            return false;
        };
        if current.access_token != stale {
            return true;
        }
        let outcome = match current.refresh_token.as_deref() {
            Some(refresh_token) => self.exchange_refresh_token(refresh_token, &current.email).await,
            None => Err(StorageError::Backend {
                message: "session expired".into(),
            }),
        };
        match outcome {
            Ok(session) => {
                tracing::debug!(user = %session.user_id, "session refreshed");
                if let Err(err) = self.install_session(Some(session)).await {
                    tracing::warn!(error = %err, "failed to save refreshed session");
                }
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "session refresh failed, signing out");
                if let Err(err) = self.install_session(None).await {
                    tracing::warn!(error = %err, "failed to clear saved session");
                }
                false
            }
        }
    }

    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
        email: &str,
    ) -> Result<AuthSession, StorageError> {
        let url = self.auth_url("token");
        let request = self
            .request(Method::POST, &url)
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshGrant { refresh_token })
            .bearer_auth(&self.anon_key);
        let response = self.check(self.dispatch(request).await?).await?;
        let body: TokenResponse = response.json().await.map_err(ser)?;
        body.into_session(email, Utc::now())
    }
}
