use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use quiz_core::model::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::repository::StorageError;

/// Tokens are refreshed this many seconds before they expire.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Authenticated backend session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: UserId,
    pub email: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    /// True once `now` is within `REFRESH_MARGIN_SECS` of the access token
    /// expiry. Sessions without an expiry never go stale.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| {
            expires_at - now <= Duration::seconds(REFRESH_MARGIN_SECS)
        })
    }
}

/// Account and session operations offered by a backend.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Session currently held by this backend handle, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be read.
    async fn current_session(&self) -> Result<Option<AuthSession>, StorageError>;

    /// Password sign-in. On success the session becomes current.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` carrying the backend's message when the
    /// credentials are rejected.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, StorageError>;

    /// Register an account.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the backend refuses the signup.
    async fn sign_up(&self, email: &str, password: &str) -> Result<(), StorageError>;

    /// Drop the current session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend call fails.
    async fn sign_out(&self) -> Result<(), StorageError>;

    /// Session changes the backend makes on its own, such as a refresh or a
    /// forced sign-out after a failed refresh. `None` when the backend never
    /// changes the session behind the caller's back.
    fn session_changes(&self) -> Option<watch::Receiver<Option<AuthSession>>> {
        None
    }
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user_id: UserId,
}

/// Auth backend kept in process memory. Used by the local and in-memory stores.
#[derive(Clone, Default)]
pub struct InMemoryAuth {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
    session: Arc<Mutex<Option<AuthSession>>>,
    email_ids: bool,
}

impl InMemoryAuth {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts get ids derived from their email, so a local database keeps
    /// its progress across restarts even though accounts are re-created.
    #[must_use]
    pub fn with_email_ids() -> Self {
        Self {
            email_ids: true,
            ..Self::default()
        }
    }

    /// Pre-register an account.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the account table lock is poisoned.
    pub fn with_account(self, email: &str, password: &str) -> Result<Self, StorageError> {
        self.register(email, password)?;
        Ok(self)
    }

    fn register(&self, email: &str, password: &str) -> Result<UserId, StorageError> {
        let mut accounts = self
            .accounts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let key = email.trim().to_lowercase();
        if accounts.contains_key(&key) {
            return Err(StorageError::Backend {
                message: "User already registered".into(),
            });
        }
        let raw_id = if self.email_ids {
            format!("local:{key}")
        } else {
            uuid::Uuid::new_v4().to_string()
        };
        let user_id =
            UserId::new(raw_id).map_err(|e| StorageError::Serialization(e.to_string()))?;
        accounts.insert(
            key,
            Account {
                password: password.to_owned(),
                user_id: user_id.clone(),
            },
        );
        Ok(user_id)
    }
}

#[async_trait]
impl AuthBackend for InMemoryAuth {
    async fn current_session(&self) -> Result<Option<AuthSession>, StorageError> {
        let guard = self
            .session
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, StorageError> {
        let account = {
            let accounts = self
                .accounts
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            accounts.get(&email.trim().to_lowercase()).cloned()
        };
        let account = match account {
            Some(account) if account.password == password => account,
            _ => {
                return Err(StorageError::Backend {
                    message: "Invalid login credentials".into(),
                });
            }
        };

        let session = AuthSession {
            user_id: account.user_id,
            email: email.trim().to_owned(),
            access_token: uuid::Uuid::new_v4().to_string(),
            refresh_token: None,
            expires_at: None,
        };
        let mut guard = self
            .session
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), StorageError> {
        self.register(email, password).map(|_| ())
    }

    async fn sign_out(&self) -> Result<(), StorageError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}
