//! Current-user tracking on top of the backend's auth endpoints.

use std::sync::{Arc, Mutex};

use quiz_core::model::UserId;
use storage::{AuthSession, Gateway, Storage, StorageError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::AuthError;

pub const LOGIN_USERNAME_ENV: &str = "QUIZ_LOGIN_USERNAME";
pub const LOGIN_PASSWORD_ENV: &str = "QUIZ_LOGIN_PASSWORD";
pub const ACCOUNT_EMAIL_ENV: &str = "QUIZ_ACCOUNT_EMAIL";
pub const ACCOUNT_PASSWORD_ENV: &str = "QUIZ_ACCOUNT_PASSWORD";

/// Messages from a failed sign-in that mean the shared account does not
/// exist yet (or is unusable) and a signup should be attempted.
const SIGNUP_TRIGGERS: [&str; 4] = [
    "invalid login",
    "invalid credentials",
    "user not found",
    "email not confirmed",
];

/// The app's access gate plus the backend account it unlocks.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredentials {
    username: String,
    password: String,
    account_email: String,
    account_password: String,
}

impl std::fmt::Debug for AccessCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessCredentials")
            .field("username", &self.username)
            .field("account_email", &self.account_email)
            .finish_non_exhaustive()
    }
}

impl AccessCredentials {
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        account_email: impl Into<String>,
        account_password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            account_email: account_email.into(),
            account_password: account_password.into(),
        }
    }

    /// Read the four `QUIZ_LOGIN_*` / `QUIZ_ACCOUNT_*` variables.
    /// Returns `None` if any is unset or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        Some(Self::new(
            read(LOGIN_USERNAME_ENV)?,
            read(LOGIN_PASSWORD_ENV)?,
            read(ACCOUNT_EMAIL_ENV)?,
            read(ACCOUNT_PASSWORD_ENV)?,
        ))
    }

    fn accepts(&self, username: &str, password: &str) -> bool {
        username.trim() == self.username && password.trim() == self.password
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
}

impl From<AuthSession> for CurrentUser {
    fn from(session: AuthSession) -> Self {
        Self {
            id: session.user_id,
            email: session.email,
        }
    }
}

/// Snapshot published on every auth change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<CurrentUser>,
    /// True until the initial session probe finishes.
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }
}

/// Where a route should send the user, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    Login,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// `/`
    Root,
    /// `/login`
    Login,
    /// Everything behind the login.
    Protected,
}

/// Guard decision for a route. Nothing moves while auth is still loading.
#[must_use]
pub fn redirect_for(state: &AuthState, route: RouteAccess) -> Option<Redirect> {
    if state.loading {
        return None;
    }
    match (route, state.user.is_some()) {
        (RouteAccess::Protected, false) => Some(Redirect::Login),
        (RouteAccess::Root | RouteAccess::Login, true) => Some(Redirect::Dashboard),
        (RouteAccess::Root, false) => Some(Redirect::Login),
        _ => None,
    }
}

pub struct AuthService {
    gateway: Arc<Gateway>,
    credentials: Option<AccessCredentials>,
    state: Arc<watch::Sender<AuthState>>,
    follower: Mutex<Option<JoinHandle<()>>>,
}

impl AuthService {
    #[must_use]
    pub fn new(gateway: Arc<Gateway>, credentials: Option<AccessCredentials>) -> Self {
        let (state, _rx) = watch::channel(AuthState::default());
        Self {
            gateway,
            credentials,
            state: Arc::new(state),
            follower: Mutex::new(None),
        }
    }

    /// Stream of auth changes; the current value is available immediately.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<CurrentUser> {
        self.state.borrow().user.clone()
    }

    fn publish(&self, user: Option<CurrentUser>) {
        self.state.send_replace(AuthState {
            user,
            loading: false,
        });
    }

    /// Sign the user out here when the backend drops its session on its own,
    /// e.g. after a failed token refresh. Replaces any earlier follower.
    fn follow_backend(&self, storage: &Storage) {
        let Some(mut changes) = storage.auth.session_changes() else {
            return;
        };
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let ended = changes.borrow_and_update().is_none();
                if ended && state.borrow().user.is_some() {
                    tracing::info!("backend session ended, signing out");
                    state.send_replace(AuthState {
                        user: None,
                        loading: false,
                    });
                }
            }
        });
        if let Ok(mut follower) = self.follower.lock() {
            if let Some(previous) = follower.replace(task) {
                previous.abort();
            }
        }
    }

    /// Probe the backend for an existing session and clear the loading flag.
    /// Without a configured backend the user is simply signed out.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the probe fails; loading still ends.
    pub async fn init(&self) -> Result<(), AuthError> {
        let Ok(storage) = self.gateway.storage() else {
            self.publish(None);
            return Ok(());
        };
        self.follow_backend(storage);
        match storage.auth.current_session().await {
            Ok(session) => {
                self.publish(session.map(CurrentUser::from));
                Ok(())
            }
            Err(err) => {
                self.publish(None);
                Err(err.into())
            }
        }
    }

    /// Check the access gate locally, then sign in to the shared backend
    /// account, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` before any network call when
    /// the gate rejects the input, `AuthError::Gateway` when no backend is
    /// configured, or the backend's error.
    pub async fn login(&self, username: &str, password: &str) -> Result<CurrentUser, AuthError> {
        if username.trim().is_empty() || password.trim().is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        let credentials = self.credentials.as_ref().ok_or(AuthError::NotConfigured)?;
        if !credentials.accepts(username, password) {
            return Err(AuthError::InvalidCredentials);
        }

        let storage = self.gateway.storage()?;
        let auth = &storage.auth;
        let email = credentials.account_email.as_str();
        let secret = credentials.account_password.as_str();

        let session = match auth.sign_in_with_password(email, secret).await {
            Ok(session) => session,
            Err(StorageError::Backend { message }) if should_sign_up(&message) => {
                tracing::info!("account sign-in refused, signing up first");
                auth.sign_up(email, secret).await?;
                auth.sign_in_with_password(email, secret).await?
            }
            Err(err) => return Err(err.into()),
        };

        let user = CurrentUser::from(session);
        self.publish(Some(user.clone()));
        self.follow_backend(storage);
        Ok(user)
    }

    /// Sign out. The local user is cleared even if the backend call fails.
    ///
    /// # Errors
    ///
    /// Returns the backend's error from the sign-out call.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let result = match self.gateway.storage() {
            Ok(storage) => storage.auth.sign_out().await.map_err(AuthError::from),
            Err(_) => Ok(()),
        };
        self.publish(None);
        result
    }
}

impl Drop for AuthService {
    fn drop(&mut self) {
        if let Ok(mut follower) = self.follower.lock() {
            if let Some(task) = follower.take() {
                task.abort();
            }
        }
    }
}

fn should_sign_up(message: &str) -> bool {
    let message = message.to_lowercase();
    SIGNUP_TRIGGERS.iter().any(|t| message.contains(t))
}
