//! Lazily-built handle to the configured backend.

use std::sync::{Arc, OnceLock};
use thiserror::Error;
use url::Url;

use crate::repository::{PreferenceRepository, Storage};

/// Shown wherever the backend is needed but not configured.
pub const CONFIG_MISSING_MESSAGE: &str = "Backend is not configured. Set QUIZ_BACKEND_URL and QUIZ_BACKEND_ANON_KEY, then restart the app.";

pub const BACKEND_URL_ENV: &str = "QUIZ_BACKEND_URL";
pub const BACKEND_ANON_KEY_ENV: &str = "QUIZ_BACKEND_ANON_KEY";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("{}", CONFIG_MISSING_MESSAGE)]
    ConfigMissing,

    #[error("invalid backend url: {0}")]
    InvalidUrl(String),

    #[error("failed to build backend client: {0}")]
    Client(String),
}

/// Connection settings for the hosted REST backend.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendConfig {
    url: Url,
    anon_key: String,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"<redacted>")
            .finish()
    }
}

impl BackendConfig {
    /// # Errors
    ///
    /// Returns `GatewayError::ConfigMissing` if either value is blank, or
    /// `GatewayError::InvalidUrl` if `url` does not parse.
    pub fn new(url: &str, anon_key: &str) -> Result<Self, GatewayError> {
        let (url, anon_key) = (url.trim(), anon_key.trim());
        if url.is_empty() || anon_key.is_empty() {
            return Err(GatewayError::ConfigMissing);
        }
        let url = Url::parse(url).map_err(|e| GatewayError::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self {
            url,
            anon_key: anon_key.to_owned(),
        })
    }

    /// Read `QUIZ_BACKEND_URL` and `QUIZ_BACKEND_ANON_KEY`.
    ///
    /// Returns `None` when either is unset or blank. An unparsable URL is
    /// logged and treated as absent.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_values(
            std::env::var(BACKEND_URL_ENV).ok(),
            std::env::var(BACKEND_ANON_KEY_ENV).ok(),
        )
    }

    #[must_use]
    pub fn from_values(url: Option<String>, anon_key: Option<String>) -> Option<Self> {
        let (url, anon_key) = (url?, anon_key?);
        match Self::new(&url, &anon_key) {
            Ok(config) => Some(config),
            Err(GatewayError::ConfigMissing) => None,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring backend configuration");
                None
            }
        }
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }

    #[must_use]
    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }
}

/// Builds the backend handle on first use and hands out the same one after.
///
/// There is no process-wide instance; the composition root creates one
/// gateway and passes it to the services.
pub struct Gateway {
    config: Option<BackendConfig>,
    session_store: Option<Arc<dyn PreferenceRepository>>,
    storage: OnceLock<Storage>,
}

impl Gateway {
    /// Gateway for the REST backend. Nothing is built until `storage()`.
    #[must_use]
    pub fn new(config: Option<BackendConfig>) -> Self {
        Self {
            config,
            session_store: None,
            storage: OnceLock::new(),
        }
    }

    /// Keep the REST session in `store` so sign-in survives restarts.
    #[must_use]
    pub fn with_session_store(mut self, store: Arc<dyn PreferenceRepository>) -> Self {
        self.session_store = Some(store);
        self
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::new(BackendConfig::from_env())
    }

    /// Gateway around an already-built backend.
    #[must_use]
    pub fn with_storage(storage: Storage) -> Self {
        let lock = OnceLock::new();
        let _ = lock.set(storage);
        Self {
            config: None,
            session_store: None,
            storage: lock,
        }
    }

    /// Gateway with no backend; every call reports the missing configuration.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self::new(None)
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.storage.get().is_some() || self.config.is_some()
    }

    /// The backend handle, building it on first call.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ConfigMissing` when no backend is configured, or
    /// `GatewayError::Client` if the HTTP client cannot be built.
    pub fn storage(&self) -> Result<&Storage, GatewayError> {
        if let Some(storage) = self.storage.get() {
            return Ok(storage);
        }
        let config = self.config.as_ref().ok_or(GatewayError::ConfigMissing)?;
        let built = Storage::rest(config, self.session_store.clone())?;
        tracing::debug!(url = config.base_url(), "backend client initialised");
        // A concurrent caller may have won the race; either value is equivalent.
        Ok(self.storage.get_or_init(|| built))
    }
}
