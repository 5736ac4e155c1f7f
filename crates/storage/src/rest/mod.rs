//! Client for the hosted PostgREST-style backend.

use reqwest::header::{HeaderValue, CONTENT_RANGE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};

use crate::auth::AuthSession;
use crate::changes::ChangeFeed;
use crate::gateway::{BackendConfig, GatewayError};
use crate::repository::{PreferenceRepository, Storage, StorageError};

mod auth;
mod query;
mod realtime;
mod repos;
mod rows;
mod session;

pub use auth::RestAuth;
pub use query::Query;
pub use session::SESSION_PREFERENCE_KEY;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Table and auth client for the hosted backend.
///
/// The signed-in session lives here so every request can carry its token and
/// a rejected token can be refreshed in one place.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: Arc<watch::Sender<Option<AuthSession>>>,
    session_store: Option<Arc<dyn PreferenceRepository>>,
    refresh_lock: Arc<Mutex<()>>,
    changes: ChangeFeed,
}

impl RestClient {
    /// # Errors
    ///
    /// Returns `GatewayError::Client` if the HTTP client cannot be built, or
    /// `GatewayError::InvalidUrl` if no realtime socket address can be derived
    /// from the base URL.
    pub fn new(config: &BackendConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;
        let (session, _rx) = watch::channel(None);
        let realtime = realtime::Realtime::new(config, session.subscribe())?;
        Ok(Self {
            http,
            base_url: config.base_url().to_owned(),
            anon_key: config.anon_key().to_owned(),
            session: Arc::new(session),
            session_store: None,
            refresh_lock: Arc::new(Mutex::new(())),
            changes: ChangeFeed::with_remote(Arc::new(realtime)),
        })
    }

    /// Save the signed-in session in `store` so a later run can restore it.
    #[must_use]
    pub fn with_session_store(mut self, store: Arc<dyn PreferenceRepository>) -> Self {
        self.session_store = Some(store);
        self
    }

    #[must_use]
    pub fn changes(&self) -> &ChangeFeed {
        &self.changes
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    pub(crate) fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    /// Request carrying the api key. `send` adds the bearer token.
    pub(crate) fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
    }

    /// Send as the signed-in user (or with the anon key before sign-in).
    ///
    /// A token close to expiry is refreshed first. A 401 triggers one refresh
    /// and one retry; if the refresh fails the session is dropped.
    pub(crate) async fn send(&self, builder: RequestBuilder) -> Result<Response, StorageError> {
        self.refresh_if_stale().await;
        let token = self.access_token();
        let retry = builder.try_clone();
        let response = self.dispatch(self.authorize(builder, token.as_deref())).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            if let (Some(stale), Some(retry)) = (token.as_deref(), retry) {
                if self.refresh_session(stale).await {
                    tracing::debug!("retrying request with refreshed session");
                    let fresh = self.access_token();
                    let response = self.dispatch(self.authorize(retry, fresh.as_deref())).await?;
                    return self.check(response).await;
                }
            }
        }
        self.check(response).await
    }

    fn authorize(&self, builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        builder.bearer_auth(token.unwrap_or(&self.anon_key))
    }

    async fn dispatch(&self, builder: RequestBuilder) -> Result<Response, StorageError> {
        builder
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Map a non-success status to `StorageError`.
    async fn check(&self, response: Response) -> Result<Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::CONFLICT {
            return Err(StorageError::Conflict);
        }
        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        tracing::warn!(%status, %message, "backend request failed");
        Err(StorageError::Backend { message })
    }

    pub(crate) async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, StorageError> {
        tracing::debug!(table, "select");
        let response = self
            .send(self.request(Method::GET, &self.table_url(table)).query(query.params()))
            .await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    pub(crate) async fn count(&self, table: &str, query: &Query) -> Result<u64, StorageError> {
        tracing::debug!(table, "count");
        let response = self
            .send(
                self.request(Method::HEAD, &self.table_url(table))
                    .query(query.params())
                    .header("Prefer", "count=exact"),
            )
            .await?;
        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v: &HeaderValue| v.to_str().ok())
            .and_then(content_range_total);
        Ok(total.unwrap_or(0))
    }

    pub(crate) async fn insert<T: Serialize + Sync>(
        &self,
        table: &str,
        rows: &[T],
    ) -> Result<(), StorageError> {
        tracing::debug!(table, rows = rows.len(), "insert");
        self.send(
            self.request(Method::POST, &self.table_url(table))
                .header("Prefer", "return=minimal")
                .json(rows),
        )
        .await?;
        Ok(())
    }

    pub(crate) async fn upsert<T: Serialize + Sync>(
        &self,
        table: &str,
        on_conflict: &str,
        rows: &[T],
    ) -> Result<(), StorageError> {
        tracing::debug!(table, rows = rows.len(), "upsert");
        let query = Query::new().on_conflict(on_conflict);
        self.send(
            self.request(Method::POST, &self.table_url(table))
                .query(query.params())
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(rows),
        )
        .await?;
        Ok(())
    }

    pub(crate) async fn delete(&self, table: &str, query: &Query) -> Result<(), StorageError> {
        tracing::debug!(table, "delete");
        self.send(
            self.request(Method::DELETE, &self.table_url(table))
                .query(query.params()),
        )
        .await?;
        Ok(())
    }
}

/// Pull the human-readable message out of an error body.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "msg", "error_description", "error"] {
            if let Some(serde_json::Value::String(message)) = map.get(key) {
                if !message.trim().is_empty() {
                    return message.clone();
                }
            }
        }
    }
    let body = body.trim();
    if body.is_empty() {
        status.to_string()
    } else {
        body.to_owned()
    }
}

/// Total from `Content-Range: 0-14/123` or `*/123`.
fn content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

impl Storage {
    /// Build a `Storage` backed by the hosted REST API. With a
    /// `session_store` the signed-in session survives restarts.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the client cannot be built.
    pub fn rest(
        config: &BackendConfig,
        session_store: Option<Arc<dyn PreferenceRepository>>,
    ) -> Result<Self, GatewayError> {
        let mut client = RestClient::new(config)?;
        if let Some(store) = session_store {
            client = client.with_session_store(store);
        }
        let changes = client.changes().clone();
        let auth = RestAuth::new(client.clone());
        let client = Arc::new(client);
        Ok(Self {
            questions: client.clone(),
            attempts: client.clone(),
            stats: client.clone(),
            quiz_states: client.clone(),
            bookmarks: client,
            auth: Arc::new(auth),
            changes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_backend_text() {
        let status = StatusCode::BAD_REQUEST;
        assert_eq!(
            error_message(status, r#"{"code":"42P01","message":"relation does not exist"}"#),
            "relation does not exist"
        );
        assert_eq!(
            error_message(status, r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message(status, "plain text"), "plain text");
        assert_eq!(error_message(status, ""), "400 Bad Request");
    }

    #[test]
    fn parses_content_range_totals() {
        assert_eq!(content_range_total("0-14/123"), Some(123));
        assert_eq!(content_range_total("*/0"), Some(0));
        assert_eq!(content_range_total("*/*"), None);
    }

    fn bearer(request: &reqwest::Request) -> Option<&str> {
        request
            .headers()
            .get(reqwest::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn session_token_replaces_anon_key() {
        let config = BackendConfig::new("https://x.test", "anon").unwrap();
        let client = RestClient::new(&config).unwrap();
        assert_eq!(client.access_token(), None);
        let url = client.table_url("questions");
        let request = client
            .authorize(client.request(Method::GET, &url), client.access_token().as_deref())
            .build()
            .unwrap();
        assert_eq!(bearer(&request), Some("Bearer anon"));
        assert_eq!(request.headers().get("apikey").unwrap(), "anon");

        client
            .install_session(Some(AuthSession {
                user_id: quiz_core::model::UserId::new("u1").unwrap(),
                email: "a@example.com".into(),
                access_token: "jwt".into(),
                refresh_token: None,
                expires_at: None,
            }))
            .await
            .unwrap();
        assert_eq!(client.access_token().as_deref(), Some("jwt"));
        let request = client
            .authorize(client.request(Method::GET, &url), client.access_token().as_deref())
            .build()
            .unwrap();
        assert_eq!(bearer(&request), Some("Bearer jwt"));
        assert_eq!(client.auth_url("logout"), "https://x.test/auth/v1/logout");
        assert_eq!(url, "https://x.test/rest/v1/questions");
    }
}
