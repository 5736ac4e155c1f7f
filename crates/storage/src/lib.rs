#![forbid(unsafe_code)]

pub mod auth;
pub mod changes;
pub mod gateway;
pub mod repository;
pub mod rest;
pub mod sqlite;

pub use auth::{AuthBackend, AuthSession, InMemoryAuth};
pub use changes::{ChangeCallback, ChangeEvent, ChangeFeed, ChangeTable, RemoteChanges, Subscription};
pub use gateway::{BackendConfig, CONFIG_MISSING_MESSAGE, Gateway, GatewayError};
pub use repository::{Storage, StorageError};
