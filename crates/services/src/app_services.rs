use std::sync::Arc;

use quiz_core::model::UserId;
use storage::repository::{InMemoryRepository, PreferenceRepository};
use storage::sqlite::SqliteRepository;
use storage::{BackendConfig, Gateway, InMemoryAuth, Storage};

use crate::attempts::AttemptService;
use crate::auth::{AccessCredentials, AuthService};
use crate::catalog::QuestionCatalogService;
use crate::error::AppServicesError;
use crate::overview::OverviewService;
use crate::preferences::PreferencesService;
use crate::progress::ProgressService;
use crate::quiz::{QuizRunner, QuizStateSaver};
use crate::Clock;

/// Where quiz data lives.
#[derive(Debug, Clone)]
pub enum BackendMode {
    /// Hosted REST backend.
    Remote(BackendConfig),
    /// The local `SQLite` database, with accounts kept in memory.
    Local,
    /// Nothing configured; every data call reports the configuration message.
    Unconfigured,
}

/// Assembles app-facing services around one gateway.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    gateway: Arc<Gateway>,
    catalog: Arc<QuestionCatalogService>,
    progress: Arc<ProgressService>,
    attempts: Arc<AttemptService>,
    auth: Arc<AuthService>,
    overview: Arc<OverviewService>,
    preferences: Arc<PreferencesService>,
    runner: QuizRunner,
}

impl AppServices {
    /// Build services for `mode`. Preferences, and the remote sign-in
    /// session, always use the local database at `db_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the local database cannot be opened.
    pub async fn new(
        clock: Clock,
        mode: BackendMode,
        db_url: &str,
        credentials: Option<AccessCredentials>,
    ) -> Result<Self, AppServicesError> {
        let local = SqliteRepository::open(db_url).await?;
        let gateway = match mode {
            BackendMode::Remote(config) => {
                Gateway::new(Some(config)).with_session_store(Arc::new(local.clone()))
            }
            BackendMode::Local => Gateway::with_storage(Storage::from_sqlite(
                local.clone(),
                InMemoryAuth::with_email_ids(),
            )),
            BackendMode::Unconfigured => Gateway::unconfigured(),
        };
        tracing::info!(configured = gateway.is_configured(), "services assembled");
        Ok(Self::assemble(clock, gateway, Arc::new(local), credentials))
    }

    /// Fully in-memory services, for tests and previews.
    #[must_use]
    pub fn in_memory(clock: Clock, credentials: Option<AccessCredentials>) -> Self {
        Self::assemble(
            clock,
            Gateway::with_storage(Storage::in_memory()),
            Arc::new(InMemoryRepository::new()),
            credentials,
        )
    }

    fn assemble(
        clock: Clock,
        gateway: Gateway,
        preferences: Arc<dyn PreferenceRepository>,
        credentials: Option<AccessCredentials>,
    ) -> Self {
        let gateway = Arc::new(gateway);
        let catalog = Arc::new(QuestionCatalogService::new(Arc::clone(&gateway)));
        let progress = Arc::new(ProgressService::new(clock, Arc::clone(&gateway)));
        let attempts = Arc::new(AttemptService::new(clock, Arc::clone(&gateway)));
        let auth = Arc::new(AuthService::new(Arc::clone(&gateway), credentials));
        let overview = Arc::new(OverviewService::new(
            Arc::clone(&catalog),
            Arc::clone(&progress),
        ));
        let runner = QuizRunner::new(
            Arc::clone(&catalog),
            Arc::clone(&progress),
            Arc::clone(&attempts),
        );
        Self {
            clock,
            gateway,
            catalog,
            progress,
            attempts,
            auth,
            overview,
            preferences: Arc::new(PreferencesService::new(preferences)),
            runner,
        }
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn gateway(&self) -> Arc<Gateway> {
        Arc::clone(&self.gateway)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<QuestionCatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn attempts(&self) -> Arc<AttemptService> {
        Arc::clone(&self.attempts)
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn overview(&self) -> Arc<OverviewService> {
        Arc::clone(&self.overview)
    }

    #[must_use]
    pub fn preferences(&self) -> Arc<PreferencesService> {
        Arc::clone(&self.preferences)
    }

    #[must_use]
    pub fn quiz_runner(&self) -> QuizRunner {
        self.runner.clone()
    }

    /// A debounced resume-point writer for `user_id`.
    #[must_use]
    pub fn quiz_state_saver(&self, user_id: UserId) -> QuizStateSaver {
        QuizStateSaver::new(Arc::clone(&self.progress), user_id)
    }
}
