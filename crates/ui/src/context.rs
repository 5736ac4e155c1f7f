use std::sync::Arc;

use quiz_core::model::UserId;
use services::quiz::{QuizRunner, QuizStateSaver};
use services::{AuthService, OverviewService, PreferencesService, ProgressService};

pub trait UiApp: Send + Sync {
    fn auth(&self) -> Arc<AuthService>;
    fn overview(&self) -> Arc<OverviewService>;
    fn progress(&self) -> Arc<ProgressService>;
    fn preferences(&self) -> Arc<PreferencesService>;
    fn quiz_runner(&self) -> QuizRunner;
}

#[derive(Clone)]
pub struct AppContext {
    auth: Arc<AuthService>,
    overview: Arc<OverviewService>,
    progress: Arc<ProgressService>,
    preferences: Arc<PreferencesService>,
    quiz_runner: QuizRunner,
}

impl AppContext {
    #[must_use]
    pub fn new(app: &Arc<dyn UiApp>) -> Self {
        Self {
            auth: app.auth(),
            overview: app.overview(),
            progress: app.progress(),
            preferences: app.preferences(),
            quiz_runner: app.quiz_runner(),
        }
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
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn preferences(&self) -> Arc<PreferencesService> {
        Arc::clone(&self.preferences)
    }

    #[must_use]
    pub fn quiz_runner(&self) -> QuizRunner {
        self.quiz_runner.clone()
    }

    /// A fresh debounced saver for one user's quiz screen.
    #[must_use]
    pub fn quiz_state_saver(&self, user_id: UserId) -> QuizStateSaver {
        QuizStateSaver::new(self.progress(), user_id)
    }
}

// This context is provided by the application composition root (e.g. `crates/app`).

/// Build an `AppContext` from a UI-facing app implementation.
#[must_use]
pub fn build_app_context(app: &Arc<dyn UiApp>) -> AppContext {
    AppContext::new(app)
}
