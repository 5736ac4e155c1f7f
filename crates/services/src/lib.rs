#![forbid(unsafe_code)]

pub mod app_services;
pub mod attempts;
pub mod auth;
pub mod catalog;
pub mod error;
pub mod overview;
pub mod preferences;
pub mod progress;
pub mod quiz;

pub use quiz_core::Clock;
pub use storage::Subscription;

pub use app_services::{AppServices, BackendMode};
pub use attempts::{AttemptService, RecordOutcome, STATS_BATCH_SIZE};
pub use auth::{
    AccessCredentials, AuthService, AuthState, CurrentUser, Redirect, RouteAccess, redirect_for,
};
pub use catalog::{DEFAULT_PAGE_SIZE, QuestionCatalogService, QuestionPage};
pub use error::{
    AppServicesError, AttemptError, AuthError, CatalogError, PreferencesError, ProgressError,
    QuizError,
};
pub use overview::{
    DashboardRow, OverallProgress, OverviewService, PrepDna, PrepDnaRow, QuestionCounts,
    dashboard_rows, prep_dna,
};
pub use preferences::PreferencesService;
pub use progress::ProgressService;
