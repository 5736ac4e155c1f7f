mod bookmarks;
pub(crate) mod changes;
mod dashboard;
mod login;
mod prepdna;
mod quiz;
mod state;

#[cfg(test)]
mod test_harness;
#[cfg(test)]
mod view_smoke;

pub use bookmarks::BookmarksView;
pub use dashboard::DashboardView;
pub use login::LoginView;
pub use prepdna::PrepDnaView;
pub use quiz::QuizView;
pub use state::{ViewError, ViewState, view_state_from_resource};
