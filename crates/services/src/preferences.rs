use std::sync::Arc;

use quiz_core::model::{THEME_PREFERENCE_KEY, ThemePreference};
use storage::repository::PreferenceRepository;

use crate::error::PreferencesError;

/// Device-local settings. These never go through the backend gateway.
#[derive(Clone)]
pub struct PreferencesService {
    repo: Arc<dyn PreferenceRepository>,
}

impl PreferencesService {
    #[must_use]
    pub fn new(repo: Arc<dyn PreferenceRepository>) -> Self {
        Self { repo }
    }

    /// Saved theme, or `System` when unset or unrecognised.
    ///
    /// # Errors
    ///
    /// Returns `PreferencesError` on storage failures.
    pub async fn load_theme(&self) -> Result<ThemePreference, PreferencesError> {
        let raw = self.repo.get_preference(THEME_PREFERENCE_KEY).await?;
        Ok(match raw {
            Some(value) => value.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %value, "ignoring unknown theme preference");
                ThemePreference::default()
            }),
            None => ThemePreference::default(),
        })
    }

    /// # Errors
    ///
    /// Returns `PreferencesError` on storage failures.
    pub async fn save_theme(&self, theme: ThemePreference) -> Result<(), PreferencesError> {
        self.repo
            .set_preference(THEME_PREFERENCE_KEY, theme.as_str())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn theme_defaults_to_system_and_round_trips() {
        let repo = Arc::new(InMemoryRepository::new());
        let prefs = PreferencesService::new(repo.clone());
        assert_eq!(prefs.load_theme().await.unwrap(), ThemePreference::System);

        prefs.save_theme(ThemePreference::Dark).await.unwrap();
        assert_eq!(prefs.load_theme().await.unwrap(), ThemePreference::Dark);

        repo.set_preference(THEME_PREFERENCE_KEY, "neon").await.unwrap();
        assert_eq!(prefs.load_theme().await.unwrap(), ThemePreference::System);
    }
}
