//! Per-user progress: bookmarks, attempts, subject stats and quiz resume state.

use std::collections::HashSet;
use std::sync::Arc;

use quiz_core::model::{
    BOOKMARK_TEXT_FALLBACK, Bookmark, QuestionId, QuizState, Subject, SubjectStat, UserId,
};
use storage::{ChangeTable, Gateway, Subscription};

use crate::error::ProgressError;
use crate::Clock;

pub struct ProgressService {
    clock: Clock,
    gateway: Arc<Gateway>,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, gateway: Arc<Gateway>) -> Self {
        Self { clock, gateway }
    }

    /// One stat row per subject the user has touched.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` on missing configuration or backend failure.
    pub async fn fetch_user_subject_stats(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<SubjectStat>, ProgressError> {
        let storage = self.gateway.storage()?;
        Ok(storage.stats.list_stats(user_id).await?)
    }

    /// Call `on_change` whenever the user's stat rows change.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Gateway` when no backend is configured.
    pub fn subscribe_user_subject_stats<F>(
        &self,
        user_id: &UserId,
        on_change: F,
    ) -> Result<Subscription, ProgressError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let storage = self.gateway.storage()?;
        Ok(storage
            .changes
            .subscribe(ChangeTable::SubjectStats, user_id.clone(), on_change))
    }

    /// Bookmarks newest first. Questions missing from the catalog show `"-"`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` on missing configuration or backend failure.
    pub async fn fetch_user_bookmarks(&self, user_id: &UserId) -> Result<Vec<Bookmark>, ProgressError> {
        let storage = self.gateway.storage()?;
        let rows = storage.bookmarks.list_bookmarks(user_id).await?;
        Ok(rows
            .into_iter()
            .map(|row| Bookmark {
                question_id: row.question_id,
                subject: row
                    .subject
                    .or(row.question_subject)
                    .unwrap_or_else(|| Subject::new("")),
                text: row
                    .question_text
                    .unwrap_or_else(|| BOOKMARK_TEXT_FALLBACK.to_owned()),
                saved_at: row.created_at,
            })
            .collect())
    }

    /// # Errors
    ///
    /// Returns `ProgressError::Gateway` when no backend is configured.
    pub fn subscribe_user_bookmarks<F>(
        &self,
        user_id: &UserId,
        on_change: F,
    ) -> Result<Subscription, ProgressError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let storage = self.gateway.storage()?;
        Ok(storage
            .changes
            .subscribe(ChangeTable::Bookmarks, user_id.clone(), on_change))
    }

    /// Save a bookmark. Saving the same question twice leaves one row.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` on missing configuration or backend failure.
    pub async fn save_bookmark(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
        subject: &Subject,
    ) -> Result<(), ProgressError> {
        let storage = self.gateway.storage()?;
        storage
            .bookmarks
            .upsert_bookmark(user_id, question_id, subject, self.clock.now())
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ProgressError` on missing configuration or backend failure.
    pub async fn remove_bookmark(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
    ) -> Result<(), ProgressError> {
        let storage = self.gateway.storage()?;
        storage.bookmarks.delete_bookmark(user_id, question_id).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ProgressError` on missing configuration or backend failure.
    pub async fn is_bookmarked(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
    ) -> Result<bool, ProgressError> {
        let storage = self.gateway.storage()?;
        Ok(storage.bookmarks.bookmark_exists(user_id, question_id).await?)
    }

    /// Saved resume point, or `None` on a first visit.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` on missing configuration or backend failure.
    pub async fn fetch_quiz_state(
        &self,
        user_id: &UserId,
        subject: &Subject,
    ) -> Result<Option<QuizState>, ProgressError> {
        let storage = self.gateway.storage()?;
        Ok(storage.quiz_states.get_quiz_state(user_id, subject).await?)
    }

    /// Overwrite the resume point for `(user, state.subject)`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` on missing configuration or backend failure.
    pub async fn upsert_quiz_state(
        &self,
        user_id: &UserId,
        state: &QuizState,
    ) -> Result<(), ProgressError> {
        let storage = self.gateway.storage()?;
        storage
            .quiz_states
            .upsert_quiz_state(user_id, state, self.clock.now())
            .await?;
        Ok(())
    }

    /// Delete the user's attempts, stat row and resume point for `subject`,
    /// in that order. The first failure stops the sequence; earlier deletes
    /// are not undone.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` on missing configuration or backend failure.
    pub async fn reset_subject_progress(
        &self,
        user_id: &UserId,
        subject: &Subject,
    ) -> Result<(), ProgressError> {
        let storage = self.gateway.storage()?;
        let stored = Subject::new(subject.storage_name());
        tracing::info!(user = %user_id, subject = %subject, "resetting subject progress");
        storage.attempts.delete_attempts(user_id, &stored).await?;
        storage.stats.delete_stat(user_id, &stored).await?;
        storage.quiz_states.delete_quiz_state(user_id, subject).await?;
        Ok(())
    }

    /// Which of `question_ids` the user has already attempted.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` on missing configuration or backend failure.
    pub async fn fetch_attempted_question_ids(
        &self,
        user_id: &UserId,
        question_ids: &[QuestionId],
    ) -> Result<HashSet<QuestionId>, ProgressError> {
        if question_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let storage = self.gateway.storage()?;
        let ids = storage
            .attempts
            .attempted_question_ids(user_id, question_ids)
            .await?;
        Ok(ids.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::fixed_now;
    use storage::Storage;

    fn user() -> UserId {
        UserId::new("u1").unwrap()
    }

    fn qid(id: &str) -> QuestionId {
        QuestionId::new(id).unwrap()
    }

    fn service() -> ProgressService {
        ProgressService::new(
            Clock::fixed(fixed_now()),
            Arc::new(Gateway::with_storage(Storage::in_memory())),
        )
    }

    #[tokio::test]
    async fn empty_id_list_skips_the_backend() {
        let progress = ProgressService::new(Clock::fixed(fixed_now()), Arc::new(Gateway::unconfigured()));
        let ids = progress.fetch_attempted_question_ids(&user(), &[]).await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn bookmarks_fall_back_to_dash_and_dedupe() {
        let progress = service();
        let subject = Subject::from("Anatomy");
        progress.save_bookmark(&user(), &qid("q1"), &subject).await.unwrap();
        progress.save_bookmark(&user(), &qid("q1"), &subject).await.unwrap();

        let rows = progress.fetch_user_bookmarks(&user()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, BOOKMARK_TEXT_FALLBACK);
        assert_eq!(rows[0].subject, subject);
        assert!(progress.is_bookmarked(&user(), &qid("q1")).await.unwrap());

        progress.remove_bookmark(&user(), &qid("q1")).await.unwrap();
        assert!(!progress.is_bookmarked(&user(), &qid("q1")).await.unwrap());
    }

    #[tokio::test]
    async fn quiz_state_is_absent_until_saved() {
        let progress = service();
        let subject = Subject::from("Anatomy");
        assert_eq!(progress.fetch_quiz_state(&user(), &subject).await.unwrap(), None);

        let state = QuizState::new(subject.clone(), Some(qid("q3")), 90, true);
        progress.upsert_quiz_state(&user(), &state).await.unwrap();
        assert_eq!(
            progress.fetch_quiz_state(&user(), &subject).await.unwrap(),
            Some(state)
        );
    }
}
