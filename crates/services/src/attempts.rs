//! Attempt recording and the subject stats recompute.
//!
//! Stats are never updated incrementally. After every new attempt the
//! subject's row is rebuilt from the attempts themselves, so concurrent
//! writers and a failed earlier recompute converge on the next run.

use std::sync::Arc;

use quiz_core::model::{Attempt, QuestionId, StatsAccumulator, Subject, SubjectStat, UserId};
use storage::{Gateway, StorageError};

use crate::error::AttemptError;
use crate::Clock;

/// Attempts read per round trip while recomputing stats.
pub const STATS_BATCH_SIZE: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The attempt was stored and the subject row rebuilt.
    Recorded(SubjectStat),
    /// An attempt already existed; nothing was written.
    AlreadyRecorded,
}

pub struct AttemptService {
    clock: Clock,
    gateway: Arc<Gateway>,
}

impl AttemptService {
    #[must_use]
    pub fn new(clock: Clock, gateway: Arc<Gateway>) -> Self {
        Self { clock, gateway }
    }

    /// Store the user's first answer to a question, then rebuild the stats
    /// row for `subject`.
    ///
    /// A repeat submission for the same question is a no-op. The insert and
    /// the recompute are separate backend calls.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if any backend call fails.
    pub async fn record_attempt_and_update_stats(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
        subject: &Subject,
        selected_indices: &[u32],
        is_correct: bool,
    ) -> Result<RecordOutcome, AttemptError> {
        let storage = self.gateway.storage()?;

        if storage
            .attempts
            .find_attempt(user_id, question_id)
            .await?
            .is_some()
        {
            tracing::debug!(question = %question_id, "attempt already recorded");
            return Ok(RecordOutcome::AlreadyRecorded);
        }

        let attempt = Attempt::new(
            user_id.clone(),
            question_id.clone(),
            subject.clone(),
            selected_indices.to_vec(),
            is_correct,
            self.clock.now(),
        );
        match storage.attempts.insert_attempt(&attempt).await {
            Ok(()) => {}
            // Another session inserted between the lookup and the insert.
            Err(StorageError::Conflict) => return Ok(RecordOutcome::AlreadyRecorded),
            Err(err) => return Err(err.into()),
        }

        let stat = self.recompute_subject_stats_from_attempts(user_id, subject).await?;
        Ok(RecordOutcome::Recorded(stat))
    }

    /// Rebuild the `(user, subject)` stats row from every stored attempt.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if reading attempts or writing the row fails.
    pub async fn recompute_subject_stats_from_attempts(
        &self,
        user_id: &UserId,
        subject: &Subject,
    ) -> Result<SubjectStat, AttemptError> {
        let storage = self.gateway.storage()?;
        let mut acc = StatsAccumulator::default();
        let mut offset = 0_u32;
        loop {
            let batch = storage
                .attempts
                .list_attempts(user_id, subject, offset, STATS_BATCH_SIZE)
                .await?;
            for attempt in &batch {
                acc.push(attempt);
            }
            let fetched = u32::try_from(batch.len()).unwrap_or(STATS_BATCH_SIZE);
            if fetched < STATS_BATCH_SIZE {
                break;
            }
            offset = offset.saturating_add(fetched);
        }

        let stat = acc.finish(subject.clone());
        storage
            .stats
            .upsert_stat(user_id, &stat, self.clock.now())
            .await?;
        tracing::debug!(
            subject = %subject,
            attempted = stat.attempted(),
            marks = stat.marks(),
            "subject stats recomputed"
        );
        Ok(stat)
    }

    /// Manual repair for a subject row that drifted (e.g. after a failed
    /// recompute).
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if the recompute fails.
    pub async fn resync_subject_stats(
        &self,
        user_id: &UserId,
        subject: &Subject,
    ) -> Result<SubjectStat, AttemptError> {
        let stored = Subject::new(subject.storage_name());
        tracing::info!(user = %user_id, subject = %stored, "resyncing subject stats");
        self.recompute_subject_stats_from_attempts(user_id, &stored).await
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

    fn setup() -> (AttemptService, Storage) {
        let storage = Storage::in_memory();
        let gateway = Arc::new(Gateway::with_storage(storage.clone()));
        (AttemptService::new(Clock::fixed(fixed_now()), gateway), storage)
    }

    #[tokio::test]
    async fn second_submission_changes_nothing() {
        let (service, storage) = setup();
        let subject = Subject::from("Anatomy");

        let first = service
            .record_attempt_and_update_stats(&user(), &qid("q1"), &subject, &[2], true)
            .await
            .unwrap();
        let RecordOutcome::Recorded(stat) = first else {
            panic!("expected first attempt to be recorded");
        };
        assert_eq!((stat.attempted(), stat.correct(), stat.marks()), (1, 1, 4));

        let second = service
            .record_attempt_and_update_stats(&user(), &qid("q1"), &subject, &[0], false)
            .await
            .unwrap();
        assert_eq!(second, RecordOutcome::AlreadyRecorded);

        let stored = storage.attempts.find_attempt(&user(), &qid("q1")).await.unwrap().unwrap();
        assert_eq!(stored.selected_indices, vec![2]);
        assert!(stored.is_correct);
        let stats = storage.stats.list_stats(&user()).await.unwrap();
        assert_eq!(stats, vec![stat]);
    }

    #[tokio::test]
    async fn recompute_matches_fold_over_attempts() {
        let (service, storage) = setup();
        let subject = Subject::from("Physiology");
        for (i, correct) in [true, false, false, true, true].into_iter().enumerate() {
            service
                .record_attempt_and_update_stats(&user(), &qid(&format!("q{i}")), &subject, &[0], correct)
                .await
                .unwrap();
        }

        let attempts = storage.attempts.list_attempts(&user(), &subject, 0, 100).await.unwrap();
        let expected = SubjectStat::from_attempts(subject.clone(), &attempts);
        let stats = storage.stats.list_stats(&user()).await.unwrap();
        assert_eq!(stats, vec![expected.clone()]);
        assert_eq!((expected.attempted(), expected.correct(), expected.wrong()), (5, 3, 2));
        assert_eq!(expected.marks(), 3 * 4 - 2);
    }

    #[tokio::test]
    async fn resync_rebuilds_a_drifted_row() {
        let (service, storage) = setup();
        let subject = Subject::from("Anatomy");
        service
            .record_attempt_and_update_stats(&user(), &qid("q1"), &subject, &[0], true)
            .await
            .unwrap();
        let bogus = SubjectStat::from_persisted(subject.clone(), 9, 9, 0, 36).unwrap();
        storage.stats.upsert_stat(&user(), &bogus, fixed_now()).await.unwrap();

        let fixed = service.resync_subject_stats(&user(), &subject).await.unwrap();
        assert_eq!(fixed.attempted(), 1);
        assert_eq!(storage.stats.list_stats(&user()).await.unwrap(), vec![fixed]);
    }
}
