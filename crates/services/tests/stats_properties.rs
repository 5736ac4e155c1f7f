use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{Attempt, QuestionId, Subject, SubjectStat, UserId};
use quiz_core::time::fixed_now;
use services::{AttemptService, Clock, RecordOutcome, STATS_BATCH_SIZE};
use storage::repository::{
    AttemptRepository, InMemoryRepository, StorageError, SubjectStatRepository,
};
use storage::{Gateway, InMemoryAuth, Storage};

fn user() -> UserId {
    UserId::new("u1").unwrap()
}

fn qid(n: usize) -> QuestionId {
    QuestionId::new(format!("q{n}")).unwrap()
}

fn expected(subject: &Subject, answers: &[bool]) -> SubjectStat {
    let correct = answers.iter().filter(|c| **c).count() as u32;
    let attempted = answers.len() as u32;
    let marks: i64 = answers.iter().map(|c| if *c { 4 } else { -1 }).sum();
    SubjectStat::from_persisted(subject.clone(), attempted, correct, attempted - correct, marks).unwrap()
}

#[tokio::test]
async fn stats_equal_the_fold_for_every_short_sequence() {
    let subject = Subject::new("Anatomy");
    // Every correct/incorrect pattern up to six answers.
    for len in 0..=6_usize {
        for bits in 0..(1_u32 << len) {
            let answers: Vec<bool> = (0..len).map(|i| bits & (1 << i) != 0).collect();
            let storage = Storage::in_memory();
            let service =
                AttemptService::new(Clock::fixed(fixed_now()), Arc::new(Gateway::with_storage(storage.clone())));

            for (i, correct) in answers.iter().enumerate() {
                service
                    .record_attempt_and_update_stats(&user(), &qid(i), &subject, &[0], *correct)
                    .await
                    .unwrap();
            }
            let stat = service
                .recompute_subject_stats_from_attempts(&user(), &subject)
                .await
                .unwrap();
            let want = expected(&subject, &answers);
            assert_eq!(stat, want, "answers {answers:?}");
            assert_eq!(stat.correct() + stat.wrong(), stat.attempted());
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_recording_never_loses_an_attempt() {
    let subject = Subject::new("Pathology");
    let storage = Storage::in_memory();
    let service = Arc::new(AttemptService::new(
        Clock::fixed(fixed_now()),
        Arc::new(Gateway::with_storage(storage.clone())),
    ));

    let answers: Vec<bool> = (0..40).map(|i| i % 3 != 0).collect();
    let mut handles = Vec::new();
    for (i, correct) in answers.iter().copied().enumerate() {
        let service = Arc::clone(&service);
        let subject = subject.clone();
        handles.push(tokio::spawn(async move {
            service
                .record_attempt_and_update_stats(&user(), &qid(i), &subject, &[1], correct)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Whatever order the recomputes landed in, one more rescan is exact.
    let stat = service
        .recompute_subject_stats_from_attempts(&user(), &subject)
        .await
        .unwrap();
    assert_eq!(stat, expected(&subject, &answers));
    let stored = storage.stats.list_stats(&user()).await.unwrap();
    assert_eq!(stored, vec![stat]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn double_submission_records_once() {
    let subject = Subject::new("Anatomy");
    let storage = Storage::in_memory();
    let service = Arc::new(AttemptService::new(
        Clock::fixed(fixed_now()),
        Arc::new(Gateway::with_storage(storage.clone())),
    ));

    let first = {
        let service = Arc::clone(&service);
        let subject = subject.clone();
        tokio::spawn(async move {
            service
                .record_attempt_and_update_stats(&user(), &qid(7), &subject, &[0], true)
                .await
        })
    };
    let second = {
        let service = Arc::clone(&service);
        let subject = subject.clone();
        tokio::spawn(async move {
            service
                .record_attempt_and_update_stats(&user(), &qid(7), &subject, &[2], false)
                .await
        })
    };
    let outcomes = [first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];
    let recorded = outcomes
        .iter()
        .filter(|o| matches!(o, RecordOutcome::Recorded(_)))
        .count();
    assert_eq!(recorded, 1);

    let attempts = storage
        .attempts
        .list_attempts(&user(), &subject, 0, 100)
        .await
        .unwrap();
    assert_eq!(attempts.len(), 1);
    let stats = storage.stats.list_stats(&user()).await.unwrap();
    assert_eq!(stats[0].attempted(), 1);

    let again = service
        .record_attempt_and_update_stats(&user(), &qid(7), &subject, &[1], false)
        .await
        .unwrap();
    assert_eq!(again, RecordOutcome::AlreadyRecorded);
    assert_eq!(storage.stats.list_stats(&user()).await.unwrap(), stats);
}

/// Stat store whose writes can be switched off to simulate a failure between
/// the attempt insert and the stats upsert.
struct FlakyStats {
    inner: InMemoryRepository,
    fail_writes: AtomicBool,
}

#[async_trait]
impl SubjectStatRepository for FlakyStats {
    async fn list_stats(&self, user_id: &UserId) -> Result<Vec<SubjectStat>, StorageError> {
        self.inner.list_stats(user_id).await
    }

    async fn upsert_stat(
        &self,
        user_id: &UserId,
        stat: &SubjectStat,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("stats write refused".into()));
        }
        self.inner.upsert_stat(user_id, stat, updated_at).await
    }

    async fn delete_stat(&self, user_id: &UserId, subject: &Subject) -> Result<(), StorageError> {
        self.inner.delete_stat(user_id, subject).await
    }
}

#[tokio::test]
async fn failed_recompute_is_repaired_by_the_next_attempt() {
    let repo = InMemoryRepository::new();
    let flaky = Arc::new(FlakyStats {
        inner: repo.clone(),
        fail_writes: AtomicBool::new(true),
    });
    let mut storage = Storage::from_in_memory(repo.clone(), InMemoryAuth::new());
    storage.stats = flaky.clone();
    let service = AttemptService::new(Clock::fixed(fixed_now()), Arc::new(Gateway::with_storage(storage)));
    let subject = Subject::new("Anatomy");

    let err = service
        .record_attempt_and_update_stats(&user(), &qid(1), &subject, &[0], true)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("stats write refused"));
    assert!(repo.find_attempt(&user(), &qid(1)).await.unwrap().is_some());
    assert!(repo.list_stats(&user()).await.unwrap().is_empty());

    flaky.fail_writes.store(false, Ordering::SeqCst);
    service
        .record_attempt_and_update_stats(&user(), &qid(2), &subject, &[0], false)
        .await
        .unwrap();
    assert_eq!(
        repo.list_stats(&user()).await.unwrap(),
        vec![expected(&subject, &[true, false])]
    );
}

/// Attempt store that counts page reads.
struct CountingAttempts {
    inner: InMemoryRepository,
    pages: AtomicUsize,
}

#[async_trait]
impl AttemptRepository for CountingAttempts {
    async fn find_attempt(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
    ) -> Result<Option<Attempt>, StorageError> {
        self.inner.find_attempt(user_id, question_id).await
    }

    async fn insert_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        self.inner.insert_attempt(attempt).await
    }

    async fn list_attempts(
        &self,
        user_id: &UserId,
        subject: &Subject,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Attempt>, StorageError> {
        self.pages.fetch_add(1, Ordering::SeqCst);
        self.inner.list_attempts(user_id, subject, offset, limit).await
    }

    async fn attempted_question_ids(
        &self,
        user_id: &UserId,
        question_ids: &[QuestionId],
    ) -> Result<Vec<QuestionId>, StorageError> {
        self.inner.attempted_question_ids(user_id, question_ids).await
    }

    async fn delete_attempts(&self, user_id: &UserId, subject: &Subject) -> Result<(), StorageError> {
        self.inner.delete_attempts(user_id, subject).await
    }
}

#[tokio::test]
async fn recompute_reads_every_batch_around_the_page_boundary() {
    let subject = Subject::new("Anatomy");
    for n in [999_usize, 1000, 1001, 2001] {
        let repo = InMemoryRepository::new();
        for i in 0..n {
            let attempt = Attempt::new(user(), qid(i), subject.clone(), vec![0], i % 3 == 0, fixed_now());
            repo.insert_attempt(&attempt).await.unwrap();
        }
        let counting = Arc::new(CountingAttempts {
            inner: repo.clone(),
            pages: AtomicUsize::new(0),
        });
        let mut storage = Storage::from_in_memory(repo.clone(), InMemoryAuth::new());
        storage.attempts = counting.clone();
        let service = AttemptService::new(Clock::fixed(fixed_now()), Arc::new(Gateway::with_storage(storage)));

        let stat = service
            .recompute_subject_stats_from_attempts(&user(), &subject)
            .await
            .unwrap();
        let correct = (n + 2) / 3;
        let marks = 4 * correct as i64 - (n - correct) as i64;
        assert_eq!(stat.attempted() as usize, n, "n = {n}");
        assert_eq!(stat.correct() as usize, correct, "n = {n}");
        assert_eq!(stat.wrong() as usize, n - correct, "n = {n}");
        assert_eq!(stat.marks(), marks, "n = {n}");

        // A full final page costs one extra, empty read.
        let batch = STATS_BATCH_SIZE as usize;
        assert_eq!(counting.pages.load(Ordering::SeqCst), n / batch + 1, "n = {n}");
        assert_eq!(repo.list_stats(&user()).await.unwrap(), vec![stat]);
    }
}
