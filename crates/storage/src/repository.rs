use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{Attempt, QuestionDraft, QuestionId, QuizState, Subject, SubjectStat, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::auth::{AuthBackend, InMemoryAuth};
use crate::changes::{ChangeFeed, ChangeTable};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backend rejected the request; `message` is what it said.
    #[error("{message}")]
    Backend { message: String },
}

/// Stat row as read back from a backend table.
///
/// Negative counters read as zero. A row whose counts do not balance is
/// logged and rebuilt with `wrong = attempted - correct` instead of failing
/// the whole listing.
pub(crate) fn stored_stat(
    subject: Subject,
    attempted: i64,
    correct: i64,
    wrong: i64,
    marks: i64,
) -> SubjectStat {
    let clamp = |v: i64| u32::try_from(v.max(0)).unwrap_or(u32::MAX);
    let (attempted, correct, wrong) = (clamp(attempted), clamp(correct), clamp(wrong));
    SubjectStat::from_persisted(subject.clone(), attempted, correct, wrong, marks).unwrap_or_else(
        |err| {
            tracing::warn!(subject = %subject, error = %err, "repairing stat row");
            SubjectStat::reconciled(subject, attempted, correct, marks)
        },
    )
}

/// Question row as written by the seeder.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRecord {
    pub draft: QuestionDraft,
    pub created_at: DateTime<Utc>,
}

/// Bookmark joined with whatever the catalog still knows about its question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkRow {
    pub question_id: QuestionId,
    pub subject: Option<Subject>,
    pub created_at: Option<DateTime<Utc>>,
    pub question_text: Option<String>,
    pub question_subject: Option<Subject>,
}

/// Read access to the question catalog.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Questions stored under `subject`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_questions(
        &self,
        subject: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<QuestionDraft>, StorageError>;

    /// Exact number of questions stored under `subject`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn count_questions(&self, subject: &str) -> Result<u64, StorageError>;

    /// Insert or replace questions by id. Returns the number written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any row cannot be stored.
    async fn upsert_questions(&self, rows: &[QuestionRecord]) -> Result<usize, StorageError>;
}

#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the lookup fails.
    async fn find_attempt(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
    ) -> Result<Option<Attempt>, StorageError>;

    /// Insert a new attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if `(user, question)` already exists.
    async fn insert_attempt(&self, attempt: &Attempt) -> Result<(), StorageError>;

    /// One page of a user's attempts in `subject`, in a stable order
    /// (attempted_at, then question id).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_attempts(
        &self,
        user_id: &UserId,
        subject: &Subject,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Attempt>, StorageError>;

    /// Subset of `question_ids` the user has attempted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn attempted_question_ids(
        &self,
        user_id: &UserId,
        question_ids: &[QuestionId],
    ) -> Result<Vec<QuestionId>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_attempts(&self, user_id: &UserId, subject: &Subject) -> Result<(), StorageError>;
}

#[async_trait]
pub trait SubjectStatRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails or a row is inconsistent.
    async fn list_stats(&self, user_id: &UserId) -> Result<Vec<SubjectStat>, StorageError>;

    /// Overwrite the stat row for `(user, stat.subject())`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn upsert_stat(
        &self,
        user_id: &UserId,
        stat: &SubjectStat,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_stat(&self, user_id: &UserId, subject: &Subject) -> Result<(), StorageError>;
}

#[async_trait]
pub trait QuizStateRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_quiz_state(
        &self,
        user_id: &UserId,
        subject: &Subject,
    ) -> Result<Option<QuizState>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn upsert_quiz_state(
        &self,
        user_id: &UserId,
        state: &QuizState,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_quiz_state(&self, user_id: &UserId, subject: &Subject)
    -> Result<(), StorageError>;
}

#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// Bookmarks newest first, joined with question text and subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_bookmarks(&self, user_id: &UserId) -> Result<Vec<BookmarkRow>, StorageError>;

    /// Insert, or update the subject of, the `(user, question)` bookmark.
    /// An existing row keeps its creation time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn upsert_bookmark(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
        subject: &Subject,
        created_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the delete fails.
    async fn delete_bookmark(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn bookmark_exists(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
    ) -> Result<bool, StorageError>;
}

/// Small key/value store for device-local settings.
#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn get_preference(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn set_preference(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

type UserKey<K> = (UserId, K);

#[derive(Debug, Clone)]
struct StoredBookmark {
    subject: Subject,
    created_at: DateTime<Utc>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<HashMap<String, QuestionRecord>>>,
    attempts: Arc<Mutex<HashMap<UserKey<QuestionId>, Attempt>>>,
    stats: Arc<Mutex<HashMap<UserKey<Subject>, SubjectStat>>>,
    quiz_states: Arc<Mutex<HashMap<UserKey<Subject>, QuizState>>>,
    bookmarks: Arc<Mutex<HashMap<UserKey<QuestionId>, StoredBookmark>>>,
    preferences: Arc<Mutex<HashMap<String, String>>>,
    changes: ChangeFeed,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed that this repository publishes its writes to.
    #[must_use]
    pub fn changes(&self) -> &ChangeFeed {
        &self.changes
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn list_questions(
        &self,
        subject: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<QuestionDraft>, StorageError> {
        let guard = lock(&self.questions)?;
        let mut rows: Vec<&QuestionRecord> = guard
            .values()
            .filter(|r| r.draft.subject.as_deref() == Some(subject))
            .collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.draft.id.cmp(&b.draft.id))
        });
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|r| r.draft.clone())
            .collect())
    }

    async fn count_questions(&self, subject: &str) -> Result<u64, StorageError> {
        let guard = lock(&self.questions)?;
        Ok(guard
            .values()
            .filter(|r| r.draft.subject.as_deref() == Some(subject))
            .count() as u64)
    }

    async fn upsert_questions(&self, rows: &[QuestionRecord]) -> Result<usize, StorageError> {
        let mut guard = lock(&self.questions)?;
        for row in rows {
            guard.insert(row.draft.id.clone(), row.clone());
        }
        Ok(rows.len())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn find_attempt(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
    ) -> Result<Option<Attempt>, StorageError> {
        let guard = lock(&self.attempts)?;
        Ok(guard.get(&(user_id.clone(), question_id.clone())).cloned())
    }

    async fn insert_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        {
            let mut guard = lock(&self.attempts)?;
            let key = (attempt.user_id.clone(), attempt.question_id.clone());
            if guard.contains_key(&key) {
                return Err(StorageError::Conflict);
            }
            guard.insert(key, attempt.clone());
        }
        self.changes.publish(ChangeTable::Attempts, &attempt.user_id);
        Ok(())
    }

    async fn list_attempts(
        &self,
        user_id: &UserId,
        subject: &Subject,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Attempt>, StorageError> {
        let guard = lock(&self.attempts)?;
        let mut rows: Vec<&Attempt> = guard
            .values()
            .filter(|a| &a.user_id == user_id && &a.subject == subject)
            .collect();
        rows.sort_by(|a, b| {
            a.attempted_at
                .cmp(&b.attempted_at)
                .then_with(|| a.question_id.cmp(&b.question_id))
        });
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn attempted_question_ids(
        &self,
        user_id: &UserId,
        question_ids: &[QuestionId],
    ) -> Result<Vec<QuestionId>, StorageError> {
        let guard = lock(&self.attempts)?;
        Ok(question_ids
            .iter()
            .filter(|qid| guard.contains_key(&(user_id.clone(), (*qid).clone())))
            .cloned()
            .collect())
    }

    async fn delete_attempts(&self, user_id: &UserId, subject: &Subject) -> Result<(), StorageError> {
        lock(&self.attempts)?.retain(|(uid, _), a| !(uid == user_id && &a.subject == subject));
        self.changes.publish(ChangeTable::Attempts, user_id);
        Ok(())
    }
}

#[async_trait]
impl SubjectStatRepository for InMemoryRepository {
    async fn list_stats(&self, user_id: &UserId) -> Result<Vec<SubjectStat>, StorageError> {
        let guard = lock(&self.stats)?;
        let mut rows: Vec<SubjectStat> = guard
            .iter()
            .filter(|((uid, _), _)| uid == user_id)
            .map(|(_, stat)| stat.clone())
            .collect();
        rows.sort_by(|a, b| a.subject().cmp(b.subject()));
        Ok(rows)
    }

    async fn upsert_stat(
        &self,
        user_id: &UserId,
        stat: &SubjectStat,
        _updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        lock(&self.stats)?.insert((user_id.clone(), stat.subject().clone()), stat.clone());
        self.changes.publish(ChangeTable::SubjectStats, user_id);
        Ok(())
    }

    async fn delete_stat(&self, user_id: &UserId, subject: &Subject) -> Result<(), StorageError> {
        lock(&self.stats)?.remove(&(user_id.clone(), subject.clone()));
        self.changes.publish(ChangeTable::SubjectStats, user_id);
        Ok(())
    }
}

#[async_trait]
impl QuizStateRepository for InMemoryRepository {
    async fn get_quiz_state(
        &self,
        user_id: &UserId,
        subject: &Subject,
    ) -> Result<Option<QuizState>, StorageError> {
        let guard = lock(&self.quiz_states)?;
        Ok(guard.get(&(user_id.clone(), subject.clone())).cloned())
    }

    async fn upsert_quiz_state(
        &self,
        user_id: &UserId,
        state: &QuizState,
        _updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        lock(&self.quiz_states)?.insert((user_id.clone(), state.subject.clone()), state.clone());
        self.changes.publish(ChangeTable::QuizState, user_id);
        Ok(())
    }

    async fn delete_quiz_state(
        &self,
        user_id: &UserId,
        subject: &Subject,
    ) -> Result<(), StorageError> {
        lock(&self.quiz_states)?.remove(&(user_id.clone(), subject.clone()));
        self.changes.publish(ChangeTable::QuizState, user_id);
        Ok(())
    }
}

#[async_trait]
impl BookmarkRepository for InMemoryRepository {
    async fn list_bookmarks(&self, user_id: &UserId) -> Result<Vec<BookmarkRow>, StorageError> {
        let marks: Vec<(QuestionId, StoredBookmark)> = lock(&self.bookmarks)?
            .iter()
            .filter(|((uid, _), _)| uid == user_id)
            .map(|((_, qid), stored)| (qid.clone(), stored.clone()))
            .collect();
        let questions = lock(&self.questions)?;

        let mut rows: Vec<BookmarkRow> = marks
            .into_iter()
            .map(|(question_id, stored)| {
                let question = questions.get(question_id.as_str());
                BookmarkRow {
                    subject: Some(stored.subject),
                    created_at: Some(stored.created_at),
                    question_text: question.and_then(|q| q.draft.text.clone()),
                    question_subject: question
                        .and_then(|q| q.draft.subject.as_deref())
                        .map(Subject::from),
                    question_id,
                }
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn upsert_bookmark(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
        subject: &Subject,
        created_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        lock(&self.bookmarks)?
            .entry((user_id.clone(), question_id.clone()))
            .and_modify(|stored| stored.subject = subject.clone())
            .or_insert_with(|| StoredBookmark {
                subject: subject.clone(),
                created_at,
            });
        self.changes.publish(ChangeTable::Bookmarks, user_id);
        Ok(())
    }

    async fn delete_bookmark(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
    ) -> Result<(), StorageError> {
        lock(&self.bookmarks)?.remove(&(user_id.clone(), question_id.clone()));
        self.changes.publish(ChangeTable::Bookmarks, user_id);
        Ok(())
    }

    async fn bookmark_exists(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
    ) -> Result<bool, StorageError> {
        Ok(lock(&self.bookmarks)?.contains_key(&(user_id.clone(), question_id.clone())))
    }
}

#[async_trait]
impl PreferenceRepository for InMemoryRepository {
    async fn get_preference(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.preferences)?.get(key).cloned())
    }

    async fn set_preference(&self, key: &str, value: &str) -> Result<(), StorageError> {
        lock(&self.preferences)?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Aggregates the backend handles the services talk to.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub stats: Arc<dyn SubjectStatRepository>,
    pub quiz_states: Arc<dyn QuizStateRepository>,
    pub bookmarks: Arc<dyn BookmarkRepository>,
    pub auth: Arc<dyn AuthBackend>,
    pub changes: ChangeFeed,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new(), InMemoryAuth::new())
    }

    /// Build a `Storage` around an existing in-memory repository, so callers
    /// can seed or inspect it directly.
    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository, auth: InMemoryAuth) -> Self {
        let changes = repo.changes().clone();
        let repo = Arc::new(repo);
        Self {
            questions: repo.clone(),
            attempts: repo.clone(),
            stats: repo.clone(),
            quiz_states: repo.clone(),
            bookmarks: repo,
            auth: Arc::new(auth),
            changes,
        }
    }
}
