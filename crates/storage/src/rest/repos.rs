use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{Attempt, QuestionDraft, QuestionId, QuizState, Subject, SubjectStat, UserId};

use super::query::Query;
use super::rows::{
    AttemptRow, BookmarkJoinRow, NewBookmarkRow, NewQuestionRow, QuestionIdRow, QuestionRow,
    QuizStateRow, StatRow,
};
use super::RestClient;
use crate::changes::ChangeTable;
use crate::repository::{
    AttemptRepository, BookmarkRepository, BookmarkRow, QuestionRecord, QuestionRepository,
    QuizStateRepository, StorageError, SubjectStatRepository,
};

const QUESTIONS: &str = "questions";
const ATTEMPTS: &str = "user_question_attempts";
const STATS: &str = "user_subject_stats";
const QUIZ_STATE: &str = "user_quiz_state";
const BOOKMARKS: &str = "user_bookmarks";

#[async_trait]
impl QuestionRepository for RestClient {
    async fn list_questions(
        &self,
        subject: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<QuestionDraft>, StorageError> {
        let query = Query::new()
            .select(QuestionRow::COLUMNS)
            .eq("subject", subject)
            .order("created_at", true)
            .range(offset, limit);
        let rows: Vec<QuestionRow> = self.select(QUESTIONS, &query).await?;
        Ok(rows.into_iter().map(QuestionRow::into_draft).collect())
    }

    async fn count_questions(&self, subject: &str) -> Result<u64, StorageError> {
        let query = Query::new().select("id").eq("subject", subject);
        self.count(QUESTIONS, &query).await
    }

    async fn upsert_questions(&self, rows: &[QuestionRecord]) -> Result<usize, StorageError> {
        let wire: Vec<NewQuestionRow<'_>> = rows.iter().map(NewQuestionRow::from_record).collect();
        self.upsert(QUESTIONS, "id", &wire).await?;
        Ok(wire.len())
    }
}

#[async_trait]
impl AttemptRepository for RestClient {
    async fn find_attempt(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
    ) -> Result<Option<Attempt>, StorageError> {
        let query = Query::new()
            .select(AttemptRow::COLUMNS)
            .eq("user_id", user_id.as_str())
            .eq("question_id", question_id.as_str())
            .limit(1);
        let rows: Vec<AttemptRow> = self.select(ATTEMPTS, &query).await?;
        rows.into_iter().next().map(AttemptRow::into_attempt).transpose()
    }

    async fn insert_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        self.insert(ATTEMPTS, &[AttemptRow::from_attempt(attempt)]).await?;
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
        let query = Query::new()
            .select(AttemptRow::COLUMNS)
            .eq("user_id", user_id.as_str())
            .eq("subject", subject.as_str())
            .order("attempted_at", false)
            .order("question_id", false)
            .range(offset, limit);
        let rows: Vec<AttemptRow> = self.select(ATTEMPTS, &query).await?;
        rows.into_iter().map(AttemptRow::into_attempt).collect()
    }

    async fn attempted_question_ids(
        &self,
        user_id: &UserId,
        question_ids: &[QuestionId],
    ) -> Result<Vec<QuestionId>, StorageError> {
        let ids: Vec<&str> = question_ids.iter().map(QuestionId::as_str).collect();
        let query = Query::new()
            .select("question_id")
            .eq("user_id", user_id.as_str())
            .in_list("question_id", &ids);
        let rows: Vec<QuestionIdRow> = self.select(ATTEMPTS, &query).await?;
        Ok(rows.into_iter().filter_map(QuestionIdRow::into_id).collect())
    }

    async fn delete_attempts(&self, user_id: &UserId, subject: &Subject) -> Result<(), StorageError> {
        let query = Query::new()
            .eq("user_id", user_id.as_str())
            .eq("subject", subject.as_str());
        self.delete(ATTEMPTS, &query).await?;
        self.changes.publish(ChangeTable::Attempts, user_id);
        Ok(())
    }
}

#[async_trait]
impl SubjectStatRepository for RestClient {
    async fn list_stats(&self, user_id: &UserId) -> Result<Vec<SubjectStat>, StorageError> {
        let query = Query::new()
            .select(StatRow::COLUMNS)
            .eq("user_id", user_id.as_str());
        let rows: Vec<StatRow> = self.select(STATS, &query).await?;
        Ok(rows.into_iter().map(StatRow::into_stat).collect())
    }

    async fn upsert_stat(
        &self,
        user_id: &UserId,
        stat: &SubjectStat,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let row = StatRow::from_stat(user_id, stat, updated_at);
        self.upsert(STATS, "user_id,subject", &[row]).await?;
        self.changes.publish(ChangeTable::SubjectStats, user_id);
        Ok(())
    }

    async fn delete_stat(&self, user_id: &UserId, subject: &Subject) -> Result<(), StorageError> {
        let query = Query::new()
            .eq("user_id", user_id.as_str())
            .eq("subject", subject.as_str());
        self.delete(STATS, &query).await?;
        self.changes.publish(ChangeTable::SubjectStats, user_id);
        Ok(())
    }
}

#[async_trait]
impl QuizStateRepository for RestClient {
    async fn get_quiz_state(
        &self,
        user_id: &UserId,
        subject: &Subject,
    ) -> Result<Option<QuizState>, StorageError> {
        let query = Query::new()
            .select(QuizStateRow::COLUMNS)
            .eq("user_id", user_id.as_str())
            .eq("subject", subject.as_str())
            .limit(1);
        let rows: Vec<QuizStateRow> = self.select(QUIZ_STATE, &query).await?;
        Ok(rows.into_iter().next().map(QuizStateRow::into_state))
    }

    async fn upsert_quiz_state(
        &self,
        user_id: &UserId,
        state: &QuizState,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let row = QuizStateRow::from_state(user_id, state, updated_at);
        self.upsert(QUIZ_STATE, "user_id,subject", &[row]).await?;
        self.changes.publish(ChangeTable::QuizState, user_id);
        Ok(())
    }

    async fn delete_quiz_state(
        &self,
        user_id: &UserId,
        subject: &Subject,
    ) -> Result<(), StorageError> {
        let query = Query::new()
            .eq("user_id", user_id.as_str())
            .eq("subject", subject.as_str());
        self.delete(QUIZ_STATE, &query).await?;
        self.changes.publish(ChangeTable::QuizState, user_id);
        Ok(())
    }
}

#[async_trait]
impl BookmarkRepository for RestClient {
    async fn list_bookmarks(&self, user_id: &UserId) -> Result<Vec<BookmarkRow>, StorageError> {
        let query = Query::new()
            .select(BookmarkJoinRow::COLUMNS)
            .eq("user_id", user_id.as_str())
            .order("created_at", true);
        let rows: Vec<BookmarkJoinRow> = self.select(BOOKMARKS, &query).await?;
        Ok(rows.into_iter().filter_map(BookmarkJoinRow::into_row).collect())
    }

    async fn upsert_bookmark(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
        subject: &Subject,
        _created_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        // created_at is left to the column default so an existing row keeps it.
        let row = NewBookmarkRow {
            user_id: user_id.as_str(),
            question_id: question_id.as_str(),
            subject: subject.as_str(),
        };
        self.upsert(BOOKMARKS, "user_id,question_id", &[row]).await?;
        self.changes.publish(ChangeTable::Bookmarks, user_id);
        Ok(())
    }

    async fn delete_bookmark(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
    ) -> Result<(), StorageError> {
        let query = Query::new()
            .eq("user_id", user_id.as_str())
            .eq("question_id", question_id.as_str());
        self.delete(BOOKMARKS, &query).await?;
        self.changes.publish(ChangeTable::Bookmarks, user_id);
        Ok(())
    }

    async fn bookmark_exists(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
    ) -> Result<bool, StorageError> {
        let query = Query::new()
            .select("question_id")
            .eq("user_id", user_id.as_str())
            .eq("question_id", question_id.as_str())
            .limit(1);
        let rows: Vec<QuestionIdRow> = self.select(BOOKMARKS, &query).await?;
        Ok(!rows.is_empty())
    }
}
