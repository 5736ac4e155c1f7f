use async_trait::async_trait;
use quiz_core::model::{Attempt, QuestionId, Subject, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, map_attempt_row, ser, to_json};
use crate::changes::ChangeTable;
use crate::repository::{AttemptRepository, StorageError};

const ATTEMPT_COLUMNS: &str = "user_id, question_id, subject, selected_indices, is_correct, marks_delta, attempted_at, updated_at";

#[async_trait]
impl AttemptRepository for SqliteRepository {
    async fn find_attempt(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
    ) -> Result<Option<Attempt>, StorageError> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM user_question_attempts WHERE user_id = ?1 AND question_id = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(user_id.as_str())
            .bind(question_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        row.as_ref().map(map_attempt_row).transpose()
    }

    async fn insert_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO user_question_attempts (
                    user_id, question_id, subject, selected_indices,
                    is_correct, marks_delta, attempted_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(attempt.user_id.as_str())
        .bind(attempt.question_id.as_str())
        .bind(attempt.subject.as_str())
        .bind(to_json(&attempt.selected_indices)?)
        .bind(attempt.is_correct)
        .bind(i64::from(attempt.marks_delta))
        .bind(attempt.attempted_at)
        .bind(attempt.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return StorageError::Conflict;
                }
            }
            conn(e)
        })?;

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
        let sql = format!(
            r"
                SELECT {ATTEMPT_COLUMNS}
                FROM user_question_attempts
                WHERE user_id = ?1 AND subject = ?2
                ORDER BY attempted_at ASC, question_id ASC
                LIMIT ?3 OFFSET ?4
            "
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_str())
            .bind(subject.as_str())
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(map_attempt_row).collect()
    }

    async fn attempted_question_ids(
        &self,
        user_id: &UserId,
        question_ids: &[QuestionId],
    ) -> Result<Vec<QuestionId>, StorageError> {
        if question_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (0..question_ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT question_id FROM user_question_attempts WHERE user_id = ?1 AND question_id IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql).bind(user_id.as_str());
        for qid in question_ids {
            query = query.bind(qid.as_str());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;
        rows.iter()
            .map(|row| {
                let id: String = row.try_get("question_id").map_err(ser)?;
                QuestionId::new(id).map_err(ser)
            })
            .collect()
    }

    async fn delete_attempts(&self, user_id: &UserId, subject: &Subject) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM user_question_attempts WHERE user_id = ?1 AND subject = ?2")
            .bind(user_id.as_str())
            .bind(subject.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        self.changes.publish(ChangeTable::Attempts, user_id);
        Ok(())
    }
}
