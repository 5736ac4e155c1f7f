use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{QuestionId, QuizState, Subject, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser, u32_from_i64};
use crate::changes::ChangeTable;
use crate::repository::{QuizStateRepository, StorageError};

#[async_trait]
impl QuizStateRepository for SqliteRepository {
    async fn get_quiz_state(
        &self,
        user_id: &UserId,
        subject: &Subject,
    ) -> Result<Option<QuizState>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT current_question_id, timer_remaining_sec, timer_running
                FROM user_quiz_state
                WHERE user_id = ?1 AND subject = ?2
            ",
        )
        .bind(user_id.as_str())
        .bind(subject.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let current: Option<String> = row.try_get("current_question_id").map_err(ser)?;
        let current = current.map(QuestionId::new).transpose().map_err(ser)?;
        let remaining = u32_from_i64(
            "timer_remaining_sec",
            row.try_get("timer_remaining_sec").map_err(ser)?,
        )?;
        let running: bool = row.try_get("timer_running").map_err(ser)?;
        Ok(Some(QuizState::new(subject.clone(), current, remaining, running)))
    }

    async fn upsert_quiz_state(
        &self,
        user_id: &UserId,
        state: &QuizState,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO user_quiz_state (
                    user_id, subject, current_question_id,
                    timer_remaining_sec, timer_running, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(user_id, subject) DO UPDATE SET
                    current_question_id = excluded.current_question_id,
                    timer_remaining_sec = excluded.timer_remaining_sec,
                    timer_running = excluded.timer_running,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(user_id.as_str())
        .bind(state.subject.as_str())
        .bind(state.current_question_id.as_ref().map(QuestionId::as_str))
        .bind(i64::from(state.timer_remaining_secs))
        .bind(state.timer_running)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        self.changes.publish(ChangeTable::QuizState, user_id);
        Ok(())
    }

    async fn delete_quiz_state(
        &self,
        user_id: &UserId,
        subject: &Subject,
    ) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM user_quiz_state WHERE user_id = ?1 AND subject = ?2")
            .bind(user_id.as_str())
            .bind(subject.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        self.changes.publish(ChangeTable::QuizState, user_id);
        Ok(())
    }
}
