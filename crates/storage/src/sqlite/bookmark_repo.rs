use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{QuestionId, Subject, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser};
use crate::changes::ChangeTable;
use crate::repository::{BookmarkRepository, BookmarkRow, StorageError};

fn map_bookmark_row(row: &sqlx::sqlite::SqliteRow) -> Result<BookmarkRow, StorageError> {
    let question_id: String = row.try_get("question_id").map_err(ser)?;
    let subject: Option<String> = row.try_get("subject").map_err(ser)?;
    let question_subject: Option<String> = row.try_get("question_subject").map_err(ser)?;
    Ok(BookmarkRow {
        question_id: QuestionId::new(question_id).map_err(ser)?,
        subject: subject.map(Subject::new),
        created_at: row.try_get("created_at").map_err(ser)?,
        question_text: row.try_get("question_text").map_err(ser)?,
        question_subject: question_subject.map(Subject::new),
    })
}

#[async_trait]
impl BookmarkRepository for SqliteRepository {
    async fn list_bookmarks(&self, user_id: &UserId) -> Result<Vec<BookmarkRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    b.question_id,
                    b.subject,
                    b.created_at,
                    q.text AS question_text,
                    q.subject AS question_subject
                FROM user_bookmarks b
                LEFT JOIN questions q ON q.id = b.question_id
                WHERE b.user_id = ?1
                ORDER BY b.created_at DESC
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        rows.iter().map(map_bookmark_row).collect()
    }

    async fn upsert_bookmark(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
        subject: &Subject,
        created_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO user_bookmarks (user_id, question_id, subject, created_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(user_id, question_id) DO UPDATE SET
                    subject = excluded.subject
            ",
        )
        .bind(user_id.as_str())
        .bind(question_id.as_str())
        .bind(subject.as_str())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        self.changes.publish(ChangeTable::Bookmarks, user_id);
        Ok(())
    }

    async fn delete_bookmark(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
    ) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM user_bookmarks WHERE user_id = ?1 AND question_id = ?2")
            .bind(user_id.as_str())
            .bind(question_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        self.changes.publish(ChangeTable::Bookmarks, user_id);
        Ok(())
    }

    async fn bookmark_exists(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query(
            "SELECT 1 AS present FROM user_bookmarks WHERE user_id = ?1 AND question_id = ?2",
        )
        .bind(user_id.as_str())
        .bind(question_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        Ok(row.is_some())
    }
}
