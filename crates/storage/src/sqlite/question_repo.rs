use async_trait::async_trait;
use quiz_core::model::QuestionDraft;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, map_question_row, ser, to_json};
use crate::repository::{QuestionRecord, QuestionRepository, StorageError};

#[async_trait]
impl QuestionRepository for SqliteRepository {
    async fn list_questions(
        &self,
        subject: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<QuestionDraft>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, text, options, correct_indices, type, explanation, subject
                FROM questions
                WHERE subject = ?1
                ORDER BY created_at DESC, id ASC
                LIMIT ?2 OFFSET ?3
            ",
        )
        .bind(subject)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_question_row).collect()
    }

    async fn count_questions(&self, subject: &str) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM questions WHERE subject = ?1")
            .bind(subject)
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;
        let total: i64 = row.try_get("total").map_err(ser)?;
        u64::try_from(total).map_err(ser)
    }

    async fn upsert_questions(&self, rows: &[QuestionRecord]) -> Result<usize, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        for record in rows {
            let draft = &record.draft;
            let options = to_json(draft.options.as_deref().unwrap_or_default())?;
            let correct = to_json(draft.correct_indices.as_deref().unwrap_or_default())?;
            sqlx::query(
                r"
                    INSERT INTO questions (
                        id, text, options, correct_indices, type, explanation, subject, created_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(id) DO UPDATE SET
                        text = excluded.text,
                        options = excluded.options,
                        correct_indices = excluded.correct_indices,
                        type = excluded.type,
                        explanation = excluded.explanation,
                        subject = excluded.subject,
                        created_at = excluded.created_at
                ",
            )
            .bind(&draft.id)
            .bind(draft.text.as_deref())
            .bind(options)
            .bind(correct)
            .bind(draft.kind.as_deref())
            .bind(draft.explanation.as_deref())
            .bind(draft.subject.as_deref())
            .bind(record.created_at)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }
        tx.commit().await.map_err(conn)?;
        Ok(rows.len())
    }
}
