use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{Subject, SubjectStat, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser};
use crate::changes::ChangeTable;
use crate::repository::{StorageError, SubjectStatRepository, stored_stat};

fn map_stat_row(row: &sqlx::sqlite::SqliteRow) -> Result<SubjectStat, StorageError> {
    let subject: String = row.try_get("subject").map_err(ser)?;
    Ok(stored_stat(
        Subject::new(subject),
        row.try_get("attempted").map_err(ser)?,
        row.try_get("correct").map_err(ser)?,
        row.try_get("wrong").map_err(ser)?,
        row.try_get("marks").map_err(ser)?,
    ))
}

#[async_trait]
impl SubjectStatRepository for SqliteRepository {
    async fn list_stats(&self, user_id: &UserId) -> Result<Vec<SubjectStat>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT subject, attempted, correct, wrong, marks
                FROM user_subject_stats
                WHERE user_id = ?1
                ORDER BY subject ASC
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        rows.iter().map(map_stat_row).collect()
    }

    async fn upsert_stat(
        &self,
        user_id: &UserId,
        stat: &SubjectStat,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO user_subject_stats (
                    user_id, subject, attempted, correct, wrong, marks, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(user_id, subject) DO UPDATE SET
                    attempted = excluded.attempted,
                    correct = excluded.correct,
                    wrong = excluded.wrong,
                    marks = excluded.marks,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(user_id.as_str())
        .bind(stat.subject().as_str())
        .bind(i64::from(stat.attempted()))
        .bind(i64::from(stat.correct()))
        .bind(i64::from(stat.wrong()))
        .bind(stat.marks())
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        self.changes.publish(ChangeTable::SubjectStats, user_id);
        Ok(())
    }

    async fn delete_stat(&self, user_id: &UserId, subject: &Subject) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM user_subject_stats WHERE user_id = ?1 AND subject = ?2")
            .bind(user_id.as_str())
            .bind(subject.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        self.changes.publish(ChangeTable::SubjectStats, user_id);
        Ok(())
    }
}
