use quiz_core::model::{Attempt, QuestionDraft, QuestionId, Subject, UserId};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// JSON-encoded array columns.
pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

pub(crate) fn from_json<T: DeserializeOwned>(field: &'static str, raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Serialization(format!("invalid {field}: {e}")))
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuestionDraft, StorageError> {
    let options: String = row.try_get("options").map_err(ser)?;
    let correct: String = row.try_get("correct_indices").map_err(ser)?;
    Ok(QuestionDraft {
        id: row.try_get("id").map_err(ser)?,
        text: row.try_get("text").map_err(ser)?,
        options: Some(from_json("options", &options)?),
        correct_indices: Some(from_json("correct_indices", &correct)?),
        kind: row.try_get("type").map_err(ser)?,
        explanation: row.try_get("explanation").map_err(ser)?,
        subject: row.try_get("subject").map_err(ser)?,
    })
}

pub(crate) fn map_attempt_row(row: &sqlx::sqlite::SqliteRow) -> Result<Attempt, StorageError> {
    let selected: String = row.try_get("selected_indices").map_err(ser)?;
    let marks_delta: i64 = row.try_get("marks_delta").map_err(ser)?;
    Ok(Attempt {
        user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?,
        question_id: QuestionId::new(row.try_get::<String, _>("question_id").map_err(ser)?)
            .map_err(ser)?,
        subject: Subject::new(row.try_get::<String, _>("subject").map_err(ser)?),
        selected_indices: from_json("selected_indices", &selected)?,
        is_correct: row.try_get("is_correct").map_err(ser)?,
        marks_delta: i32::try_from(marks_delta)
            .map_err(|_| StorageError::Serialization(format!("invalid marks_delta: {marks_delta}")))?,
        attempted_at: row.try_get("attempted_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}
