//! Wire shapes for the REST tables.

use chrono::{DateTime, Utc};
use quiz_core::model::{
    Attempt, QuestionDraft, QuestionId, QuizState, Subject, SubjectStat, UserId,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::repository::{BookmarkRow, QuestionRecord, StorageError, stored_stat};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Loose text coercion: strings pass through, scalars are printed, null is absent.
fn text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Counter columns read null or unparsable values as 0.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(integer).unwrap_or(0))
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionRow {
    id: Value,
    #[serde(default)]
    text: Option<Value>,
    #[serde(default)]
    options: Option<Value>,
    #[serde(default)]
    correct_indices: Option<Value>,
    #[serde(default, rename = "type")]
    kind: Option<Value>,
    #[serde(default)]
    explanation: Option<Value>,
    #[serde(default)]
    subject: Option<Value>,
}

impl QuestionRow {
    pub(crate) const COLUMNS: &'static str =
        "id,text,options,correct_indices,type,explanation,subject";

    pub(crate) fn into_draft(self) -> QuestionDraft {
        let options = match self.options {
            Some(Value::Array(items)) => Some(
                items
                    .into_iter()
                    .map(|v| text(Some(v)).unwrap_or_else(|| "null".into()))
                    .collect(),
            ),
            _ => None,
        };
        let correct_indices = match self.correct_indices {
            Some(Value::Array(items)) => Some(items.iter().filter_map(integer).collect()),
            _ => None,
        };
        QuestionDraft {
            id: text(Some(self.id)).unwrap_or_default(),
            text: text(self.text),
            options,
            correct_indices,
            kind: text(self.kind),
            explanation: text(self.explanation),
            subject: text(self.subject),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NewQuestionRow<'a> {
    id: &'a str,
    text: Option<&'a str>,
    options: &'a [String],
    correct_indices: &'a [i64],
    #[serde(rename = "type")]
    kind: Option<&'a str>,
    explanation: Option<&'a str>,
    subject: Option<&'a str>,
    created_at: DateTime<Utc>,
}

impl<'a> NewQuestionRow<'a> {
    pub(crate) fn from_record(record: &'a QuestionRecord) -> Self {
        let draft = &record.draft;
        Self {
            id: &draft.id,
            text: draft.text.as_deref(),
            options: draft.options.as_deref().unwrap_or_default(),
            correct_indices: draft.correct_indices.as_deref().unwrap_or_default(),
            kind: draft.kind.as_deref(),
            explanation: draft.explanation.as_deref(),
            subject: draft.subject.as_deref(),
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AttemptRow {
    user_id: String,
    question_id: String,
    subject: String,
    selected_indices: Vec<u32>,
    is_correct: bool,
    marks_delta: i32,
    attempted_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AttemptRow {
    pub(crate) const COLUMNS: &'static str =
        "user_id,question_id,subject,selected_indices,is_correct,marks_delta,attempted_at,updated_at";

    pub(crate) fn from_attempt(attempt: &Attempt) -> Self {
        Self {
            user_id: attempt.user_id.as_str().to_owned(),
            question_id: attempt.question_id.as_str().to_owned(),
            subject: attempt.subject.as_str().to_owned(),
            selected_indices: attempt.selected_indices.clone(),
            is_correct: attempt.is_correct,
            marks_delta: attempt.marks_delta,
            attempted_at: attempt.attempted_at,
            updated_at: attempt.updated_at,
        }
    }

    pub(crate) fn into_attempt(self) -> Result<Attempt, StorageError> {
        Ok(Attempt {
            user_id: UserId::new(self.user_id).map_err(ser)?,
            question_id: QuestionId::new(self.question_id).map_err(ser)?,
            subject: Subject::new(self.subject),
            selected_indices: self.selected_indices,
            is_correct: self.is_correct,
            marks_delta: self.marks_delta,
            attempted_at: self.attempted_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionIdRow {
    question_id: Value,
}

impl QuestionIdRow {
    pub(crate) fn into_id(self) -> Option<QuestionId> {
        text(Some(self.question_id)).and_then(|id| QuestionId::new(id).ok())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StatRow {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    subject: String,
    #[serde(default, deserialize_with = "lenient_count")]
    attempted: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    correct: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    wrong: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    marks: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl StatRow {
    pub(crate) const COLUMNS: &'static str = "subject,attempted,correct,wrong,marks";

    pub(crate) fn from_stat(user_id: &UserId, stat: &SubjectStat, updated_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.as_str().to_owned(),
            subject: stat.subject().as_str().to_owned(),
            attempted: i64::from(stat.attempted()),
            correct: i64::from(stat.correct()),
            wrong: i64::from(stat.wrong()),
            marks: stat.marks(),
            updated_at: Some(updated_at),
        }
    }

    pub(crate) fn into_stat(self) -> SubjectStat {
        stored_stat(
            Subject::new(self.subject),
            self.attempted,
            self.correct,
            self.wrong,
            self.marks,
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct QuizStateRow {
    #[serde(default)]
    user_id: String,
    subject: String,
    #[serde(default)]
    current_question_id: Option<Value>,
    #[serde(default)]
    timer_remaining_sec: i64,
    #[serde(default)]
    timer_running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl QuizStateRow {
    pub(crate) const COLUMNS: &'static str =
        "subject,current_question_id,timer_remaining_sec,timer_running";

    pub(crate) fn from_state(user_id: &UserId, state: &QuizState, updated_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.as_str().to_owned(),
            subject: state.subject.as_str().to_owned(),
            current_question_id: state
                .current_question_id
                .as_ref()
                .map(|id| Value::String(id.as_str().to_owned())),
            timer_remaining_sec: i64::from(state.timer_remaining_secs),
            timer_running: state.timer_running,
            updated_at: Some(updated_at),
        }
    }

    pub(crate) fn into_state(self) -> QuizState {
        let current = text(self.current_question_id).and_then(|id| QuestionId::new(id).ok());
        let remaining = u32::try_from(self.timer_remaining_sec.max(0)).unwrap_or(u32::MAX);
        QuizState::new(
            Subject::new(self.subject),
            current,
            remaining,
            self.timer_running,
        )
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbeddedQuestion {
    #[serde(default)]
    text: Option<Value>,
    #[serde(default)]
    subject: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BookmarkJoinRow {
    question_id: Value,
    #[serde(default)]
    subject: Option<Value>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    questions: Option<EmbeddedQuestion>,
}

impl BookmarkJoinRow {
    pub(crate) const COLUMNS: &'static str = "question_id,subject,created_at,questions(text,subject)";

    pub(crate) fn into_row(self) -> Option<BookmarkRow> {
        let question_id = QuestionId::new(text(Some(self.question_id))?).ok()?;
        let (question_text, question_subject) = match self.questions {
            Some(q) => (text(q.text), text(q.subject).map(Subject::new)),
            None => (None, None),
        };
        Some(BookmarkRow {
            question_id,
            subject: text(self.subject).map(Subject::new),
            created_at: self.created_at,
            question_text,
            question_subject,
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NewBookmarkRow<'a> {
    pub user_id: &'a str,
    pub question_id: &'a str,
    pub subject: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn question_row_coerces_loose_types() {
        let row: QuestionRow = serde_json::from_value(json!({
            "id": 42,
            "text": "Which nerve?",
            "options": ["A", 2, null],
            "correct_indices": ["1", 3],
            "type": "single",
            "explanation": null,
            "subject": "Anatomy"
        }))
        .unwrap();
        let draft = row.into_draft();
        assert_eq!(draft.id, "42");
        assert_eq!(draft.options.as_deref(), Some(&["A".to_owned(), "2".into(), "null".into()][..]));
        assert_eq!(draft.correct_indices, Some(vec![1, 3]));
        assert_eq!(draft.explanation, None);

        let question = draft.normalize().unwrap();
        assert_eq!(question.kind().as_str(), "multi");
    }

    #[test]
    fn missing_question_fields_default() {
        let row: QuestionRow = serde_json::from_value(json!({ "id": "q1" })).unwrap();
        let question = row.into_draft().normalize().unwrap();
        assert_eq!(question.text(), "");
        assert!(question.options().is_empty());
        assert_eq!(question.kind().as_str(), "single");
    }

    #[test]
    fn bookmark_join_without_question() {
        let row: BookmarkJoinRow = serde_json::from_value(json!({
            "question_id": "q9",
            "subject": null,
            "created_at": "2024-01-02T03:04:05Z",
            "questions": null
        }))
        .unwrap();
        let row = row.into_row().unwrap();
        assert_eq!(row.question_id.as_str(), "q9");
        assert_eq!(row.subject, None);
        assert_eq!(row.question_text, None);
    }

    #[test]
    fn unbalanced_stat_row_is_repaired_without_dropping_others() {
        let rows: Vec<StatRow> = serde_json::from_value(json!([
            { "subject": "Anatomy", "attempted": 3, "correct": 1, "wrong": 1, "marks": 3 },
            { "subject": "Physiology", "attempted": 2, "correct": 2, "wrong": 0, "marks": 8 }
        ]))
        .unwrap();
        let stats: Vec<SubjectStat> = rows.into_iter().map(StatRow::into_stat).collect();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].subject().as_str(), "Anatomy");
        assert_eq!((stats[0].attempted(), stats[0].correct(), stats[0].wrong()), (3, 1, 2));
        assert_eq!(stats[0].marks(), 3);
        assert_eq!((stats[1].attempted(), stats[1].correct(), stats[1].wrong()), (2, 2, 0));
    }

    #[test]
    fn null_and_text_counters_read_as_numbers() {
        let row: StatRow = serde_json::from_value(json!({
            "subject": "Anatomy", "attempted": null, "correct": "2", "wrong": null, "marks": -1
        }))
        .unwrap();
        let stat = row.into_stat();
        assert_eq!((stat.attempted(), stat.correct(), stat.wrong()), (0, 0, 0));
        assert_eq!(stat.marks(), -1);

        let row: StatRow = serde_json::from_value(json!({
            "subject": "Physiology", "attempted": 4.0, "correct": "3", "wrong": 1
        }))
        .unwrap();
        let stat = row.into_stat();
        assert_eq!((stat.attempted(), stat.correct(), stat.wrong(), stat.marks()), (4, 3, 1, 0));
    }
}
