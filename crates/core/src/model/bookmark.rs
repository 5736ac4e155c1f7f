use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{QuestionId, Subject};

/// Text shown for a bookmark whose question could not be joined.
pub const BOOKMARK_TEXT_FALLBACK: &str = "-";

/// A saved question, with the question text joined in at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub question_id: QuestionId,
    pub subject: Subject,
    pub text: String,
    pub saved_at: Option<DateTime<Utc>>,
}
