use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{QuestionId, Subject, UserId};
use crate::scoring::marks_delta;

/// A user's first (and only) answer to a question.
///
/// Attempts are keyed by `(user_id, question_id)` and never change after
/// they are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub subject: Subject,
    pub selected_indices: Vec<u32>,
    pub is_correct: bool,
    pub marks_delta: i32,
    pub attempted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attempt {
    /// Build a fresh attempt; the marks delta follows from `is_correct`.
    #[must_use]
    pub fn new(
        user_id: UserId,
        question_id: QuestionId,
        subject: Subject,
        selected_indices: Vec<u32>,
        is_correct: bool,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            question_id,
            subject,
            selected_indices,
            is_correct,
            marks_delta: marks_delta(is_correct),
            attempted_at: at,
            updated_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn new_attempt_carries_marks_delta() {
        let user = UserId::new("u1").unwrap();
        let right = Attempt::new(
            user.clone(),
            QuestionId::new("q1").unwrap(),
            Subject::new("Anatomy"),
            vec![1],
            true,
            fixed_now(),
        );
        let wrong = Attempt::new(
            user,
            QuestionId::new("q2").unwrap(),
            Subject::new("Anatomy"),
            vec![0],
            false,
            fixed_now(),
        );
        assert_eq!(right.marks_delta, 4);
        assert_eq!(wrong.marks_delta, -1);
        assert_eq!(right.attempted_at, right.updated_at);
    }
}
