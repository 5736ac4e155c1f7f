use serde::{Deserialize, Serialize};

use crate::model::{QuestionId, Subject};

/// Length of a fresh quiz countdown: 20 minutes.
pub const DEFAULT_TIMER_SECS: u32 = 20 * 60;

/// Saved resume point for one user's quiz on one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizState {
    pub subject: Subject,
    pub current_question_id: Option<QuestionId>,
    pub timer_remaining_secs: u32,
    pub timer_running: bool,
}

impl QuizState {
    #[must_use]
    pub fn new(
        subject: Subject,
        current_question_id: Option<QuestionId>,
        timer_remaining_secs: u32,
        timer_running: bool,
    ) -> Self {
        Self {
            subject,
            current_question_id,
            timer_remaining_secs,
            timer_running,
        }
    }
}
