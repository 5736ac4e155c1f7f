use std::collections::VecDeque;
use std::sync::Arc;

use quiz_core::model::{QuestionId, Subject, UserId};

use crate::attempts::AttemptService;
use crate::catalog::QuestionCatalogService;
use crate::error::QuizError;
use crate::progress::ProgressService;

use super::session::{QuizCommand, QuizOutcome, QuizSession};

/// Executes `QuizCommand`s against the services and reports `QuizOutcome`s.
#[derive(Clone)]
pub struct QuizRunner {
    catalog: Arc<QuestionCatalogService>,
    progress: Arc<ProgressService>,
    attempts: Arc<AttemptService>,
}

impl QuizRunner {
    #[must_use]
    pub fn new(
        catalog: Arc<QuestionCatalogService>,
        progress: Arc<ProgressService>,
        attempts: Arc<AttemptService>,
    ) -> Self {
        Self {
            catalog,
            progress,
            attempts,
        }
    }

    /// Run one command. Errors become the message carried by the outcome.
    pub async fn execute(&self, command: QuizCommand) -> QuizOutcome {
        match command {
            QuizCommand::FetchPage {
                subject,
                offset,
                page_size,
            } => QuizOutcome::PageLoaded {
                offset,
                result: self
                    .catalog
                    .fetch_questions_page(&subject, page_size, offset)
                    .await
                    .map_err(message),
            },
            QuizCommand::FetchAttempted {
                user_id,
                question_ids,
            } => QuizOutcome::AttemptedLoaded(
                self.progress
                    .fetch_attempted_question_ids(&user_id, &question_ids)
                    .await
                    .map_err(message),
            ),
            QuizCommand::LoadQuizState { user_id, subject } => QuizOutcome::QuizStateLoaded(
                self.progress
                    .fetch_quiz_state(&user_id, &subject)
                    .await
                    .map_err(message),
            ),
            QuizCommand::LoadQuestionCount { subject } => QuizOutcome::QuestionCount(
                self.catalog
                    .fetch_subject_question_count(&subject)
                    .await
                    .map_err(message),
            ),
            QuizCommand::RefreshStats { user_id, subject } => {
                let stored = subject.storage_name();
                QuizOutcome::StatsRefreshed(
                    self.progress
                        .fetch_user_subject_stats(&user_id)
                        .await
                        .map(|rows| rows.into_iter().find(|s| s.subject().as_str() == stored))
                        .map_err(message),
                )
            }
            QuizCommand::RecordAttempt {
                user_id,
                question_id,
                subject,
                selected,
                is_correct,
            } => {
                let result = self
                    .attempts
                    .record_attempt_and_update_stats(
                        &user_id,
                        &question_id,
                        &subject,
                        &selected,
                        is_correct,
                    )
                    .await
                    .map(|_| ())
                    .map_err(message);
                QuizOutcome::AttemptRecorded {
                    question_id,
                    result,
                }
            }
            QuizCommand::ResetProgress { user_id, subject } => QuizOutcome::ProgressReset(
                self.progress
                    .reset_subject_progress(&user_id, &subject)
                    .await
                    .map_err(message),
            ),
            QuizCommand::SaveBookmark {
                user_id,
                question_id,
                subject,
            } => QuizOutcome::BookmarkSaved(
                self.save_bookmark_once(&user_id, &question_id, &subject)
                    .await
                    .map_err(message),
            ),
        }
    }

    /// Run `commands` and every follow-up they trigger, one at a time, until
    /// the session asks for nothing more.
    pub async fn drive(&self, session: &mut QuizSession, commands: Vec<QuizCommand>) {
        let mut queue: VecDeque<QuizCommand> = commands.into();
        while let Some(command) = queue.pop_front() {
            let outcome = self.execute(command).await;
            queue.extend(session.apply(outcome));
        }
    }

    async fn save_bookmark_once(
        &self,
        user_id: &UserId,
        question_id: &QuestionId,
        subject: &Subject,
    ) -> Result<bool, QuizError> {
        if self.progress.is_bookmarked(user_id, question_id).await? {
            return Ok(false);
        }
        self.progress
            .save_bookmark(user_id, question_id, subject)
            .await?;
        Ok(true)
    }
}

fn message(err: impl Into<QuizError>) -> String {
    err.into().to_string()
}
