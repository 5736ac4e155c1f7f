use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Attempt, Subject};
use crate::scoring::{accuracy, AccuracyBand};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StatError {
    #[error("correct ({correct}) + wrong ({wrong}) does not match attempted ({attempted})")]
    CountMismatch {
        attempted: u32,
        correct: u32,
        wrong: u32,
    },
}

/// Aggregate of one user's attempts within one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectStat {
    subject: Subject,
    attempted: u32,
    correct: u32,
    wrong: u32,
    marks: i64,
}

impl SubjectStat {
    /// Rehydrate a stat row from storage.
    ///
    /// # Errors
    ///
    /// Returns `StatError::CountMismatch` if `correct + wrong != attempted`.
    pub fn from_persisted(
        subject: Subject,
        attempted: u32,
        correct: u32,
        wrong: u32,
        marks: i64,
    ) -> Result<Self, StatError> {
        if correct.checked_add(wrong) != Some(attempted) {
            return Err(StatError::CountMismatch {
                attempted,
                correct,
                wrong,
            });
        }
        Ok(Self {
            subject,
            attempted,
            correct,
            wrong,
            marks,
        })
    }

    /// Stat row rebuilt from `attempted` and `correct` alone. `correct` is
    /// capped at `attempted` and `wrong` is whatever remains.
    #[must_use]
    pub fn reconciled(subject: Subject, attempted: u32, correct: u32, marks: i64) -> Self {
        let correct = correct.min(attempted);
        Self {
            subject,
            attempted,
            correct,
            wrong: attempted - correct,
            marks,
        }
    }

    /// Zero row for a subject with no attempts.
    #[must_use]
    pub fn empty(subject: Subject) -> Self {
        Self {
            subject,
            attempted: 0,
            correct: 0,
            wrong: 0,
            marks: 0,
        }
    }

    /// Fold a full list of attempts into a stat row.
    #[must_use]
    pub fn from_attempts(subject: Subject, attempts: &[Attempt]) -> Self {
        let mut acc = StatsAccumulator::default();
        for attempt in attempts {
            acc.push(attempt);
        }
        acc.finish(subject)
    }

    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    #[must_use]
    pub fn attempted(&self) -> u32 {
        self.attempted
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn wrong(&self) -> u32 {
        self.wrong
    }

    #[must_use]
    pub fn marks(&self) -> i64 {
        self.marks
    }

    /// Correct / attempted, 0 when nothing was attempted.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        accuracy(self.correct, self.attempted)
    }

    #[must_use]
    pub fn accuracy_band(&self) -> AccuracyBand {
        AccuracyBand::from_accuracy(self.accuracy())
    }
}

/// Running counters over attempt rows.
///
/// Marks come from each row's stored delta rather than being recomputed
/// from the correctness flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsAccumulator {
    attempted: u32,
    correct: u32,
    marks: i64,
}

impl StatsAccumulator {
    pub fn push(&mut self, attempt: &Attempt) {
        self.push_raw(attempt.is_correct, attempt.marks_delta);
    }

    pub fn push_raw(&mut self, is_correct: bool, marks_delta: i32) {
        self.attempted = self.attempted.saturating_add(1);
        if is_correct {
            self.correct = self.correct.saturating_add(1);
        }
        self.marks += i64::from(marks_delta);
    }

    #[must_use]
    pub fn attempted(&self) -> u32 {
        self.attempted
    }

    #[must_use]
    pub fn finish(self, subject: Subject) -> SubjectStat {
        SubjectStat {
            subject,
            attempted: self.attempted,
            correct: self.correct,
            wrong: self.attempted - self.correct,
            marks: self.marks,
        }
    }
}
