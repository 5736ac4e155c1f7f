use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::model::{ParseIdError, QuestionId, Subject};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error(transparent)]
    InvalidId(#[from] ParseIdError),
}

/// Single-answer or multiple-answer question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Single,
    Multi,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::Single => "single",
            QuestionKind::Multi => "multi",
        }
    }

    /// Derives the kind from the correct-index count; more than one correct
    /// index always wins over whatever flag was stored.
    #[must_use]
    pub fn infer(correct_count: usize, stored: Option<&str>) -> Self {
        if correct_count > 1 {
            return QuestionKind::Multi;
        }
        match stored {
            Some("multi") => QuestionKind::Multi,
            _ => QuestionKind::Single,
        }
    }
}

/// A question row as it comes out of storage, with every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub id: String,
    pub text: Option<String>,
    pub options: Option<Vec<String>>,
    pub correct_indices: Option<Vec<i64>>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub explanation: Option<String>,
    pub subject: Option<String>,
}

impl QuestionDraft {
    /// Stored correct indices that cannot name an option. `normalize` drops them.
    #[must_use]
    pub fn unusable_indices(&self) -> Vec<i64> {
        self.correct_indices
            .iter()
            .flatten()
            .copied()
            .filter(|raw| u32::try_from(*raw).is_err())
            .collect()
    }

    /// Coerce a raw row into a `Question`. Correct indices outside the `u32`
    /// range are dropped; the rest of the row is kept.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the id is blank.
    pub fn normalize(self) -> Result<Question, QuestionError> {
        let id = QuestionId::new(self.id)?;
        let correct_indices: BTreeSet<u32> = self
            .correct_indices
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| u32::try_from(raw).ok())
            .collect();
        let kind = QuestionKind::infer(correct_indices.len(), self.kind.as_deref());

        Ok(Question {
            id,
            text: self.text.unwrap_or_default(),
            options: self.options.unwrap_or_default(),
            correct_indices,
            kind,
            explanation: self.explanation.unwrap_or_default(),
            subject: Subject::new(self.subject.unwrap_or_default()),
        })
    }
}

/// A catalog question. Immutable from the app's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    text: String,
    options: Vec<String>,
    correct_indices: BTreeSet<u32>,
    kind: QuestionKind,
    explanation: String,
    subject: Subject,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_indices(&self) -> &BTreeSet<u32> {
        &self.correct_indices
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Subject label as stored on the row (already in storage naming).
    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    #[must_use]
    pub fn is_correct_option(&self, index: u32) -> bool {
        self.correct_indices.contains(&index)
    }

    /// A single-option pick is correct iff that option is one of the correct ones.
    #[must_use]
    pub fn grade_selection(&self, selected: &[u32]) -> bool {
        match selected {
            [only] => self.is_correct_option(*only),
            _ => false,
        }
    }
}

/// Option label shown next to an option: 0 → "A", 1 → "B", ...
#[must_use]
pub fn option_letter(index: usize) -> char {
    u8::try_from(index)
        .ok()
        .and_then(|i| b'A'.checked_add(i))
        .map_or('?', char::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(correct: Vec<i64>, kind: Option<&str>) -> QuestionDraft {
        QuestionDraft {
            id: "q1".into(),
            text: Some("Which nerve?".into()),
            options: Some(vec!["A".into(), "B".into(), "C".into()]),
            correct_indices: Some(correct),
            kind: kind.map(str::to_owned),
            explanation: None,
            subject: Some("Anatomy".into()),
        }
    }

    #[test]
    fn multiple_correct_indices_force_multi_kind() {
        let q = draft(vec![0, 2], Some("single")).normalize().unwrap();
        assert_eq!(q.kind(), QuestionKind::Multi);
    }

    #[test]
    fn stored_kind_is_kept_when_count_does_not_decide() {
        let q = draft(vec![1], Some("multi")).normalize().unwrap();
        assert_eq!(q.kind(), QuestionKind::Multi);
        let q = draft(vec![1], Some("weird")).normalize().unwrap();
        assert_eq!(q.kind(), QuestionKind::Single);
        let q = draft(vec![1], None).normalize().unwrap();
        assert_eq!(q.kind(), QuestionKind::Single);
    }

    #[test]
    fn missing_fields_become_empty_values() {
        let q = QuestionDraft {
            id: "7".into(),
            ..QuestionDraft::default()
        }
        .normalize()
        .unwrap();
        assert_eq!(q.text(), "");
        assert!(q.options().is_empty());
        assert!(q.correct_indices().is_empty());
        assert_eq!(q.explanation(), "");
        assert_eq!(q.subject().as_str(), "");
    }

    #[test]
    fn negative_index_is_dropped_and_question_kept() {
        let row = draft(vec![-1, 2], Some("multi"));
        assert_eq!(row.unusable_indices(), vec![-1]);
        let q = row.normalize().unwrap();
        assert_eq!(q.correct_indices().iter().copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(q.kind(), QuestionKind::Multi);
        assert!(q.grade_selection(&[2]));

        let q = draft(vec![-3], None).normalize().unwrap();
        assert!(q.correct_indices().is_empty());
        assert_eq!(q.kind(), QuestionKind::Single);
    }

    #[test]
    fn blank_id_is_rejected() {
        let err = QuestionDraft::default().normalize().unwrap_err();
        assert!(matches!(err, QuestionError::InvalidId(_)));
    }

    #[test]
    fn grading_uses_single_pick() {
        let q = draft(vec![2], None).normalize().unwrap();
        assert!(q.grade_selection(&[2]));
        assert!(!q.grade_selection(&[0]));
        assert!(!q.grade_selection(&[]));
    }

    #[test]
    fn option_letters() {
        assert_eq!(option_letter(0), 'A');
        assert_eq!(option_letter(3), 'D');
    }
}
