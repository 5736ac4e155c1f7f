//! Marking scheme and the percentage figures shown on the dashboard,
//! PrepDNA and quiz header.

/// Marks awarded for a correct answer.
pub const MARKS_CORRECT: i32 = 4;
/// Marks awarded for an incorrect answer.
pub const MARKS_WRONG: i32 = -1;

#[must_use]
pub fn marks_delta(is_correct: bool) -> i32 {
    if is_correct { MARKS_CORRECT } else { MARKS_WRONG }
}

/// Highest marks reachable for a subject with `total_questions` questions.
#[must_use]
pub fn max_marks(total_questions: u64) -> i64 {
    i64::try_from(total_questions)
        .unwrap_or(i64::MAX)
        .saturating_mul(i64::from(MARKS_CORRECT))
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// Marks as a percentage of the maximum, clamped to `[0, 100]`.
///
/// Returns `None` when the subject has no questions.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_percent(marks: i64, total_questions: u64) -> Option<f64> {
    let max = max_marks(total_questions);
    if max <= 0 {
        return None;
    }
    Some(clamp_percent(marks as f64 / max as f64 * 100.0))
}

/// Share of the subject's questions that were attempted, clamped to `[0, 100]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn completion_percent(attempted: u32, total_questions: u64) -> f64 {
    if total_questions == 0 {
        return 0.0;
    }
    clamp_percent(f64::from(attempted) / total_questions as f64 * 100.0)
}

/// Correct / attempted as a ratio in `[0, 1]`.
#[must_use]
pub fn accuracy(correct: u32, attempted: u32) -> f64 {
    if attempted == 0 {
        return 0.0;
    }
    f64::from(correct) / f64::from(attempted)
}

/// Formats the quiz header score.
///
/// Small scores get more decimals so a handful of marks on a large subject
/// does not round to zero: exactly 0 prints `0.000%`, below 0.01 uses four
/// decimals, below 0.1 three, below 1 two, otherwise one.
#[must_use]
pub fn format_score_percent(pct: f64) -> String {
    if pct == 0.0 {
        return "0.000%".to_string();
    }
    if pct < 0.01 {
        format!("{pct:.4}%")
    } else if pct < 0.1 {
        format!("{pct:.3}%")
    } else if pct < 1.0 {
        format!("{pct:.2}%")
    } else {
        format!("{pct:.1}%")
    }
}

/// One-decimal percentage used on overview cards.
#[must_use]
pub fn format_percent(pct: f64) -> String {
    format!("{pct:.1}%")
}

/// Colour band for a subject's accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccuracyBand {
    Low,
    Medium,
    High,
}

impl AccuracyBand {
    #[must_use]
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy < 0.4 {
            AccuracyBand::Low
        } else if accuracy < 0.7 {
            AccuracyBand::Medium
        } else {
            AccuracyBand::High
        }
    }

    #[must_use]
    pub fn css_class(self) -> &'static str {
        match self {
            AccuracyBand::Low => "band-low",
            AccuracyBand::Medium => "band-medium",
            AccuracyBand::High => "band-high",
        }
    }
}
