use quiz_core::scoring::format_percent;
use services::DashboardRow;

/// Placeholder while a count is still unknown.
pub const PENDING_LABEL: &str = "...";

#[derive(Clone, Debug, PartialEq)]
pub struct SubjectCardVm {
    pub subject: String,
    pub questions_label: String,
    pub attempted_label: String,
    pub marks_label: String,
    pub score_label: String,
    /// Width of the score bar, `0..=100`.
    pub score_width: f64,
}

#[must_use]
pub fn map_subject_cards(rows: &[DashboardRow]) -> Vec<SubjectCardVm> {
    rows.iter().map(map_subject_card).collect()
}

fn map_subject_card(row: &DashboardRow) -> SubjectCardVm {
    let questions_label = row.question_count.map_or_else(
        || format!("{PENDING_LABEL} questions"),
        |count| format!("{count} questions"),
    );
    SubjectCardVm {
        subject: row.subject.as_str().to_owned(),
        questions_label,
        attempted_label: format!("Attempted: {}", row.attempted),
        marks_label: format!("Marks: {}", row.marks),
        score_label: row
            .score_percent
            .map_or_else(|| format!("Score: {PENDING_LABEL}"), |pct| format!("Score: {}", format_percent(pct))),
        score_width: row.score_percent.unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::Subject;

    fn row(count: Option<u64>, score: Option<f64>) -> DashboardRow {
        DashboardRow {
            subject: Subject::new("Anatomy"),
            question_count: count,
            attempted: 5,
            marks: 15,
            score_percent: score,
        }
    }

    #[test]
    fn known_count_shows_score() {
        let cards = map_subject_cards(&[row(Some(10), Some(37.5))]);
        assert_eq!(cards[0].questions_label, "10 questions");
        assert_eq!(cards[0].attempted_label, "Attempted: 5");
        assert_eq!(cards[0].marks_label, "Marks: 15");
        assert_eq!(cards[0].score_label, "Score: 37.5%");
        assert_eq!(cards[0].score_width, 37.5);
    }

    #[test]
    fn unknown_count_shows_placeholder() {
        let cards = map_subject_cards(&[row(None, None)]);
        assert_eq!(cards[0].questions_label, "... questions");
        assert_eq!(cards[0].score_label, "Score: ...");
        assert_eq!(cards[0].score_width, 0.0);
    }
}
