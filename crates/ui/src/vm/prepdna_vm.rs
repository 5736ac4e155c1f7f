use quiz_core::scoring::format_percent;
use services::{OverallProgress, PrepDna, PrepDnaRow};

use super::dashboard_vm::PENDING_LABEL;

#[derive(Clone, Debug, PartialEq)]
pub struct PrepDnaRowVm {
    pub subject: String,
    pub accuracy_label: String,
    pub band_class: &'static str,
    pub answers_label: String,
    pub marks_label: String,
    pub completion_label: String,
    pub completion_width: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OverallVm {
    pub attempted_label: String,
    pub marks_label: String,
    pub marks_percent_label: String,
    pub completion_label: String,
    pub completion_width: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PrepDnaVm {
    pub rows: Vec<PrepDnaRowVm>,
    pub overall: OverallVm,
}

#[must_use]
pub fn map_prep_dna(dna: &PrepDna) -> PrepDnaVm {
    PrepDnaVm {
        rows: dna.rows.iter().map(map_row).collect(),
        overall: map_overall(&dna.overall),
    }
}

fn map_row(row: &PrepDnaRow) -> PrepDnaRowVm {
    let marks_label = match row.marks_percent {
        Some(pct) => format!("Marks: {} ({})", row.marks, format_percent(pct)),
        None => format!("Marks: {}", row.marks),
    };
    PrepDnaRowVm {
        subject: row.subject.as_str().to_owned(),
        accuracy_label: format_percent(row.accuracy * 100.0),
        band_class: row.band.css_class(),
        answers_label: format!(
            "{} attempted, {} correct, {} wrong",
            row.attempted, row.correct, row.wrong
        ),
        marks_label,
        completion_label: row.completion_percent.map_or_else(
            || format!("Completion: {PENDING_LABEL}"),
            |pct| format!("Completion: {}", format_percent(pct)),
        ),
        completion_width: row.completion_percent.unwrap_or(0.0),
    }
}

fn map_overall(overall: &OverallProgress) -> OverallVm {
    OverallVm {
        attempted_label: format!(
            "{} of {} questions attempted",
            overall.attempted, overall.total_questions
        ),
        marks_label: format!("Total marks: {}", overall.marks),
        marks_percent_label: format_percent(overall.marks_percent),
        completion_label: format_percent(overall.completion_percent),
        completion_width: overall.completion_percent,
    }
}
