//! Dashboard and PrepDNA figures built from subject stats and question counts.

use std::collections::HashMap;
use std::sync::Arc;

use quiz_core::model::{Subject, SubjectStat, UserId, all_subjects, filter_subjects};
use quiz_core::scoring::{AccuracyBand, completion_percent, score_percent};
use tokio::task::JoinSet;

use crate::catalog::QuestionCatalogService;
use crate::error::ProgressError;
use crate::progress::ProgressService;

/// Question totals keyed by stored subject name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionCounts {
    counts: HashMap<String, u64>,
    /// Set when any count request failed; `counts` is then empty.
    pub error: Option<String>,
}

impl QuestionCounts {
    #[must_use]
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        Self {
            counts: pairs.into_iter().map(|(s, c)| (s.into(), c)).collect(),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            counts: HashMap::new(),
            error: Some(message.into()),
        }
    }

    /// Count for a display or stored subject; `None` while unknown.
    #[must_use]
    pub fn get(&self, subject: &Subject) -> Option<u64> {
        self.counts.get(subject.storage_name()).copied()
    }

    /// Sum over every dashboard subject; unknown counts add nothing.
    #[must_use]
    pub fn total(&self) -> u64 {
        all_subjects().iter().filter_map(|s| self.get(s)).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardRow {
    pub subject: Subject,
    pub question_count: Option<u64>,
    pub attempted: u32,
    pub marks: i64,
    /// Marks as a share of the maximum; only known once the count is.
    pub score_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrepDnaRow {
    /// Display name when the stored name belongs to a dashboard subject.
    pub subject: Subject,
    pub question_count: Option<u64>,
    pub attempted: u32,
    pub correct: u32,
    pub wrong: u32,
    pub marks: i64,
    pub accuracy: f64,
    pub band: AccuracyBand,
    pub completion_percent: Option<f64>,
    pub marks_percent: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverallProgress {
    pub attempted: u32,
    pub marks: i64,
    pub total_questions: u64,
    pub marks_percent: f64,
    pub completion_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrepDna {
    /// Highest accuracy first.
    pub rows: Vec<PrepDnaRow>,
    pub overall: OverallProgress,
}

/// One dashboard row per subject matching `query`.
#[must_use]
pub fn dashboard_rows(query: &str, counts: &QuestionCounts, stats: &[SubjectStat]) -> Vec<DashboardRow> {
    let by_subject = stats_by_stored_name(stats);
    filter_subjects(query)
        .into_iter()
        .map(|subject| {
            let stat = by_subject.get(subject.storage_name());
            let attempted = stat.map_or(0, |s| s.attempted());
            let marks = stat.map_or(0, |s| s.marks());
            let question_count = counts.get(&subject);
            DashboardRow {
                score_percent: question_count.map(|c| score_percent(marks, c).unwrap_or(0.0)),
                subject,
                question_count,
                attempted,
                marks,
            }
        })
        .collect()
}

#[must_use]
pub fn prep_dna(counts: &QuestionCounts, stats: &[SubjectStat]) -> PrepDna {
    let mut rows: Vec<PrepDnaRow> = stats
        .iter()
        .map(|stat| {
            let subject = Subject::from_storage_name(stat.subject().as_str());
            let question_count = counts.get(&subject);
            PrepDnaRow {
                question_count,
                attempted: stat.attempted(),
                correct: stat.correct(),
                wrong: stat.wrong(),
                marks: stat.marks(),
                accuracy: stat.accuracy(),
                band: stat.accuracy_band(),
                completion_percent: question_count.map(|c| completion_percent(stat.attempted(), c)),
                marks_percent: question_count.map(|c| score_percent(stat.marks(), c).unwrap_or(0.0)),
                subject,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.accuracy.total_cmp(&a.accuracy));

    let attempted = rows.iter().map(|r| r.attempted).sum();
    let marks = rows.iter().map(|r| r.marks).sum();
    let total_questions = counts.total();
    PrepDna {
        rows,
        overall: OverallProgress {
            attempted,
            marks,
            total_questions,
            marks_percent: score_percent(marks, total_questions).unwrap_or(0.0),
            completion_percent: completion_percent(attempted, total_questions),
        },
    }
}

fn stats_by_stored_name(stats: &[SubjectStat]) -> HashMap<&str, &SubjectStat> {
    stats.iter().map(|s| (s.subject().as_str(), s)).collect()
}

/// Loads the inputs for the overview screens.
#[derive(Clone)]
pub struct OverviewService {
    catalog: Arc<QuestionCatalogService>,
    progress: Arc<ProgressService>,
}

impl OverviewService {
    #[must_use]
    pub fn new(catalog: Arc<QuestionCatalogService>, progress: Arc<ProgressService>) -> Self {
        Self { catalog, progress }
    }

    /// Count every dashboard subject concurrently. Any failure discards all
    /// counts and reports that failure's message.
    pub async fn fetch_question_counts(&self) -> QuestionCounts {
        let mut tasks = JoinSet::new();
        for subject in all_subjects() {
            let catalog = Arc::clone(&self.catalog);
            tasks.spawn(async move {
                let count = catalog.fetch_subject_question_count(&subject).await;
                (subject, count)
            });
        }

        let mut counts = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((subject, Ok(count))) => counts.push((subject.storage_name().to_owned(), count)),
                Ok((subject, Err(err))) => {
                    tracing::warn!(subject = %subject, error = %err, "question count failed");
                    tasks.abort_all();
                    return QuestionCounts::failed(err.to_string());
                }
                Err(err) => {
                    tasks.abort_all();
                    return QuestionCounts::failed(err.to_string());
                }
            }
        }
        QuestionCounts::from_pairs(counts)
    }

    /// # Errors
    ///
    /// Returns `ProgressError` on missing configuration or backend failure.
    pub async fn fetch_stats(&self, user_id: &UserId) -> Result<Vec<SubjectStat>, ProgressError> {
        self.progress.fetch_user_subject_stats(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::QuestionDraft;
    use quiz_core::time::{fixed_clock, fixed_now};
    use storage::repository::QuestionRecord;
    use storage::{CONFIG_MISSING_MESSAGE, Gateway, Storage};

    fn stat(subject: &str, attempted: u32, correct: u32, marks: i64) -> SubjectStat {
        SubjectStat::from_persisted(Subject::new(subject), attempted, correct, attempted - correct, marks)
            .unwrap()
    }

    #[test]
    fn dashboard_filters_and_scores() {
        let counts = QuestionCounts::from_pairs([("Anatomy", 10), ("Skin", 0)]);
        let stats = [stat("Anatomy", 5, 4, 15), stat("Skin", 1, 0, -1)];

        let rows = dashboard_rows("ANAT", &counts, &stats);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].question_count, Some(10));
        assert_eq!(rows[0].attempted, 5);
        assert_eq!(rows[0].score_percent, Some(37.5));

        let rows = dashboard_rows("derma", &counts, &stats);
        assert_eq!(rows[0].subject, Subject::new("Dermatology"));
        assert_eq!(rows[0].attempted, 1, "stats found under the stored name");
        assert_eq!(rows[0].score_percent, Some(0.0));

        let rows = dashboard_rows("", &counts, &stats);
        let physiology = rows.iter().find(|r| r.subject.as_str() == "Physiology").unwrap();
        assert_eq!(physiology.question_count, None);
        assert_eq!(physiology.score_percent, None);
    }

    #[test]
    fn prep_dna_sorts_by_accuracy_and_clamps() {
        let counts = QuestionCounts::from_pairs([("Anatomy", 2), ("Orthopaedics", 10)]);
        let stats = [stat("Anatomy", 4, 1, 0), stat("Orthopaedics", 2, 2, 8)];
        let dna = prep_dna(&counts, &stats);

        assert_eq!(dna.rows[0].subject, Subject::new("Orthopedics"));
        assert_eq!(dna.rows[0].band, AccuracyBand::High);
        assert_eq!(dna.rows[0].completion_percent, Some(20.0));
        assert_eq!(dna.rows[1].band, AccuracyBand::Low);
        assert_eq!(dna.rows[1].completion_percent, Some(100.0), "clamped");

        assert_eq!(dna.overall.attempted, 6);
        assert_eq!(dna.overall.marks, 8);
        assert_eq!(dna.overall.total_questions, 12);
        assert_eq!(dna.overall.completion_percent, 50.0);
    }

    #[test]
    fn empty_stats_give_zero_overall() {
        let dna = prep_dna(&QuestionCounts::default(), &[]);
        assert!(dna.rows.is_empty());
        assert_eq!(dna.overall.marks_percent, 0.0);
        assert_eq!(dna.overall.completion_percent, 0.0);
    }

    #[tokio::test]
    async fn counts_are_keyed_by_stored_name() {
        let storage = Storage::in_memory();
        storage
            .questions
            .upsert_questions(&[QuestionRecord {
                draft: QuestionDraft {
                    id: "d1".into(),
                    subject: Some("Skin".into()),
                    ..QuestionDraft::default()
                },
                created_at: fixed_now(),
            }])
            .await
            .unwrap();
        let gateway = Arc::new(Gateway::with_storage(storage));
        let overview = OverviewService::new(
            Arc::new(QuestionCatalogService::new(gateway.clone())),
            Arc::new(ProgressService::new(fixed_clock(), gateway)),
        );
        let counts = overview.fetch_question_counts().await;
        assert_eq!(counts.error, None);
        assert_eq!(counts.get(&Subject::new("Dermatology")), Some(1));
        assert_eq!(counts.get(&Subject::new("Anatomy")), Some(0));
        assert_eq!(counts.total(), 1);
    }

    #[tokio::test]
    async fn unconfigured_backend_reports_count_error() {
        let gateway = Arc::new(Gateway::unconfigured());
        let overview = OverviewService::new(
            Arc::new(QuestionCatalogService::new(gateway.clone())),
            Arc::new(ProgressService::new(fixed_clock(), gateway)),
        );
        let counts = overview.fetch_question_counts().await;
        assert_eq!(counts.error.as_deref(), Some(CONFIG_MISSING_MESSAGE));
        assert_eq!(counts.get(&Subject::new("Anatomy")), None);
    }
}
