use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use quiz_core::model::{Question, QuestionId, QuizState, Subject, SubjectStat, UserId};
use quiz_core::scoring::{format_score_percent, score_percent};

use crate::catalog::{DEFAULT_PAGE_SIZE, QuestionPage};
use crate::error::QuizError;

use super::timer::Countdown;

/// How long a toast stays up before the view dismisses it.
pub const TOAST_DURATION: Duration = Duration::from_secs(2);

pub const MSG_LOADING_PROGRESS: &str = "Loading progress...";
pub const MSG_ALREADY_ATTEMPTED: &str = "Already attempted";
pub const MSG_NO_MORE_UNATTEMPTED: &str = "No more unattempted questions";
pub const MSG_ALREADY_BOOKMARKED: &str = "Already bookmarked";
pub const MSG_BOOKMARKED: &str = "Bookmarked";
pub const RESET_CONFIRM_PROMPT: &str = "Are you sure you want to reset this exam? All progress for this topic will be lost and the exam will restart.";

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

//
// ─── PHASES, COMMANDS, OUTCOMES ────────────────────────────────────────────────
//

/// Coarse state of a quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created but not started.
    Idle,
    /// First page in flight, nothing to show yet.
    Loading,
    /// Paging forward until a target or saved question is loaded.
    Resuming,
    /// Showing a question.
    Ready,
    /// Paging forward to satisfy a "next unattempted" request.
    Advancing,
}

/// Backend work requested by the session. Each command is self-contained so
/// the runner needs no session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizCommand {
    FetchPage {
        subject: Subject,
        offset: u32,
        page_size: u32,
    },
    FetchAttempted {
        user_id: UserId,
        question_ids: Vec<QuestionId>,
    },
    LoadQuizState {
        user_id: UserId,
        subject: Subject,
    },
    LoadQuestionCount {
        subject: Subject,
    },
    RefreshStats {
        user_id: UserId,
        subject: Subject,
    },
    RecordAttempt {
        user_id: UserId,
        question_id: QuestionId,
        subject: Subject,
        selected: Vec<u32>,
        is_correct: bool,
    },
    ResetProgress {
        user_id: UserId,
        subject: Subject,
    },
    SaveBookmark {
        user_id: UserId,
        question_id: QuestionId,
        subject: Subject,
    },
}

/// Result of a `QuizCommand`, fed back through `QuizSession::apply`.
/// Failures carry the message shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum QuizOutcome {
    PageLoaded {
        offset: u32,
        result: Result<QuestionPage, String>,
    },
    AttemptedLoaded(Result<HashSet<QuestionId>, String>),
    QuizStateLoaded(Result<Option<QuizState>, String>),
    QuestionCount(Result<u64, String>),
    StatsRefreshed(Result<Option<SubjectStat>, String>),
    AttemptRecorded {
        question_id: QuestionId,
        result: Result<(), String>,
    },
    ProgressReset(Result<(), String>),
    /// `Ok(true)` when a new bookmark was saved, `Ok(false)` if it existed.
    BookmarkSaved(Result<bool, String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    /// Identifies this toast for a delayed dismiss.
    pub seq: u64,
}

/// Figures shown above the question.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizHeader {
    pub subject: Subject,
    /// 1-based position of the current question.
    pub position: usize,
    /// Denominator for `position`: the subject total when known.
    pub position_of: u64,
    pub loaded: usize,
    pub total: Option<u64>,
    pub has_more: bool,
    pub attempted: u32,
    pub marks: i64,
    pub score_text: Option<String>,
    pub current_attempted: bool,
    pub timer_text: String,
    pub timer_running: bool,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Quiz flow for one user on one subject.
///
/// Events return the commands they need run; results come back through
/// [`QuizSession::apply`]. A subject change is a new session.
#[derive(Debug, Clone)]
pub struct QuizSession {
    epoch: u64,
    subject: Subject,
    user: Option<UserId>,
    target_qid: Option<QuestionId>,
    page_size: u32,
    started: bool,

    questions: Vec<Question>,
    offset: u32,
    has_more: bool,
    page_in_flight: bool,
    load_error: Option<String>,

    index: usize,
    selected: Vec<u32>,
    revealed: bool,
    busy: bool,
    bookmark_busy: bool,
    reset_pending: bool,

    pending_next: bool,
    initial_start_done: bool,
    resume_qid: Option<QuestionId>,
    jumped_to: Option<QuestionId>,
    hydrated: bool,

    attempted: HashSet<QuestionId>,
    attempted_loaded: bool,

    timer: Countdown,
    subject_total: Option<u64>,
    stat_attempted: u32,
    stat_marks: i64,

    toast: Option<Toast>,
    toast_seq: u64,
}

impl QuizSession {
    #[must_use]
    pub fn new(subject: Subject, user: Option<UserId>, target_qid: Option<QuestionId>) -> Self {
        Self {
            epoch: NEXT_EPOCH.fetch_add(1, Ordering::Relaxed),
            subject,
            user,
            target_qid,
            page_size: DEFAULT_PAGE_SIZE,
            started: false,
            questions: Vec::new(),
            offset: 0,
            has_more: true,
            page_in_flight: false,
            load_error: None,
            index: 0,
            selected: Vec::new(),
            revealed: false,
            busy: false,
            bookmark_busy: false,
            reset_pending: false,
            pending_next: false,
            initial_start_done: false,
            resume_qid: None,
            jumped_to: None,
            hydrated: false,
            attempted: HashSet::new(),
            attempted_loaded: false,
            timer: Countdown::default(),
            subject_total: None,
            stat_attempted: 0,
            stat_marks: 0,
            toast: None,
            toast_seq: 0,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Unique per session; lets a view drop results meant for an older one.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        if !self.started {
            Phase::Idle
        } else if self.page_in_flight && self.questions.is_empty() {
            Phase::Loading
        } else if self.desired_unresolved() {
            Phase::Resuming
        } else if self.pending_next {
            Phase::Advancing
        } else {
            Phase::Ready
        }
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn current(&self) -> Option<&Question> {
        self.questions.get(self.index)
    }

    #[must_use]
    pub fn selected(&self) -> &[u32] {
        &self.selected
    }

    #[must_use]
    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    #[must_use]
    pub fn is_bookmark_busy(&self) -> bool {
        self.bookmark_busy
    }

    #[must_use]
    pub fn is_page_loading(&self) -> bool {
        self.page_in_flight
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    #[must_use]
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// A load failure with nothing loaded blocks the whole screen.
    #[must_use]
    pub fn blocking_error(&self) -> Option<&str> {
        if self.questions.is_empty() {
            self.load_error()
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    #[must_use]
    pub fn attempted_loaded(&self) -> bool {
        self.attempted_loaded
    }

    #[must_use]
    pub fn is_attempted(&self, id: &QuestionId) -> bool {
        self.attempted.contains(id)
    }

    #[must_use]
    pub fn timer(&self) -> &Countdown {
        &self.timer
    }

    #[must_use]
    pub fn toast(&self) -> Option<&Toast> {
        self.toast.as_ref()
    }

    #[must_use]
    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    /// True when the revealed single pick is a correct option.
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.revealed
            && self
                .current()
                .is_some_and(|q| q.grade_selection(&self.selected))
    }

    /// Option buttons accept no input.
    #[must_use]
    pub fn options_locked(&self) -> bool {
        self.busy
            || self.revealed
            || !self.attempted_loaded
            || self.current().is_some_and(|q| self.attempted.contains(q.id()))
    }

    /// Show the "end of the loaded set" hint.
    #[must_use]
    pub fn near_loaded_end(&self) -> bool {
        self.has_more && self.index + 2 >= self.questions.len()
    }

    #[must_use]
    pub fn header(&self) -> QuizHeader {
        let loaded = self.questions.len();
        let total = self.subject_total.filter(|t| *t > 0);
        let fallback = loaded.max(self.index + 1);
        QuizHeader {
            subject: self.subject.clone(),
            position: self.index + 1,
            position_of: total.unwrap_or(fallback as u64),
            loaded,
            total,
            has_more: self.has_more,
            attempted: self.stat_attempted,
            marks: self.stat_marks,
            score_text: total
                .and_then(|t| score_percent(self.stat_marks, t))
                .map(format_score_percent),
            current_attempted: self
                .current()
                .is_some_and(|q| self.attempted.contains(q.id())),
            timer_text: self.timer.text(),
            timer_running: self.timer.is_running(),
        }
    }

    /// The resume point to persist, once it is safe to overwrite the saved one.
    #[must_use]
    pub fn snapshot(&self) -> Option<QuizState> {
        self.user.as_ref()?;
        let question = self.current()?;
        if !self.hydrated || self.desired_unresolved() {
            return None;
        }
        Some(QuizState::new(
            self.subject.clone(),
            Some(question.id().clone()),
            self.timer.remaining_secs(),
            self.timer.is_running(),
        ))
    }

    #[must_use]
    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    //
    // ─── EVENTS ────────────────────────────────────────────────────────────────
    //

    /// Kick off the first page and, when signed in, the saved state and stats.
    pub fn start(&mut self) -> Vec<QuizCommand> {
        if self.started {
            return Vec::new();
        }
        self.started = true;
        let mut commands = vec![
            self.fetch_page(),
            QuizCommand::LoadQuestionCount {
                subject: self.subject.clone(),
            },
        ];
        if let Some(user_id) = &self.user {
            commands.push(QuizCommand::LoadQuizState {
                user_id: user_id.clone(),
                subject: self.subject.clone(),
            });
            commands.push(self.refresh_stats_for(user_id.clone()));
        }
        commands
    }

    /// Answer the current question with option `option`.
    pub fn select_option(&mut self, option: u32) -> Vec<QuizCommand> {
        let Some(question) = self.current() else {
            return Vec::new();
        };
        let question_id = question.id().clone();
        let subject = question.subject().clone();
        let is_correct = question.is_correct_option(option);

        if self.revealed || self.busy {
            return Vec::new();
        }
        if !self.attempted_loaded {
            self.show_toast(ToastKind::Info, MSG_LOADING_PROGRESS);
            return Vec::new();
        }
        if self.attempted.contains(&question_id) {
            self.show_toast(ToastKind::Info, MSG_ALREADY_ATTEMPTED);
            return Vec::new();
        }
        let Some(user_id) = self.user.clone() else {
            self.show_toast(ToastKind::Error, QuizError::SignedOut.to_string());
            return Vec::new();
        };

        self.busy = true;
        self.selected = vec![option];
        self.revealed = true;

        vec![QuizCommand::RecordAttempt {
            user_id,
            question_id,
            subject,
            selected: vec![option],
            is_correct,
        }]
    }

    /// Move to the next unattempted question, paging forward if needed.
    pub fn next(&mut self) -> Vec<QuizCommand> {
        if self.current().is_none() || self.busy || self.page_in_flight {
            return Vec::new();
        }
        if let Some(next) = self.next_unattempted_after(self.index) {
            self.jump_to(next);
            return Vec::new();
        }
        if self.has_more {
            self.pending_next = true;
            return vec![self.fetch_page()];
        }
        self.show_toast(ToastKind::Info, MSG_NO_MORE_UNATTEMPTED);
        Vec::new()
    }

    pub fn prev(&mut self) {
        if self.index == 0 {
            return;
        }
        self.jump_to(self.index - 1);
    }

    pub fn toggle_timer(&mut self) {
        self.timer.toggle();
    }

    /// One-second tick. Returns `true` if the visible time changed.
    pub fn tick(&mut self) -> bool {
        self.timer.tick()
    }

    /// First step of a reset; the view asks the user to confirm.
    pub fn request_reset(&mut self) {
        if self.user.is_some() {
            self.reset_pending = true;
        }
    }

    pub fn cancel_reset(&mut self) {
        self.reset_pending = false;
    }

    pub fn confirm_reset(&mut self) -> Vec<QuizCommand> {
        if !std::mem::take(&mut self.reset_pending) {
            return Vec::new();
        }
        let Some(user_id) = self.user.clone() else {
            return Vec::new();
        };
        vec![QuizCommand::ResetProgress {
            user_id,
            subject: self.subject.clone(),
        }]
    }

    pub fn bookmark(&mut self) -> Vec<QuizCommand> {
        let (Some(question), Some(user_id)) = (self.current(), self.user.clone()) else {
            return Vec::new();
        };
        if self.bookmark_busy {
            return Vec::new();
        }
        let command = QuizCommand::SaveBookmark {
            user_id,
            question_id: question.id().clone(),
            subject: question.subject().clone(),
        };
        self.bookmark_busy = true;
        vec![command]
    }

    /// Change notification on the stats table.
    pub fn stats_changed(&mut self) -> Vec<QuizCommand> {
        match self.user.clone() {
            Some(user_id) => vec![self.refresh_stats_for(user_id)],
            None => Vec::new(),
        }
    }

    /// Clear the toast if it is still the one identified by `seq`.
    pub fn dismiss_toast(&mut self, seq: u64) {
        if self.toast.as_ref().is_some_and(|t| t.seq == seq) {
            self.toast = None;
        }
    }

    //
    // ─── RESULTS ───────────────────────────────────────────────────────────────
    //

    /// Fold a command result into the session and return follow-up commands.
    pub fn apply(&mut self, outcome: QuizOutcome) -> Vec<QuizCommand> {
        match outcome {
            QuizOutcome::PageLoaded { offset, result } => {
                if !self.page_in_flight || offset != self.offset {
                    tracing::debug!(offset, "ignoring stale page");
                    return Vec::new();
                }
                self.page_in_flight = false;
                match result {
                    Ok(page) => return self.on_page(page),
                    Err(message) => self.on_page_error(message),
                }
            }
            QuizOutcome::AttemptedLoaded(result) => {
                match result {
                    Ok(ids) => self.attempted.extend(ids),
                    Err(message) => self.show_toast(ToastKind::Error, message),
                }
                self.attempted_loaded = true;
            }
            QuizOutcome::QuizStateLoaded(result) => {
                match result {
                    Ok(Some(state)) => {
                        self.timer
                            .restore(state.timer_remaining_secs, state.timer_running);
                        self.resume_qid = state.current_question_id;
                    }
                    Ok(None) => {}
                    Err(message) => {
                        tracing::warn!(error = %message, "failed to load saved quiz state");
                    }
                }
                self.hydrated = true;
            }
            QuizOutcome::QuestionCount(result) => {
                self.subject_total = result.ok();
            }
            QuizOutcome::StatsRefreshed(result) => {
                let (attempted, marks) = match result {
                    Ok(Some(stat)) => (stat.attempted(), stat.marks()),
                    Ok(None) | Err(_) => (0, 0),
                };
                self.stat_attempted = attempted;
                self.stat_marks = marks;
            }
            QuizOutcome::AttemptRecorded { question_id, result } => {
                self.busy = false;
                match result {
                    Ok(()) => {
                        self.attempted.insert(question_id);
                        return self.stats_changed();
                    }
                    Err(message) => self.show_toast(ToastKind::Error, message),
                }
            }
            QuizOutcome::ProgressReset(result) => match result {
                Ok(()) => self.on_reset(),
                Err(message) => self.show_toast(ToastKind::Error, message),
            },
            QuizOutcome::BookmarkSaved(result) => {
                self.bookmark_busy = false;
                match result {
                    Ok(true) => self.show_toast(ToastKind::Info, MSG_BOOKMARKED),
                    Ok(false) => self.show_toast(ToastKind::Info, MSG_ALREADY_BOOKMARKED),
                    Err(message) => self.show_toast(ToastKind::Error, message),
                }
            }
        }
        self.settle()
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    fn on_page(&mut self, page: QuestionPage) -> Vec<QuizCommand> {
        self.load_error = None;
        self.offset = page.next_offset;
        self.has_more = page.has_more;
        let ids: Vec<QuestionId> = page.questions.iter().map(|q| q.id().clone()).collect();
        self.questions.extend(page.questions);

        let mut commands = Vec::new();
        if let Some(user_id) = &self.user {
            commands.push(QuizCommand::FetchAttempted {
                user_id: user_id.clone(),
                question_ids: ids,
            });
        }
        commands.extend(self.settle());
        commands
    }

    fn on_page_error(&mut self, message: String) {
        tracing::warn!(subject = %self.subject, error = %message, "question page failed");
        self.pending_next = false;
        // Stop chasing the target so progress saves can resume.
        if self.desired_unresolved() {
            self.jumped_to = self.desired_qid().cloned();
        }
        if !self.questions.is_empty() {
            self.show_toast(ToastKind::Error, message.clone());
        }
        self.load_error = Some(message);
    }

    fn on_reset(&mut self) {
        self.index = 0;
        self.clear_answer();
        self.stat_attempted = 0;
        self.stat_marks = 0;
        self.attempted.clear();
        self.timer.reset();
    }

    /// Re-evaluate jump and paging rules after any state change.
    fn settle(&mut self) -> Vec<QuizCommand> {
        let mut commands = Vec::new();

        if self.pending_next {
            if let Some(next) = self.next_unattempted_after(self.index) {
                self.jump_to(next);
                self.pending_next = false;
            } else if self.has_more {
                if !self.page_in_flight {
                    commands.push(self.fetch_page());
                }
            } else if !self.page_in_flight {
                self.pending_next = false;
                self.show_toast(ToastKind::Info, MSG_NO_MORE_UNATTEMPTED);
            }
        }

        if let Some(desired) = self.desired_qid().cloned() {
            if self.jumped_to.as_ref() != Some(&desired) {
                if let Some(idx) = self.questions.iter().position(|q| *q.id() == desired) {
                    self.jump_to(idx);
                    self.jumped_to = Some(desired);
                } else if self.has_more {
                    if !self.page_in_flight {
                        commands.push(self.fetch_page());
                    }
                } else if !self.page_in_flight {
                    tracing::debug!(question = %desired, "resume target not in subject");
                    self.jumped_to = Some(desired);
                }
            }
        } else if self.user.is_some()
            && self.hydrated
            && !self.initial_start_done
            && !self.questions.is_empty()
            && self.attempted_loaded
        {
            if let Some(first) = self
                .questions
                .iter()
                .position(|q| !self.attempted.contains(q.id()))
            {
                if first != self.index {
                    self.jump_to(first);
                }
            }
            self.initial_start_done = true;
        }

        commands
    }

    fn desired_qid(&self) -> Option<&QuestionId> {
        self.target_qid.as_ref().or(self.resume_qid.as_ref())
    }

    fn desired_unresolved(&self) -> bool {
        self.desired_qid()
            .is_some_and(|d| self.jumped_to.as_ref() != Some(d))
    }

    fn next_unattempted_after(&self, index: usize) -> Option<usize> {
        self.questions
            .iter()
            .enumerate()
            .skip(index + 1)
            .find(|(_, q)| !self.attempted.contains(q.id()))
            .map(|(i, _)| i)
    }

    fn jump_to(&mut self, index: usize) {
        self.index = index;
        self.clear_answer();
    }

    fn clear_answer(&mut self) {
        self.selected.clear();
        self.revealed = false;
    }

    fn fetch_page(&mut self) -> QuizCommand {
        self.page_in_flight = true;
        QuizCommand::FetchPage {
            subject: self.subject.clone(),
            offset: self.offset,
            page_size: self.page_size,
        }
    }

    fn refresh_stats_for(&self, user_id: UserId) -> QuizCommand {
        QuizCommand::RefreshStats {
            user_id,
            subject: self.subject.clone(),
        }
    }

    fn show_toast(&mut self, kind: ToastKind, message: impl Into<String>) {
        self.toast_seq += 1;
        self.toast = Some(Toast {
            kind,
            message: message.into(),
            seq: self.toast_seq,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::QuestionDraft;

    fn question(id: &str) -> Question {
        QuestionDraft {
            id: id.into(),
            text: Some(format!("Question {id}")),
            options: Some(vec!["a".into(), "b".into(), "c".into(), "d".into()]),
            correct_indices: Some(vec![1]),
            subject: Some("Anatomy".into()),
            ..QuestionDraft::default()
        }
        .normalize()
        .unwrap()
    }

    fn page(ids: &[&str], next_offset: u32, has_more: bool) -> QuestionPage {
        QuestionPage {
            questions: ids.iter().map(|id| question(id)).collect(),
            next_offset,
            has_more,
        }
    }

    fn qid(id: &str) -> QuestionId {
        QuestionId::new(id).unwrap()
    }

    fn user() -> UserId {
        UserId::new("u1").unwrap()
    }

    fn signed_in(target: Option<&str>) -> QuizSession {
        QuizSession::new(Subject::new("Anatomy"), Some(user()), target.map(qid)).with_page_size(2)
    }

    /// Start, deliver an empty saved state, the first page and its attempted set.
    fn ready(attempted: &[&str]) -> QuizSession {
        let mut s = signed_in(None);
        s.start();
        s.apply(QuizOutcome::QuizStateLoaded(Ok(None)));
        s.apply(QuizOutcome::PageLoaded {
            offset: 0,
            result: Ok(page(&["q1", "q2"], 2, true)),
        });
        s.apply(QuizOutcome::AttemptedLoaded(Ok(attempted.iter().map(|i| qid(i)).collect())));
        s
    }

    #[test]
    fn start_requests_page_count_state_and_stats() {
        let mut s = signed_in(None);
        assert_eq!(s.phase(), Phase::Idle);
        let commands = s.start();
        assert_eq!(commands.len(), 4);
        assert!(matches!(commands[0], QuizCommand::FetchPage { offset: 0, page_size: 2, .. }));
        assert_eq!(s.phase(), Phase::Loading);
        assert!(s.start().is_empty());
    }

    #[test]
    fn initial_start_jumps_to_first_unattempted_once() {
        let s = ready(&["q1"]);
        assert_eq!(s.phase(), Phase::Ready);
        assert_eq!(s.current().unwrap().id(), &qid("q2"));

        let mut s = s;
        s.prev();
        assert_eq!(s.index(), 0);
        s.apply(QuizOutcome::AttemptedLoaded(Ok(HashSet::new())));
        assert_eq!(s.index(), 0, "latch prevents a second jump");
    }

    #[test]
    fn answer_reveals_before_backend_and_keeps_reveal_on_failure() {
        let mut s = ready(&[]);
        let commands = s.select_option(1);
        assert!(matches!(
            &commands[..],
            [QuizCommand::RecordAttempt { is_correct: true, .. }]
        ));
        assert!(s.is_revealed() && s.is_busy() && s.is_correct());
        assert!(s.select_option(2).is_empty());

        s.apply(QuizOutcome::AttemptRecorded {
            question_id: qid("q1"),
            result: Err("network down".into()),
        });
        assert!(s.is_revealed());
        assert!(!s.is_busy());
        assert_eq!(s.toast().unwrap().kind, ToastKind::Error);
        assert_eq!(s.toast().unwrap().message, "network down");
    }

    #[test]
    fn successful_answer_marks_attempted_and_refreshes_stats() {
        let mut s = ready(&[]);
        s.select_option(0);
        let follow = s.apply(QuizOutcome::AttemptRecorded {
            question_id: qid("q1"),
            result: Ok(()),
        });
        assert!(matches!(&follow[..], [QuizCommand::RefreshStats { .. }]));
        assert!(s.is_attempted(&qid("q1")));
        assert!(!s.is_correct());
    }

    #[test]
    fn rejections_show_toasts() {
        let mut s = signed_in(None);
        s.start();
        s.apply(QuizOutcome::PageLoaded {
            offset: 0,
            result: Ok(page(&["q1"], 1, false)),
        });
        assert!(s.select_option(0).is_empty());
        assert_eq!(s.toast().unwrap().message, MSG_LOADING_PROGRESS);

        let mut s = ready(&[]);
        s.prev();
        s.apply(QuizOutcome::AttemptedLoaded(Ok([qid("q1")].into_iter().collect())));
        assert!(s.select_option(0).is_empty());
        assert_eq!(s.toast().unwrap().message, MSG_ALREADY_ATTEMPTED);

        let mut s = QuizSession::new(Subject::new("Anatomy"), None, None);
        s.start();
        s.apply(QuizOutcome::PageLoaded {
            offset: 0,
            result: Ok(page(&["q1"], 1, false)),
        });
        s.apply(QuizOutcome::AttemptedLoaded(Ok(HashSet::new())));
        assert!(s.select_option(0).is_empty());
        assert_eq!(s.toast().unwrap().message, "Please login again");
    }

    #[test]
    fn next_pages_forward_and_auto_advances() {
        let mut s = ready(&[]);
        assert!(s.next().is_empty());
        assert_eq!(s.index(), 1);

        let commands = s.next();
        assert!(matches!(&commands[..], [QuizCommand::FetchPage { offset: 2, .. }]));
        assert_eq!(s.phase(), Phase::Advancing);

        s.apply(QuizOutcome::PageLoaded {
            offset: 2,
            result: Ok(page(&["q3", "q4"], 4, false)),
        });
        assert_eq!(s.index(), 2);
        assert_eq!(s.phase(), Phase::Ready);
    }

    #[test]
    fn next_with_no_more_pages_shows_info() {
        let mut s = signed_in(None);
        s.start();
        s.apply(QuizOutcome::QuizStateLoaded(Ok(None)));
        s.apply(QuizOutcome::PageLoaded {
            offset: 0,
            result: Ok(page(&["q1"], 1, false)),
        });
        assert!(s.next().is_empty());
        let toast = s.toast().unwrap();
        assert_eq!(toast.kind, ToastKind::Info);
        assert_eq!(toast.message, MSG_NO_MORE_UNATTEMPTED);

        let seq = toast.seq;
        s.dismiss_toast(seq + 1);
        assert!(s.toast().is_some());
        s.dismiss_toast(seq);
        assert!(s.toast().is_none());
    }

    #[test]
    fn resume_pages_until_saved_question_then_stops() {
        let mut s = signed_in(None);
        s.start();
        s.apply(QuizOutcome::QuizStateLoaded(Ok(Some(QuizState::new(
            Subject::new("Anatomy"),
            Some(qid("q5")),
            300,
            true,
        )))));
        assert_eq!(s.timer().remaining_secs(), 300);
        assert!(s.timer().is_running());

        let follow = s.apply(QuizOutcome::PageLoaded {
            offset: 0,
            result: Ok(page(&["q1", "q2"], 2, true)),
        });
        assert!(follow.iter().any(|c| matches!(c, QuizCommand::FetchPage { offset: 2, .. })));
        assert_eq!(s.phase(), Phase::Resuming);
        assert!(s.snapshot().is_none());

        let follow = s.apply(QuizOutcome::PageLoaded {
            offset: 2,
            result: Ok(page(&["q3", "q4"], 4, true)),
        });
        assert!(follow.iter().any(|c| matches!(c, QuizCommand::FetchPage { offset: 4, .. })));

        let follow = s.apply(QuizOutcome::PageLoaded {
            offset: 4,
            result: Ok(page(&["q5", "q6"], 6, true)),
        });
        assert!(!follow.iter().any(|c| matches!(c, QuizCommand::FetchPage { .. })));
        assert_eq!(s.current().unwrap().id(), &qid("q5"));
        assert_eq!(s.phase(), Phase::Ready);
        assert_eq!(s.snapshot().unwrap().current_question_id, Some(qid("q5")));
    }

    #[test]
    fn explicit_target_beats_saved_position() {
        let mut s = signed_in(Some("q2"));
        s.start();
        s.apply(QuizOutcome::PageLoaded {
            offset: 0,
            result: Ok(page(&["q1", "q2"], 2, true)),
        });
        s.apply(QuizOutcome::QuizStateLoaded(Ok(Some(QuizState::new(
            Subject::new("Anatomy"),
            Some(qid("q1")),
            0,
            false,
        )))));
        assert_eq!(s.current().unwrap().id(), &qid("q2"));
        assert_eq!(s.snapshot().unwrap().current_question_id, Some(qid("q2")));
    }

    #[test]
    fn page_error_gives_up_on_target() {
        let mut s = signed_in(Some("missing"));
        s.start();
        s.apply(QuizOutcome::QuizStateLoaded(Ok(None)));
        s.apply(QuizOutcome::PageLoaded {
            offset: 0,
            result: Ok(page(&["q1", "q2"], 2, true)),
        });
        s.apply(QuizOutcome::PageLoaded {
            offset: 2,
            result: Err("boom".into()),
        });
        assert_eq!(s.phase(), Phase::Ready);
        assert_eq!(s.toast().unwrap().message, "boom");
        assert!(s.blocking_error().is_none());
        assert!(s.snapshot().is_some());
    }

    #[test]
    fn first_page_error_blocks() {
        let mut s = signed_in(None);
        s.start();
        s.apply(QuizOutcome::PageLoaded {
            offset: 0,
            result: Err("configuration missing".into()),
        });
        assert_eq!(s.blocking_error(), Some("configuration missing"));
        assert!(s.toast().is_none());
    }

    #[test]
    fn stale_page_results_are_ignored() {
        let mut s = ready(&[]);
        let before = s.questions().len();
        s.apply(QuizOutcome::PageLoaded {
            offset: 0,
            result: Ok(page(&["x"], 1, false)),
        });
        assert_eq!(s.questions().len(), before);
    }

    #[test]
    fn reset_needs_confirmation_and_restores_defaults() {
        let mut s = ready(&["q1"]);
        s.toggle_timer();
        s.tick();
        assert!(s.confirm_reset().is_empty());

        s.request_reset();
        let commands = s.confirm_reset();
        assert!(matches!(&commands[..], [QuizCommand::ResetProgress { .. }]));

        s.apply(QuizOutcome::ProgressReset(Ok(())));
        assert_eq!(s.index(), 0);
        assert!(!s.is_attempted(&qid("q1")));
        assert_eq!(s.timer().remaining_secs(), 1200);
        assert!(!s.timer().is_running());
        assert_eq!(s.header().attempted, 0);
    }

    #[test]
    fn bookmark_toasts() {
        let mut s = ready(&[]);
        assert_eq!(s.bookmark().len(), 1);
        assert!(s.bookmark().is_empty(), "busy while saving");
        s.apply(QuizOutcome::BookmarkSaved(Ok(true)));
        assert_eq!(s.toast().unwrap().message, MSG_BOOKMARKED);
        s.bookmark();
        s.apply(QuizOutcome::BookmarkSaved(Ok(false)));
        assert_eq!(s.toast().unwrap().message, MSG_ALREADY_BOOKMARKED);
    }

    #[test]
    fn header_shows_score_and_end_hint() {
        let mut s = ready(&[]);
        s.apply(QuizOutcome::QuestionCount(Ok(100)));
        s.apply(QuizOutcome::StatsRefreshed(Ok(Some(
            SubjectStat::from_persisted(Subject::new("Anatomy"), 3, 2, 1, 10).unwrap(),
        ))));
        let header = s.header();
        assert_eq!(header.position, 1);
        assert_eq!(header.position_of, 100);
        assert_eq!(header.marks, 10);
        assert_eq!(header.score_text.as_deref(), Some("2.5%"));
        assert_eq!(header.timer_text, "20:00");
        assert!(s.near_loaded_end());

        s.apply(QuizOutcome::QuestionCount(Err("x".into())));
        assert_eq!(s.header().score_text, None);
        assert_eq!(s.header().position_of, 2);
    }

    #[test]
    fn snapshot_waits_for_hydration() {
        let mut s = signed_in(None);
        s.start();
        s.apply(QuizOutcome::PageLoaded {
            offset: 0,
            result: Ok(page(&["q1"], 1, false)),
        });
        assert!(s.snapshot().is_none());
        s.apply(QuizOutcome::QuizStateLoaded(Err("offline".into())));
        let snap = s.snapshot().unwrap();
        assert_eq!(snap.subject, Subject::new("Anatomy"));
        assert_eq!(snap.timer_remaining_secs, 1200);
    }
}
