use quiz_core::model::{QuestionKind, option_letter};
use services::quiz::{QuizCommand, QuizHeader, QuizSession};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuizIntent {
    Select(u32),
    Next,
    Prev,
    ToggleTimer,
    Bookmark,
    RequestReset,
    ConfirmReset,
    CancelReset,
}

/// Feed one user action into the session; returns the backend work it needs.
pub fn apply_intent(session: &mut QuizSession, intent: QuizIntent) -> Vec<QuizCommand> {
    match intent {
        QuizIntent::Select(option) => session.select_option(option),
        QuizIntent::Next => session.next(),
        QuizIntent::Prev => {
            session.prev();
            Vec::new()
        }
        QuizIntent::ToggleTimer => {
            session.toggle_timer();
            Vec::new()
        }
        QuizIntent::Bookmark => session.bookmark(),
        QuizIntent::RequestReset => {
            session.request_reset();
            Vec::new()
        }
        QuizIntent::ConfirmReset => session.confirm_reset(),
        QuizIntent::CancelReset => {
            session.cancel_reset();
            Vec::new()
        }
    }
}

/// Keyboard shortcuts: `1`..`9` or `a`..`z` pick an option, arrows move.
/// `key` is the key's display name (`"ArrowRight"`, `"b"`, ...).
#[must_use]
pub fn intent_for_key(key: &str, option_count: usize) -> Option<QuizIntent> {
    match key {
        "ArrowRight" => return Some(QuizIntent::Next),
        "ArrowLeft" => return Some(QuizIntent::Prev),
        _ => {}
    }
    let mut chars = key.chars();
    let (Some(ch), None) = (chars.next(), chars.next()) else {
        return None;
    };
    let index = match ch {
        '1'..='9' => u32::from(ch) - u32::from('1'),
        'a'..='z' => u32::from(ch) - u32::from('a'),
        'A'..='Z' => u32::from(ch) - u32::from('A'),
        _ => return None,
    };
    usize::try_from(index)
        .is_ok_and(|i| i < option_count)
        .then_some(QuizIntent::Select(index))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionState {
    Idle,
    /// The picked option, and it is right.
    Correct,
    /// The picked option, and it is wrong.
    Wrong,
    /// A right option the user did not pick.
    Answer,
}

impl OptionState {
    #[must_use]
    pub fn css_class(self) -> &'static str {
        match self {
            OptionState::Idle => "quiz-option",
            OptionState::Correct => "quiz-option quiz-option--correct",
            OptionState::Wrong => "quiz-option quiz-option--wrong",
            OptionState::Answer => "quiz-option quiz-option--answer",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionVm {
    pub index: u32,
    pub letter: char,
    pub text: String,
    pub state: OptionState,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuestionVm {
    pub id: String,
    pub text: String,
    pub multi_hint: Option<&'static str>,
    pub options: Vec<OptionVm>,
    pub locked: bool,
    pub verdict: Option<&'static str>,
    pub explanation: Option<String>,
}

/// The current question as the view draws it. Answers show once the
/// question is revealed here or was attempted before.
#[must_use]
pub fn map_question(session: &QuizSession) -> Option<QuestionVm> {
    let question = session.current()?;
    let revealed = session.is_revealed();
    let show_answers = revealed || session.is_attempted(question.id());
    let selected = session.selected();

    let options = question
        .options()
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let index = u32::try_from(i).unwrap_or(u32::MAX);
            let picked = revealed && selected.contains(&index);
            let correct = question.is_correct_option(index);
            let state = match (show_answers, picked, correct) {
                (false, _, _) => OptionState::Idle,
                (true, true, true) => OptionState::Correct,
                (true, true, false) => OptionState::Wrong,
                (true, false, true) => OptionState::Answer,
                (true, false, false) => OptionState::Idle,
            };
            OptionVm {
                index,
                letter: option_letter(i),
                text: text.clone(),
                state,
            }
        })
        .collect();

    let verdict = revealed.then(|| {
        if session.is_correct() {
            "Correct"
        } else {
            "Incorrect"
        }
    });
    let explanation = (show_answers && !question.explanation().is_empty())
        .then(|| question.explanation().to_owned());

    Some(QuestionVm {
        id: question.id().as_str().to_owned(),
        text: question.text().to_owned(),
        multi_hint: (question.kind() == QuestionKind::Multi).then_some("More than one option is correct"),
        options,
        locked: session.options_locked(),
        verdict,
        explanation,
    })
}

#[must_use]
pub fn position_label(header: &QuizHeader) -> String {
    format!("Question {} of {}", header.position, header.position_of)
}

#[must_use]
pub fn progress_label(header: &QuizHeader) -> String {
    let score = header.score_text.as_deref().unwrap_or("...");
    format!(
        "Attempted: {} | Marks: {} | Score: {score}",
        header.attempted, header.marks
    )
}

#[must_use]
pub fn loaded_label(header: &QuizHeader) -> String {
    match header.total {
        Some(total) => format!("Loaded {} of {total}", header.loaded),
        None => format!("Loaded {}", header.loaded),
    }
}
