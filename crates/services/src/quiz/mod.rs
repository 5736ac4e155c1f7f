mod runner;
mod saver;
mod session;
mod timer;

// Public API of the quiz subsystem.
pub use runner::QuizRunner;
pub use saver::{QuizStateSaver, SAVE_DEBOUNCE};
pub use session::{
    MSG_ALREADY_ATTEMPTED, MSG_ALREADY_BOOKMARKED, MSG_BOOKMARKED, MSG_LOADING_PROGRESS,
    MSG_NO_MORE_UNATTEMPTED, Phase, QuizCommand, QuizHeader, QuizOutcome, QuizSession,
    RESET_CONFIRM_PROMPT, TOAST_DURATION, Toast, ToastKind,
};
pub use timer::{Countdown, format_mm_ss};
