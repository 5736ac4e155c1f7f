mod attempt;
mod bookmark;
mod ids;
mod preferences;
mod question;
mod quiz_state;
mod stats;
pub mod subject;

pub use attempt::Attempt;
pub use bookmark::{BOOKMARK_TEXT_FALLBACK, Bookmark};
pub use ids::{ParseIdError, QuestionId, UserId};
pub use preferences::{ThemePreference, THEME_PREFERENCE_KEY};
pub use question::{Question, QuestionDraft, QuestionError, QuestionKind, option_letter};
pub use quiz_state::{DEFAULT_TIMER_SECS, QuizState};
pub use stats::{StatError, StatsAccumulator, SubjectStat};
pub use subject::{SUBJECTS, Subject, all_subjects, filter_subjects};
