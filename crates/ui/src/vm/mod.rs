mod bookmark_vm;
mod dashboard_vm;
mod prepdna_vm;
mod quiz_vm;
mod time_fmt;

pub use bookmark_vm::{BookmarkVm, map_bookmarks};
pub use dashboard_vm::{PENDING_LABEL, SubjectCardVm, map_subject_cards};
pub use prepdna_vm::{OverallVm, PrepDnaRowVm, PrepDnaVm, map_prep_dna};
pub use quiz_vm::{
    OptionState, OptionVm, QuestionVm, QuizIntent, apply_intent, intent_for_key, loaded_label,
    map_question, position_label, progress_label,
};
pub use time_fmt::format_datetime;
