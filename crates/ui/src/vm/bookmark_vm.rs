use quiz_core::model::{Bookmark, Subject};

use super::time_fmt::format_datetime;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookmarkVm {
    pub question_id: String,
    /// Dashboard name, used to open the quiz on this question.
    pub subject: String,
    pub text: String,
    pub saved_at: Option<String>,
}

#[must_use]
pub fn map_bookmarks(items: &[Bookmark]) -> Vec<BookmarkVm> {
    items
        .iter()
        .map(|item| BookmarkVm {
            question_id: item.question_id.as_str().to_owned(),
            subject: Subject::from_storage_name(item.subject.as_str())
                .as_str()
                .to_owned(),
            text: item.text.clone(),
            saved_at: item.saved_at.map(format_datetime),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::QuestionId;
    use quiz_core::time::fixed_now;

    #[test]
    fn stored_subject_maps_to_display_name() {
        let items = [
            Bookmark {
                question_id: QuestionId::new("q1").unwrap(),
                subject: Subject::new("Skin"),
                text: "Psoriasis plaques".into(),
                saved_at: Some(fixed_now()),
            },
            Bookmark {
                question_id: QuestionId::new("q2").unwrap(),
                subject: Subject::new("Anatomy"),
                text: "-".into(),
                saved_at: None,
            },
        ];
        let vms = map_bookmarks(&items);
        assert_eq!(vms[0].subject, "Dermatology");
        assert_eq!(vms[0].saved_at.as_deref(), Some("2023-11-14 22:13 UTC"));
        assert_eq!(vms[1].text, "-");
        assert_eq!(vms[1].saved_at, None);
    }
}
