//! Paginated access to the question catalog.

use std::sync::Arc;

use quiz_core::model::{Question, Subject};
use storage::Gateway;

use crate::error::CatalogError;

/// Questions requested per page by the quiz screen.
pub const DEFAULT_PAGE_SIZE: u32 = 15;

/// One page of normalized questions.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionPage {
    pub questions: Vec<Question>,
    /// Offset to request next: the given offset plus the rows this page consumed.
    pub next_offset: u32,
    pub has_more: bool,
}

pub struct QuestionCatalogService {
    gateway: Arc<Gateway>,
}

impl QuestionCatalogService {
    #[must_use]
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Fetch up to `page_size` questions for `subject`, newest first.
    ///
    /// One extra row is requested to learn whether another page exists. Rows
    /// that cannot be normalized are skipped but still advance the offset.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Gateway` when no backend is configured, or
    /// `CatalogError::Storage` with the backend's message.
    pub async fn fetch_questions_page(
        &self,
        subject: &Subject,
        page_size: u32,
        offset: u32,
    ) -> Result<QuestionPage, CatalogError> {
        let storage = self.gateway.storage()?;
        let page_size = page_size.max(1);
        let stored = subject.storage_name();
        tracing::debug!(subject = stored, offset, page_size, "fetching question page");

        let mut rows = storage
            .questions
            .list_questions(stored, offset, page_size.saturating_add(1))
            .await?;
        let has_more = rows.len() > page_size as usize;
        rows.truncate(page_size as usize);
        let consumed = u32::try_from(rows.len()).unwrap_or(page_size);

        let questions = rows
            .into_iter()
            .filter_map(|draft| {
                let id = draft.id.clone();
                let unusable = draft.unusable_indices();
                if !unusable.is_empty() {
                    tracing::warn!(id, ?unusable, "dropping unusable correct indices");
                }
                match draft.normalize() {
                    Ok(question) => Some(question),
                    Err(err) => {
                        tracing::warn!(id, error = %err, "skipping malformed question row");
                        None
                    }
                }
            })
            .collect();

        Ok(QuestionPage {
            questions,
            next_offset: offset.saturating_add(consumed),
            has_more,
        })
    }

    /// Exact number of questions stored for `subject`; 0 when there are none.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on missing configuration or backend failure.
    pub async fn fetch_subject_question_count(&self, subject: &Subject) -> Result<u64, CatalogError> {
        let storage = self.gateway.storage()?;
        Ok(storage
            .questions
            .count_questions(subject.storage_name())
            .await?)
    }
}
