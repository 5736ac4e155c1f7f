use thiserror::Error;

use crate::model::{ParseIdError, QuestionError, StatError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Id(#[from] ParseIdError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Stat(#[from] StatError),
}
