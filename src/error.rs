use thiserror::Error;

use crate::workflow::FieldErrors;

/// Recoverable domain errors. Storage failures are not represented here:
/// the store logs them and carries on in session-only mode.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Job '{0}' not found")]
    NotFound(String),

    #[error("You have already applied to job '{0}'")]
    AlreadyApplied(String),

    #[error("Please fix the following: {0}")]
    Validation(FieldErrors),

    #[error("Submission failed, please try again")]
    SubmissionFailed,

    #[error("Invalid transition: {0}")]
    InvalidTransition(&'static str),
}
