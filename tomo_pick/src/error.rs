//! Error taxonomy shared across the crate.

use thiserror::Error;

/// Convenience alias used by every fallible operation in the crate.
pub type Result<T> = std::result::Result<T, PickError>;

/// Failure modes of the picking engine.
///
/// Validation and reference failures are data-integrity errors and are
/// surfaced to the caller immediately; they are never clamped or papered
/// over with blank values. I/O-shaped failures carry a reason string the
/// shell can show the user before deciding whether to retry with another
/// path.
#[derive(Debug, Error)]
pub enum PickError {
    /// Out-of-range index, negative uncertainty, malformed row and the like.
    #[error("validation: {0}")]
    Validation(String),

    /// An operation needed a loaded survey but none is selected.
    #[error("no active survey")]
    NoActiveSurvey,

    /// A mog's before/after air-shot index points outside the loaded
    /// air-shot sequence.
    #[error("dangling air-shot reference: {0}")]
    Reference(String),

    /// The session file did not unpack into the expected structure.
    #[error("corrupt session file: {0}")]
    CorruptSession(String),

    /// Pick import file missing after the bounded extension retries.
    #[error("import file not found: {0}")]
    ImportFileNotFound(String),

    /// No trace satisfied the search, e.g. every trace is already reviewed.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PickError {
    /// Validation error with a formatted reason.
    pub fn validation(reason: impl Into<String>) -> Self {
        PickError::Validation(reason.into())
    }
}
