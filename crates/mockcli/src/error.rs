//! Harness errors.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the harness itself, never by the program under test.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Another capture session is active in this process.
    #[error("Mock CLI already active")]
    AlreadyActive,

    /// The session already finished; its result went to the completion
    /// callback or the value returned from `run`.
    #[error("capture session {0} has already finished")]
    SessionClosed(Uuid),

    #[error("invalid activation parameters: {0}")]
    InvalidParameters(String),
}
