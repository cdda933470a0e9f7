//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Invalid submission parameters; the job was never created.
    #[error("invalid job: {0}")]
    InvalidJob(String),

    /// No job with this ID is live or retained.
    #[error("job not found: {0}")]
    NotFound(String),

    /// The queue was closed by shutdown; no new jobs may be submitted.
    #[error("queue is closed")]
    Closed,
}

impl QueueError {
    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJob(msg.into())
    }

    pub fn not_found(id: impl ToString) -> Self {
        Self::NotFound(id.to_string())
    }
}
