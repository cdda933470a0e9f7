//! In-memory priority job queue and job record store.

mod error;
mod queue;

pub use error::{QueueError, QueueResult};
pub use queue::{JobQueue, QueueConfig, QueueStats};
