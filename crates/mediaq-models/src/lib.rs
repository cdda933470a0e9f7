//! Shared data models for the MediaQ job engine.

mod job;
mod metrics;

pub use job::{Job, JobError, JobId, JobPriority, JobSpec, JobStatus};
pub use metrics::EngineMetrics;
