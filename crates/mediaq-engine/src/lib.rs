//! Media job scheduling and execution engine.
//!
//! A single-process, in-memory scheduler: callers submit media-processing
//! jobs (transcode, thumbnail extraction), an autoscaling pool of workers
//! executes them through an external command-line tool with per-job
//! timeouts, and results are polled through job status lookups.

pub mod builders;
mod config;
mod engine;
mod error;
mod logging;
pub mod metrics;
mod pool;
mod runner;
mod worker;

pub use config::EngineConfig;
pub use logging::init_logging;
pub use engine::MediaEngine;
pub use error::{EngineError, EngineResult};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner, RunnerError};

pub use mediaq_models::{EngineMetrics, Job, JobError, JobId, JobPriority, JobSpec, JobStatus};
pub use mediaq_queue::QueueError;
