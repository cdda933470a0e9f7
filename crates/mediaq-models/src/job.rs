//! Job definitions and lifecycle state.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduling priority of a job.
///
/// Higher priority always dequeues first; within one level jobs
/// dequeue in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

impl JobPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPriority::Critical => "critical",
            JobPriority::High => "high",
            JobPriority::Normal => "normal",
            JobPriority::Low => "low",
        }
    }

    /// Numeric rank used for queue ordering (higher dequeues first).
    pub fn rank(&self) -> u8 {
        match self {
            JobPriority::Critical => 3,
            JobPriority::High => 2,
            JobPriority::Normal => 1,
            JobPriority::Low => 0,
        }
    }
}

impl Ord for JobPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for JobPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for JobPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting in the queue
    #[default]
    Pending,
    /// Job is being executed by a worker
    Running,
    /// Job completed successfully
    Completed,
    /// Job failed with an error
    Failed,
    /// Job was cancelled before execution
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state (no more transitions occur).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured failure recorded on a job, populated only on Failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobError {
    /// The external tool could not be launched.
    #[error("failed to spawn external tool: {message}")]
    Spawn { message: String },

    /// Execution exceeded the job's timeout; the process was killed.
    #[error("execution timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The external tool exited with a non-zero status.
    #[error("external tool exited with code {exit_code}: {stderr}")]
    Tool { exit_code: i32, stderr: String },
}

impl JobError {
    /// Short tag for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Spawn { .. } => "spawn",
            JobError::Timeout { .. } => "timeout",
            JobError::Tool { .. } => "tool",
        }
    }
}

/// Submission parameters for a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Work type tag (e.g. "transcode", "thumbnail")
    pub kind: String,
    /// Source location
    pub input_path: String,
    /// Destination location
    pub output_path: String,
    /// Full argv for the external tool (program first)
    pub command_args: Vec<String>,
    /// Scheduling priority
    #[serde(default)]
    pub priority: JobPriority,
    /// Maximum wall-clock execution time
    pub timeout: Duration,
    /// Opaque caller-supplied key/value pairs, never interpreted
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl JobSpec {
    /// Create a new job spec with default priority and a 10 minute timeout.
    pub fn new(
        kind: impl Into<String>,
        input_path: impl Into<String>,
        output_path: impl Into<String>,
        command_args: Vec<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            input_path: input_path.into(),
            output_path: output_path.into(),
            command_args,
            priority: JobPriority::default(),
            timeout: Duration::from_secs(600),
            metadata: HashMap::new(),
        }
    }

    /// Set priority.
    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One unit of media-processing work tracked through its lifecycle.
///
/// Identity fields are immutable after submission; lifecycle fields are
/// mutated only through the transition methods below, each of which sets
/// its timestamp exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,
    /// Work type tag
    pub kind: String,
    /// Source location
    pub input_path: String,
    /// Destination location
    pub output_path: String,
    /// Full argv for the external tool
    pub command_args: Vec<String>,
    /// Scheduling priority
    pub priority: JobPriority,
    /// Maximum wall-clock execution time
    pub timeout: Duration,
    /// Current lifecycle state
    pub status: JobStatus,
    /// When the job was submitted
    pub created_at: DateTime<Utc>,
    /// When a worker started executing the job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure detail, present only on Failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    /// Opaque caller-supplied key/value pairs
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Job {
    /// Create a new pending job from submission parameters.
    pub fn new(spec: JobSpec) -> Self {
        Self {
            id: JobId::new(),
            kind: spec.kind,
            input_path: spec.input_path,
            output_path: spec.output_path,
            command_args: spec.command_args,
            priority: spec.priority,
            timeout: spec.timeout,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            metadata: spec.metadata,
        }
    }

    /// Transition Pending -> Running and stamp `started_at`.
    pub fn start(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Transition Running -> Completed and stamp `completed_at`.
    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Transition Running -> Failed with the failure detail.
    pub fn fail(&mut self, error: JobError) {
        self.status = JobStatus::Failed;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
    }

    /// Transition Pending -> Cancelled.
    pub fn cancel(&mut self) {
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Execution duration, available once the job ran to a terminal state.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => (end - start).to_std().ok(),
            _ => None,
        }
    }
}
