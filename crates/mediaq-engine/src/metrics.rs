//! Prometheus-facing metrics helpers.
//!
//! Independent of the [`EngineMetrics`](mediaq_models::EngineMetrics)
//! snapshot: these feed an embedding service's scrape endpoint.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "mediaq_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "mediaq_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "mediaq_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "mediaq_job_duration_seconds";
    pub const QUEUE_DEPTH: &str = "mediaq_queue_depth";
    pub const WORKERS_ACTIVE: &str = "mediaq_workers_active";
}

/// Record job submitted.
pub fn record_job_submitted(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_SUBMITTED_TOTAL, &labels).increment(1);
}

/// Record job completed.
pub fn record_job_completed(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
}

/// Record job failed.
pub fn record_job_failed(kind: &str, error_kind: &str) {
    let labels = [
        ("kind", kind.to_string()),
        ("error", error_kind.to_string()),
    ];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

/// Record execution duration of a finished job.
pub fn record_job_duration(kind: &str, duration_secs: f64) {
    let labels = [("kind", kind.to_string())];
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Update queue depth gauge.
pub fn set_queue_depth(depth: usize) {
    gauge!(names::QUEUE_DEPTH).set(depth as f64);
}

/// Update active workers gauge.
pub fn set_active_workers(count: usize) {
    gauge!(names::WORKERS_ACTIVE).set(count as f64);
}
