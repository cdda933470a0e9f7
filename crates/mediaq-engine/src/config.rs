//! Engine configuration.

use std::time::Duration;

use crate::error::{EngineError, EngineResult};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Workers kept alive even when the queue is empty
    pub min_workers: usize,
    /// Hard ceiling on concurrently live workers
    pub max_workers: usize,
    /// Queue depth at which one worker is added per evaluation tick
    pub scale_up_threshold: usize,
    /// Queue depth below which one idle worker is retired per tick
    pub scale_down_threshold: usize,
    /// How often the autoscaler evaluates queue depth
    pub scale_interval: Duration,
    /// Bounded wait of a single dequeue attempt; workers re-check
    /// shutdown signals between waits
    pub dequeue_wait: Duration,
    /// How many terminal jobs to retain for status lookup
    pub max_history: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_workers: 2,
            max_workers: 8,
            scale_up_threshold: 4,
            scale_down_threshold: 2,
            scale_interval: Duration::from_secs(2),
            dequeue_wait: Duration::from_millis(500),
            max_history: 1024,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            min_workers: std::env::var("MEDIAQ_MIN_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            max_workers: std::env::var("MEDIAQ_MAX_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8),
            scale_up_threshold: std::env::var("MEDIAQ_SCALE_UP_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
            scale_down_threshold: std::env::var("MEDIAQ_SCALE_DOWN_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            scale_interval: Duration::from_millis(
                std::env::var("MEDIAQ_SCALE_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
            dequeue_wait: Duration::from_millis(
                std::env::var("MEDIAQ_DEQUEUE_WAIT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
            max_history: std::env::var("MEDIAQ_MAX_HISTORY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024),
        }
    }

    /// Check invariants between the pool bounds and thresholds.
    pub fn validate(&self) -> EngineResult<()> {
        if self.min_workers == 0 {
            return Err(EngineError::config("min_workers must be at least 1"));
        }
        if self.max_workers < self.min_workers {
            return Err(EngineError::config(
                "max_workers must not be below min_workers",
            ));
        }
        if self.scale_down_threshold > self.scale_up_threshold {
            return Err(EngineError::config(
                "scale_down_threshold must not exceed scale_up_threshold",
            ));
        }
        if self.scale_interval.is_zero() || self.dequeue_wait.is_zero() {
            return Err(EngineError::config(
                "scale_interval and dequeue_wait must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let config = EngineConfig {
            min_workers: 4,
            max_workers: 2,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            min_workers: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            scale_up_threshold: 1,
            scale_down_threshold: 3,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
