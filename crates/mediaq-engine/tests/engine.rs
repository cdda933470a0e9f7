//! End-to-end engine tests using a fake command runner, so no real
//! external binaries are spawned (except the timeout test, which drives
//! a real `sleep`).

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use mediaq_engine::{
    CommandOutput, CommandRunner, EngineConfig, EngineError, JobError, JobId, JobPriority,
    JobSpec, JobStatus, MediaEngine, QueueError, RunnerError,
};

/// Scriptable runner: the first argv token selects the behavior.
///
/// - `ok` — exit 0
/// - `fail` — exit 1 with stderr
/// - `sleep <ms>` — wait, then exit 0
/// - `spawn-err` — spawn failure
#[derive(Default)]
struct FakeRunner {
    log: Mutex<Vec<Vec<String>>>,
}

impl FakeRunner {
    fn executed(&self) -> Vec<Vec<String>> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn execute(
        &self,
        command_args: &[String],
        _timeout: Duration,
    ) -> Result<CommandOutput, RunnerError> {
        self.log.lock().unwrap().push(command_args.to_vec());
        match command_args[0].as_str() {
            "fail" => Ok(CommandOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: "synthetic failure".to_string(),
            }),
            "sleep" => {
                let ms: u64 = command_args[1].parse().unwrap();
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(ok_output())
            }
            "spawn-err" => Err(RunnerError::Spawn {
                command: "spawn-err".to_string(),
                message: "no such file or directory".to_string(),
            }),
            _ => Ok(ok_output()),
        }
    }
}

fn ok_output() -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: String::new(),
        stderr: String::new(),
    }
}

fn test_config(min_workers: usize, max_workers: usize) -> EngineConfig {
    EngineConfig {
        min_workers,
        max_workers,
        scale_up_threshold: 3,
        scale_down_threshold: 1,
        scale_interval: Duration::from_millis(25),
        dequeue_wait: Duration::from_millis(20),
        max_history: 1024,
    }
}

fn spec(command: &[&str], priority: JobPriority) -> JobSpec {
    JobSpec::new(
        command[0],
        "/in/a.mp4",
        "/out/a.mp4",
        command.iter().map(|s| s.to_string()).collect(),
    )
    .with_priority(priority)
    .with_timeout(Duration::from_secs(30))
}

/// Poll until `check` passes or the deadline expires.
async fn wait_for(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn priority_then_fifo_order_with_single_worker() {
    let runner = Arc::new(FakeRunner::default());
    let engine = MediaEngine::with_runner(test_config(1, 1), Arc::clone(&runner) as Arc<dyn CommandRunner>).unwrap();

    // Enqueue before any worker runs, so ordering is decided by the queue.
    engine
        .submit(spec(&["ok", "low"], JobPriority::Low))
        .unwrap();
    engine
        .submit(spec(&["ok", "critical"], JobPriority::Critical))
        .unwrap();
    engine
        .submit(spec(&["ok", "normal"], JobPriority::Normal))
        .unwrap();

    engine.start();
    engine.shutdown(true).await;

    let markers: Vec<String> = runner.executed().iter().map(|a| a[1].clone()).collect();
    assert_eq!(markers, vec!["critical", "normal", "low"]);
}

#[tokio::test]
async fn graceful_shutdown_completes_all_jobs() {
    let runner = Arc::new(FakeRunner::default());
    let engine = MediaEngine::with_runner(test_config(2, 3), Arc::clone(&runner) as Arc<dyn CommandRunner>).unwrap();
    engine.start();

    let ids: Vec<JobId> = (0..8)
        .map(|_| {
            engine
                .submit(spec(&["sleep", "30"], JobPriority::Normal))
                .unwrap()
        })
        .collect();

    engine.shutdown(true).await;

    for id in &ids {
        assert_eq!(engine.job(id).unwrap().status, JobStatus::Completed);
    }
    let m = engine.metrics();
    assert_eq!(m.total_jobs_processed, 8);
    assert_eq!(m.total_jobs_failed, 0);
    assert_eq!(m.queue_size, 0);
    assert!(m.average_job_duration > Duration::ZERO);
}

#[tokio::test]
async fn failed_jobs_do_not_stop_the_worker() {
    let runner = Arc::new(FakeRunner::default());
    let engine = MediaEngine::with_runner(test_config(1, 1), Arc::clone(&runner) as Arc<dyn CommandRunner>).unwrap();

    let spawn_err = engine
        .submit(spec(&["spawn-err"], JobPriority::Normal))
        .unwrap();
    let tool_err = engine.submit(spec(&["fail"], JobPriority::Normal)).unwrap();
    let good = engine.submit(spec(&["ok"], JobPriority::Normal)).unwrap();

    engine.start();
    engine.shutdown(true).await;

    let job = engine.job(&spawn_err).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(matches!(job.error, Some(JobError::Spawn { .. })));

    let job = engine.job(&tool_err).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    match job.error {
        Some(JobError::Tool { exit_code, ref stderr }) => {
            assert_eq!(exit_code, 1);
            assert!(stderr.contains("synthetic failure"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // The bad jobs did not poison the loop.
    assert_eq!(engine.job(&good).unwrap().status, JobStatus::Completed);
    assert_eq!(engine.metrics().total_jobs_failed, 2);
}

#[tokio::test]
async fn cancel_is_effective_only_before_execution() {
    let runner = Arc::new(FakeRunner::default());
    let engine = MediaEngine::with_runner(test_config(1, 1), Arc::clone(&runner) as Arc<dyn CommandRunner>).unwrap();

    let id = engine
        .submit(spec(&["ok", "victim"], JobPriority::Normal))
        .unwrap();

    assert!(engine.cancel(&id).unwrap());
    assert!(!engine.cancel(&id).unwrap());
    assert_eq!(engine.job(&id).unwrap().status, JobStatus::Cancelled);

    engine.start();
    engine.shutdown(true).await;

    // The cancelled job never reached the external tool.
    assert!(runner.executed().is_empty());
    assert!(matches!(
        engine.cancel(&JobId::new()),
        Err(EngineError::Queue(QueueError::NotFound(_)))
    ));
}

#[tokio::test]
async fn pool_scales_up_to_max_under_load() {
    let runner = Arc::new(FakeRunner::default());
    let mut config = test_config(2, 5);
    config.scale_up_threshold = 3;
    let engine = MediaEngine::with_runner(config, Arc::clone(&runner) as Arc<dyn CommandRunner>).unwrap();
    engine.start();

    let ids: Vec<JobId> = (0..10)
        .map(|_| {
            engine
                .submit(spec(&["sleep", "500"], JobPriority::Normal))
                .unwrap()
        })
        .collect();

    let mut max_seen = 0;
    let start = Instant::now();
    loop {
        let m = engine.metrics();
        assert!(m.active_workers <= 5, "worker bound exceeded");
        max_seen = max_seen.max(m.active_workers);

        let done = m.total_jobs_processed as usize == ids.len();
        if done || start.elapsed() > Duration::from_secs(10) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(max_seen, 5, "pool should climb to max under sustained load");
    for id in &ids {
        assert_eq!(engine.job(id).unwrap().status, JobStatus::Completed);
    }
    engine.shutdown(true).await;
}

#[tokio::test]
async fn pool_scales_down_to_min_when_idle() {
    let runner = Arc::new(FakeRunner::default());
    let engine = MediaEngine::with_runner(test_config(1, 4), Arc::clone(&runner) as Arc<dyn CommandRunner>).unwrap();
    engine.start();

    for _ in 0..8 {
        engine
            .submit(spec(&["sleep", "100"], JobPriority::Normal))
            .unwrap();
    }

    // Drain completely, then let the autoscaler retire idle workers.
    assert!(
        wait_for(Duration::from_secs(10), || {
            engine.metrics().total_jobs_processed == 8
        })
        .await
    );
    assert!(
        wait_for(Duration::from_secs(2), || {
            engine.metrics().active_workers == 1
        })
        .await
    );

    // Never below min, even after more idle ticks.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.metrics().active_workers, 1);
    engine.shutdown(true).await;
}

#[tokio::test]
async fn shutdown_without_wait_returns_immediately() {
    let runner = Arc::new(FakeRunner::default());
    let engine = MediaEngine::with_runner(test_config(1, 1), Arc::clone(&runner) as Arc<dyn CommandRunner>).unwrap();
    engine.start();

    let id = engine
        .submit(spec(&["sleep", "500"], JobPriority::Normal))
        .unwrap();

    // Let the worker pick the job up.
    assert!(
        wait_for(Duration::from_secs(2), || {
            engine.job(&id).unwrap().status == JobStatus::Running
        })
        .await
    );

    let start = Instant::now();
    engine.shutdown(false).await;
    assert!(start.elapsed() < Duration::from_millis(250));

    // The in-flight job still runs to completion in the background.
    assert!(
        wait_for(Duration::from_secs(2), || {
            engine.job(&id).unwrap().status == JobStatus::Completed
        })
        .await
    );
}

#[tokio::test]
async fn submissions_rejected_after_shutdown() {
    let runner = Arc::new(FakeRunner::default());
    let engine = MediaEngine::with_runner(test_config(1, 1), Arc::clone(&runner) as Arc<dyn CommandRunner>).unwrap();
    engine.start();
    engine.shutdown(true).await;

    let result = engine.submit(spec(&["ok"], JobPriority::Normal));
    assert!(matches!(
        result,
        Err(EngineError::Queue(QueueError::Closed))
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn real_process_timeout_marks_job_failed() {
    let engine = MediaEngine::new(test_config(1, 1)).unwrap();
    engine.start();

    let id = engine
        .submit(
            JobSpec::new(
                "transcode",
                "/in/a.mp4",
                "/out/a.mp4",
                vec!["sleep".to_string(), "5".to_string()],
            )
            .with_timeout(Duration::from_secs(1)),
        )
        .unwrap();

    let start = Instant::now();
    assert!(
        wait_for(Duration::from_secs(4), || {
            engine.job(&id).unwrap().is_terminal()
        })
        .await
    );

    let job = engine.job(&id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(matches!(job.error, Some(JobError::Timeout { .. })));
    // Killed around the 1s timeout, well before the 5s sleep.
    assert!(start.elapsed() < Duration::from_secs(3));

    engine.shutdown(true).await;
}
