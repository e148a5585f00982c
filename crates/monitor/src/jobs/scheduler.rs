//! Cron-driven scheduler for the background pipeline jobs.

use chrono::{DateTime, Local, TimeZone};
use cron::Schedule;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Trait for implementing background jobs.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// Execute the job. Returns Ok(()) on success, Err with message on failure.
    async fn execute(&self) -> Result<(), String>;
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid cron expression '{expression}' for job {job}: {source}")]
    InvalidCron {
        job: String,
        expression: String,
        #[source]
        source: cron::error::Error,
    },
}

/// Parse a six-field cron expression (seconds first).
pub fn parse_schedule(job: &str, expression: &str) -> Result<Schedule, SchedulerError> {
    Schedule::from_str(expression).map_err(|source| SchedulerError::InvalidCron {
        job: job.to_string(),
        expression: expression.to_string(),
        source,
    })
}

/// The first fire time strictly after `after`.
pub fn next_fire<Tz: TimeZone>(schedule: &Schedule, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    schedule.after(after).next()
}

struct ScheduledJob {
    name: &'static str,
    expression: String,
    schedule: Schedule,
    job: Arc<dyn Job>,
}

/// Clears the in-flight flag when the invocation ends, panics included.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(Arc::clone(flag)))
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Background job scheduler.
///
/// Every registered job fires on its own cron schedule in local time. Each
/// tick runs in a separate task; a tick that arrives while the previous
/// invocation of the same job is still running is skipped.
pub struct JobScheduler {
    jobs: Vec<ScheduledJob>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    /// Create a new job scheduler.
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    /// Register a job under `name`, fired by `cron_expression`.
    pub fn register<J: Job + 'static>(
        &mut self,
        name: &'static str,
        cron_expression: &str,
        job: J,
    ) -> Result<(), SchedulerError> {
        let schedule = parse_schedule(name, cron_expression)?;
        self.jobs.push(ScheduledJob {
            name,
            expression: cron_expression.to_string(),
            schedule,
            job: Arc::new(job),
        });
        Ok(())
    }

    /// Start all registered jobs.
    pub fn start(&mut self) {
        info!("Starting job scheduler with {} jobs", self.jobs.len());

        for scheduled in &self.jobs {
            let name = scheduled.name;
            let expression = scheduled.expression.clone();
            let schedule = scheduled.schedule.clone();
            let job = Arc::clone(&scheduled.job);
            let mut shutdown_rx = self.shutdown_rx.clone();

            let handle = tokio::spawn(async move {
                let in_flight = Arc::new(AtomicBool::new(false));
                let mut current: Option<JoinHandle<()>> = None;
                let mut last_fire: Option<DateTime<Local>> = None;

                info!(job = name, schedule = %expression, "Job scheduled");

                loop {
                    // Never fire the same slot twice if the timer wakes a hair early.
                    let now = Local::now();
                    let reference = match last_fire {
                        Some(last) if last > now => last,
                        _ => now,
                    };
                    let Some(fire_at) = next_fire(&schedule, &reference) else {
                        warn!(job = name, "Schedule has no upcoming fire time");
                        break;
                    };
                    let wait = (fire_at - Local::now()).to_std().unwrap_or(Duration::ZERO);

                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {
                            last_fire = Some(fire_at);
                            match InFlight::acquire(&in_flight) {
                                Some(guard) => {
                                    current = Some(spawn_invocation(name, Arc::clone(&job), guard));
                                }
                                None => {
                                    warn!(job = name, "Previous run still in progress, skipping tick");
                                }
                            }
                        }
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                info!(job = name, "Job shutting down");
                                break;
                            }
                        }
                    }
                }

                if let Some(running) = current {
                    let _ = running.await;
                }
            });

            self.handles.push(handle);
        }
    }

    /// Initiate graceful shutdown of all jobs.
    /// Returns immediately after signaling shutdown.
    pub fn shutdown(&self) {
        info!("Initiating job scheduler shutdown");
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for the scheduling loops and any in-flight runs, bounded by `timeout`.
    pub async fn wait_for_shutdown(self, timeout: Duration) {
        info!("Waiting for jobs to complete (timeout: {:?})", timeout);

        let shutdown_future = async {
            for handle in self.handles {
                if let Err(e) = handle.await {
                    warn!("Job task panicked: {}", e);
                }
            }
        };

        match tokio::time::timeout(timeout, shutdown_future).await {
            Ok(()) => info!("All jobs completed gracefully"),
            Err(_) => warn!("Job shutdown timed out after {:?}", timeout),
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one invocation in its own task so a panic is contained and logged.
fn spawn_invocation(name: &'static str, job: Arc<dyn Job>, guard: InFlight) -> JoinHandle<()> {
    tokio::spawn(async move {
        let _guard = guard;
        let start = Instant::now();
        debug!(job = name, "Job starting");

        let outcome = tokio::spawn(async move { job.execute().await }).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(())) => debug!(job = name, elapsed_ms, "Job completed successfully"),
            Ok(Err(e)) => error!(job = name, elapsed_ms, error = %e, "Job failed"),
            Err(e) => error!(job = name, elapsed_ms, error = %e, "Job panicked"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;

    struct TestJob {
        run_count: Arc<AtomicUsize>,
        should_fail: bool,
    }

    #[async_trait::async_trait]
    impl Job for TestJob {
        async fn execute(&self) -> Result<(), String> {
            self.run_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err("Test failure".to_string())
            } else {
                Ok(())
            }
        }
    }

    struct SlowJob {
        run_count: Arc<AtomicUsize>,
        duration: Duration,
    }

    #[async_trait::async_trait]
    impl Job for SlowJob {
        async fn execute(&self) -> Result<(), String> {
            self.run_count.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.duration).await;
            Ok(())
        }
    }

    struct PanickingJob {
        run_count: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Job for PanickingJob {
        async fn execute(&self) -> Result<(), String> {
            self.run_count.fetch_add(1, Ordering::SeqCst);
            panic!("job blew up");
        }
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_scheduler_creation() {
        let scheduler = JobScheduler::new();
        assert!(scheduler.jobs.is_empty());
        assert!(scheduler.handles.is_empty());
    }

    #[test]
    fn test_scheduler_register() {
        let mut scheduler = JobScheduler::default();
        let job = TestJob {
            run_count: counter(),
            should_fail: false,
        };
        scheduler.register("test_job", "0 * * * * *", job).unwrap();
        assert_eq!(scheduler.jobs.len(), 1);
        assert_eq!(scheduler.jobs[0].name, "test_job");
    }

    #[test]
    fn test_register_rejects_invalid_cron() {
        let mut scheduler = JobScheduler::new();
        let job = TestJob {
            run_count: counter(),
            should_fail: false,
        };
        let err = scheduler
            .register("broken", "not a cron", job)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCron { ref job, .. } if job == "broken"));
        assert!(scheduler.jobs.is_empty());
    }

    #[test]
    fn test_next_fire_every_minute() {
        let schedule = parse_schedule("summary", "0 * * * * *").unwrap();
        let next = next_fire(&schedule, &utc("2024-06-01T12:00:30Z")).unwrap();
        assert_eq!(next, utc("2024-06-01T12:01:00Z"));
    }

    #[test]
    fn test_next_fire_is_strictly_after_reference() {
        let schedule = parse_schedule("report", "0 5 0 * * *").unwrap();
        let next = next_fire(&schedule, &utc("2024-03-10T00:05:00Z")).unwrap();
        assert_eq!(next, utc("2024-03-11T00:05:00Z"));
    }

    #[test]
    fn test_next_fire_every_second() {
        let schedule = parse_schedule("fetch", "* * * * * *").unwrap();
        let next = next_fire(&schedule, &utc("2024-06-01T12:00:30Z")).unwrap();
        assert_eq!(next, utc("2024-06-01T12:00:31Z"));
    }

    #[tokio::test]
    async fn test_every_second_job_runs_repeatedly() {
        let mut scheduler = JobScheduler::new();
        let run_count = counter();
        scheduler
            .register(
                "ticker",
                "* * * * * *",
                TestJob {
                    run_count: Arc::clone(&run_count),
                    should_fail: false,
                },
            )
            .unwrap();
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(3200)).await;
        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_secs(2)).await;

        assert!(run_count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_failing_job_keeps_being_scheduled() {
        let mut scheduler = JobScheduler::new();
        let failing = counter();
        let healthy = counter();
        scheduler
            .register(
                "failing",
                "* * * * * *",
                TestJob {
                    run_count: Arc::clone(&failing),
                    should_fail: true,
                },
            )
            .unwrap();
        scheduler
            .register(
                "healthy",
                "* * * * * *",
                TestJob {
                    run_count: Arc::clone(&healthy),
                    should_fail: false,
                },
            )
            .unwrap();
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(3200)).await;
        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_secs(2)).await;

        assert!(failing.load(Ordering::SeqCst) >= 2);
        assert!(healthy.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_scheduler() {
        let mut scheduler = JobScheduler::new();
        let run_count = counter();
        scheduler
            .register(
                "panicking",
                "* * * * * *",
                PanickingJob {
                    run_count: Arc::clone(&run_count),
                },
            )
            .unwrap();
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(3200)).await;
        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_secs(2)).await;

        assert!(run_count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let mut scheduler = JobScheduler::new();
        let run_count = counter();
        scheduler
            .register(
                "slow",
                "* * * * * *",
                SlowJob {
                    run_count: Arc::clone(&run_count),
                    duration: Duration::from_secs(10),
                },
            )
            .unwrap();
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(3200)).await;
        assert_eq!(run_count.load(Ordering::SeqCst), 1);

        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_scheduler_shutdown_stops_loops() {
        let mut scheduler = JobScheduler::new();
        let run_count = counter();
        scheduler
            .register(
                "daily",
                "0 5 0 * * *",
                TestJob {
                    run_count: Arc::clone(&run_count),
                    should_fail: false,
                },
            )
            .unwrap();
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.shutdown();

        let waited = Instant::now();
        scheduler.wait_for_shutdown(Duration::from_secs(2)).await;
        assert!(waited.elapsed() < Duration::from_secs(2));
        assert_eq!(run_count.load(Ordering::SeqCst), 0);
    }
}
