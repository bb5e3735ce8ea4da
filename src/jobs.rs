//! Polling of asynchronous transcription jobs.
//!
//! A job is polled with exponential backoff until it reaches a terminal
//! status or the total time budget runs out.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::{JobStatus, TranscriptionService};
use crate::error::AppError;

/// Backoff parameters for [`wait_for_transcript`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    /// Delay after the first status check.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor applied after each non-terminal status.
    pub multiplier: f64,
    /// Total wait budget measured from the first status check.
    pub timeout: Duration,
}

impl PollPolicy {
    pub const DEFAULT_MULTIPLIER: f64 = 1.5;

    /// Delay following `current`, capped at `max_delay`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        if self.multiplier <= 1.0 {
            return current.min(self.max_delay);
        }
        current.mul_f64(self.multiplier).min(self.max_delay)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            multiplier: Self::DEFAULT_MULTIPLIER,
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Polls `job_name` until it completes and returns the transcript URI.
///
/// Returns [`AppError::JobFailed`] when the service reports failure and
/// [`AppError::Timeout`] when `policy.timeout` elapses first. Status-check
/// errors are returned immediately.
pub async fn wait_for_transcript(
    service: &dyn TranscriptionService,
    job_name: &str,
    policy: PollPolicy,
) -> Result<String, AppError> {
    let started = Instant::now();
    let mut delay = policy.initial_delay;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        match service.job_status(job_name).await? {
            JobStatus::Completed { transcript_uri } => {
                info!(
                    job_name,
                    attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "transcription job completed"
                );
                return Ok(transcript_uri);
            }
            JobStatus::Failed { reason } => {
                warn!(job_name, attempts, reason = ?reason, "transcription job failed");
                return Err(AppError::JobFailed {
                    job_name: job_name.to_string(),
                    reason,
                });
            }
            status @ (JobStatus::Queued | JobStatus::InProgress) => {
                let elapsed = started.elapsed();
                if elapsed >= policy.timeout {
                    warn!(job_name, attempts, "transcription job timed out");
                    return Err(AppError::Timeout {
                        job_name: job_name.to_string(),
                        waited_secs: elapsed.as_secs(),
                    });
                }

                let sleep_for = delay.min(policy.timeout - elapsed);
                debug!(
                    job_name,
                    attempt = attempts,
                    status = status.as_str(),
                    next_delay_ms = sleep_for.as_millis() as u64,
                    "transcription job still running"
                );
                tokio::time::sleep(sleep_for).await;
                delay = policy.next_delay(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::backend::TranscriptionJobRequest;

    struct ScriptedJobs {
        statuses: Mutex<VecDeque<JobStatus>>,
        polls: AtomicUsize,
    }

    impl ScriptedJobs {
        fn new(statuses: Vec<JobStatus>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                polls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TranscriptionService for ScriptedJobs {
        async fn start_job(&self, _req: TranscriptionJobRequest) -> Result<(), AppError> {
            Ok(())
        }

        async fn job_status(&self, _job_name: &str) -> Result<JobStatus, AppError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().unwrap();
            // The last scripted status repeats forever.
            if statuses.len() > 1 {
                Ok(statuses.pop_front().unwrap())
            } else {
                Ok(statuses.front().cloned().unwrap_or(JobStatus::InProgress))
            }
        }

        async fn fetch_transcript(&self, _transcript_uri: &str) -> Result<String, AppError> {
            Ok(String::new())
        }
    }

    fn fast_policy() -> PollPolicy {
        PollPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            multiplier: 2.0,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn next_delay_grows_and_caps() {
        let policy = PollPolicy::default();
        assert_eq!(
            policy.next_delay(Duration::from_secs(5)),
            Duration::from_millis(7_500)
        );
        assert_eq!(
            policy.next_delay(Duration::from_secs(50)),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn next_delay_never_shrinks() {
        let policy = PollPolicy {
            multiplier: 0.5,
            ..fast_policy()
        };
        assert_eq!(
            policy.next_delay(Duration::from_millis(2)),
            Duration::from_millis(2)
        );
    }

    #[tokio::test]
    async fn returns_uri_once_completed() {
        let jobs = ScriptedJobs::new(vec![
            JobStatus::Queued,
            JobStatus::InProgress,
            JobStatus::InProgress,
            JobStatus::Completed {
                transcript_uri: "https://transcripts/job.json".to_string(),
            },
        ]);

        let uri = wait_for_transcript(&jobs, "job", fast_policy())
            .await
            .expect("completed");
        assert_eq!(uri, "https://transcripts/job.json");
        assert_eq!(jobs.polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn failed_job_stops_polling() {
        let jobs = ScriptedJobs::new(vec![
            JobStatus::InProgress,
            JobStatus::Failed {
                reason: Some("unsupported media".to_string()),
            },
        ]);

        let err = wait_for_transcript(&jobs, "job", fast_policy())
            .await
            .unwrap_err();
        match err {
            AppError::JobFailed { job_name, reason } => {
                assert_eq!(job_name, "job");
                assert_eq!(reason.as_deref(), Some("unsupported media"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(jobs.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn running_job_times_out() {
        let jobs = ScriptedJobs::new(vec![JobStatus::InProgress]);
        let policy = PollPolicy {
            timeout: Duration::from_millis(20),
            ..fast_policy()
        };

        let err = wait_for_transcript(&jobs, "slow", policy)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Timeout { .. }));
        assert!(jobs.polls.load(Ordering::SeqCst) >= 2);
    }
}
