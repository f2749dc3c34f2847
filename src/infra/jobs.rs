//! In-process job runner.
//!
//! Pending jobs live in a single map keyed by [`JobSpec::identity`]. Scheduling is an
//! insert-if-absent under one mutex, so concurrent enqueues for the same identity
//! can never both succeed. One-shot jobs keep their slot while running and are
//! removed on completion; recurring jobs are re-armed.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use metrics::gauge;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::application::repos::{JobRunner, JobSpec, RepoError, ScheduleOutcome};

use super::lock::mutex_lock;

const SOURCE: &str = "infra::jobs";
const METRIC_JOBS_PENDING: &str = "sitemaps_jobs_pending";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Scheduled,
    Running,
}

#[derive(Debug, Clone)]
pub struct PendingJob {
    pub id: String,
    pub spec: JobSpec,
    pub run_at: OffsetDateTime,
    /// Set for recurring jobs.
    pub interval: Option<Duration>,
    pub state: JobState,
    seq: u64,
}

/// A job handed to a worker. Must be passed back to [`InMemoryJobRunner::complete`].
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: String,
    pub spec: JobSpec,
    pub run_at: OffsetDateTime,
}

#[derive(Default)]
struct RunnerState {
    jobs: HashMap<String, PendingJob>,
    next_seq: u64,
}

impl RunnerState {
    fn insert_if_absent(
        &mut self,
        spec: JobSpec,
        run_at: OffsetDateTime,
        interval: Option<Duration>,
    ) -> ScheduleOutcome {
        let seq = self.next_seq;
        match self.jobs.entry(spec.identity()) {
            Entry::Occupied(_) => ScheduleOutcome::AlreadyScheduled,
            Entry::Vacant(slot) => {
                let id = Uuid::new_v4().to_string();
                slot.insert(PendingJob {
                    id: id.clone(),
                    spec,
                    run_at,
                    interval,
                    state: JobState::Scheduled,
                    seq,
                });
                self.next_seq += 1;
                ScheduleOutcome::Scheduled { job_id: id }
            }
        }
    }
}

#[derive(Default)]
pub struct InMemoryJobRunner {
    state: Mutex<RunnerState>,
}

impl InMemoryJobRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs known to the runner, scheduled or running.
    pub fn pending_count(&self) -> usize {
        mutex_lock(&self.state, SOURCE, "pending_count").jobs.len()
    }

    /// Snapshot of all jobs ordered by due time, then insertion order.
    pub fn pending(&self) -> Vec<PendingJob> {
        let state = mutex_lock(&self.state, SOURCE, "pending");
        let mut jobs: Vec<PendingJob> = state.jobs.values().cloned().collect();
        jobs.sort_by_key(|job| (job.run_at, job.seq));
        jobs
    }

    /// Whether any one-shot job is still scheduled or running.
    pub fn has_one_shot_work(&self) -> bool {
        mutex_lock(&self.state, SOURCE, "has_one_shot_work")
            .jobs
            .values()
            .any(|job| job.interval.is_none())
    }

    /// Mark every job due at `now` as running and hand them out in due order.
    pub fn claim_due(&self, now: OffsetDateTime) -> Vec<ClaimedJob> {
        let mut state = mutex_lock(&self.state, SOURCE, "claim_due");
        let mut due: Vec<&mut PendingJob> = state
            .jobs
            .values_mut()
            .filter(|job| job.state == JobState::Scheduled && job.run_at <= now)
            .collect();
        due.sort_by_key(|job| (job.run_at, job.seq));

        due.into_iter()
            .map(|job| {
                job.state = JobState::Running;
                ClaimedJob {
                    id: job.id.clone(),
                    spec: job.spec.clone(),
                    run_at: job.run_at,
                }
            })
            .collect()
    }

    /// Release a claimed job: drop it if one-shot, re-arm it if recurring.
    pub fn complete(&self, claimed: &ClaimedJob, now: OffsetDateTime) {
        let mut state = mutex_lock(&self.state, SOURCE, "complete");
        let identity = claimed.spec.identity();
        let Some(job) = state.jobs.get_mut(&identity) else {
            return;
        };
        if job.id != claimed.id {
            return;
        }

        match job.interval {
            None => {
                state.jobs.remove(&identity);
            }
            Some(interval) => match next_run(claimed.run_at, interval, now) {
                Some(run_at) => {
                    job.run_at = run_at;
                    job.state = JobState::Scheduled;
                }
                None => {
                    warn!(
                        target_module = SOURCE,
                        identity = %identity,
                        interval_secs = interval.as_secs(),
                        "Recurring job interval overflows the calendar; dropping job"
                    );
                    state.jobs.remove(&identity);
                }
            },
        }
        record_pending(&state);
    }

    fn schedule(
        &self,
        spec: JobSpec,
        run_at: OffsetDateTime,
        interval: Option<Duration>,
    ) -> ScheduleOutcome {
        let mut state = mutex_lock(&self.state, SOURCE, "schedule");
        let outcome = state.insert_if_absent(spec, run_at, interval);
        record_pending(&state);
        outcome
    }
}

/// `run_at + interval`, or `now + interval` when that moment has already passed.
fn next_run(
    run_at: OffsetDateTime,
    interval: Duration,
    now: OffsetDateTime,
) -> Option<OffsetDateTime> {
    let step = time::Duration::try_from(interval).ok()?;
    let next = run_at.checked_add(step)?;
    if next > now {
        Some(next)
    } else {
        now.checked_add(step)
    }
}

fn record_pending(state: &RunnerState) {
    gauge!(METRIC_JOBS_PENDING).set(state.jobs.len() as f64);
}

#[async_trait]
impl JobRunner for InMemoryJobRunner {
    async fn schedule_once(
        &self,
        job: JobSpec,
        run_at: OffsetDateTime,
    ) -> Result<ScheduleOutcome, RepoError> {
        Ok(self.schedule(job, run_at, None))
    }

    async fn schedule_recurring(
        &self,
        job: JobSpec,
        first_run: OffsetDateTime,
        interval: Duration,
    ) -> Result<ScheduleOutcome, RepoError> {
        if interval.is_zero() {
            return Err(RepoError::invalid_input(
                "recurring interval must be greater than zero",
            ));
        }
        Ok(self.schedule(job, first_run, Some(interval)))
    }

    async fn is_scheduled(&self, job: &JobSpec) -> Result<bool, RepoError> {
        Ok(mutex_lock(&self.state, SOURCE, "is_scheduled")
            .jobs
            .contains_key(&job.identity()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::datetime;

    use super::*;
    use crate::domain::types::JobType;

    fn spec(job_type: JobType, key: &str) -> JobSpec {
        JobSpec::new(job_type, key, &serde_json::json!({ "key": key })).expect("spec")
    }

    #[tokio::test]
    async fn second_schedule_for_same_identity_is_rejected() {
        let runner = InMemoryJobRunner::new();
        let at = datetime!(2024-01-01 00:00 UTC);

        let first = runner
            .schedule_once(spec(JobType::RecomputeLastmod, "post_1"), at)
            .await
            .expect("schedule");
        let second = runner
            .schedule_once(spec(JobType::RecomputeLastmod, "post_1"), at)
            .await
            .expect("schedule");

        assert!(matches!(first, ScheduleOutcome::Scheduled { .. }));
        assert_eq!(second, ScheduleOutcome::AlreadyScheduled);
        assert_eq!(runner.pending_count(), 1);
    }

    #[tokio::test]
    async fn running_one_shot_keeps_its_identity_until_complete() {
        let runner = InMemoryJobRunner::new();
        let at = datetime!(2024-01-01 00:00 UTC);
        let job = spec(JobType::RecomputeLastmod, "post_2");
        runner.schedule_once(job.clone(), at).await.expect("schedule");

        let claimed = runner.claim_due(at);
        assert_eq!(claimed.len(), 1);
        assert!(runner.is_scheduled(&job).await.expect("query"));
        assert_eq!(
            runner.schedule_once(job.clone(), at).await.expect("schedule"),
            ScheduleOutcome::AlreadyScheduled
        );
        assert!(runner.claim_due(at).is_empty());

        runner.complete(&claimed[0], at);
        assert!(!runner.is_scheduled(&job).await.expect("query"));
        assert_eq!(runner.pending_count(), 0);
    }

    #[tokio::test]
    async fn jobs_are_not_claimed_before_they_are_due() {
        let runner = InMemoryJobRunner::new();
        runner
            .schedule_once(
                spec(JobType::RecomputeLastmod, "later"),
                datetime!(2024-01-02 00:00 UTC),
            )
            .await
            .expect("schedule");
        assert!(runner.claim_due(datetime!(2024-01-01 00:00 UTC)).is_empty());
        assert_eq!(runner.claim_due(datetime!(2024-01-02 00:00 UTC)).len(), 1);
    }

    #[tokio::test]
    async fn claims_follow_due_time_then_insertion_order() {
        let runner = InMemoryJobRunner::new();
        let early = datetime!(2024-01-01 00:00 UTC);
        let late = datetime!(2024-01-01 01:00 UTC);
        for (key, at) in [("b", late), ("a", early), ("c", late)] {
            runner
                .schedule_once(spec(JobType::RecomputeLastmod, key), at)
                .await
                .expect("schedule");
        }

        let keys: Vec<_> = runner
            .claim_due(late)
            .into_iter()
            .map(|job| job.spec.dedup_key)
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn recurring_job_is_rearmed_after_completion() {
        let runner = InMemoryJobRunner::new();
        let first = datetime!(2024-01-01 00:00 UTC);
        let interval = Duration::from_secs(12 * 60 * 60);
        runner
            .schedule_recurring(spec(JobType::RefreshSweep, "posts"), first, interval)
            .await
            .expect("schedule");

        let claimed = runner.claim_due(first);
        runner.complete(&claimed[0], first + time::Duration::minutes(1));

        let pending = runner.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].state, JobState::Scheduled);
        assert_eq!(pending[0].run_at, datetime!(2024-01-01 12:00 UTC));
        assert!(!runner.has_one_shot_work());
    }

    #[tokio::test]
    async fn late_recurring_run_is_rearmed_from_now() {
        let runner = InMemoryJobRunner::new();
        let first = datetime!(2024-01-01 00:00 UTC);
        runner
            .schedule_recurring(
                spec(JobType::RefreshSweep, "users"),
                first,
                Duration::from_secs(3600),
            )
            .await
            .expect("schedule");

        let claimed = runner.claim_due(first);
        runner.complete(&claimed[0], datetime!(2024-01-01 05:30 UTC));

        assert_eq!(runner.pending()[0].run_at, datetime!(2024-01-01 06:30 UTC));
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let runner = InMemoryJobRunner::new();
        let result = runner
            .schedule_recurring(
                spec(JobType::RefreshSweep, "posts"),
                datetime!(2024-01-01 00:00 UTC),
                Duration::ZERO,
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_schedules_admit_exactly_one() {
        let runner = Arc::new(InMemoryJobRunner::new());
        let at = datetime!(2024-01-01 00:00 UTC);

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let runner = runner.clone();
                tokio::spawn(async move {
                    runner
                        .schedule_once(spec(JobType::RecomputeLastmod, "post_9"), at)
                        .await
                        .expect("schedule")
                })
            })
            .collect();

        let mut scheduled = 0;
        for handle in handles {
            if matches!(handle.await.expect("join"), ScheduleOutcome::Scheduled { .. }) {
                scheduled += 1;
            }
        }
        assert_eq!(scheduled, 1);
        assert_eq!(runner.pending_count(), 1);
    }
}
