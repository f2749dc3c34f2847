use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::{
    application::repos::{JobRunner, JobSpec, RepoError, ScheduleOutcome},
    cache::PageKey,
    domain::types::JobType,
};

use super::{recompute::RecomputeLastmodJobPayload, sweep::RefreshSweepJobPayload};

const METRIC_RECOMPUTE_ENQUEUED: &str = "sitemaps_recompute_enqueued_total";
const METRIC_RECOMPUTE_SUPPRESSED: &str = "sitemaps_recompute_suppressed_total";

/// Result of an enqueue request. Suppression is a successful no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Scheduled { job_id: String },
    DuplicateSuppressed,
}

impl EnqueueOutcome {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, EnqueueOutcome::Scheduled { .. })
    }
}

/// Enqueue a one-shot job unless one with the same identity is pending.
pub async fn enqueue_job<R, P>(
    runner: &R,
    job_type: JobType,
    dedup_key: &str,
    payload: &P,
    run_at: Option<OffsetDateTime>,
) -> Result<EnqueueOutcome, RepoError>
where
    R: JobRunner + ?Sized,
    P: serde::Serialize,
{
    let spec = JobSpec::new(job_type, dedup_key, payload)?;

    // Advisory: the runner's insert-if-absent is the real guard.
    if runner.is_scheduled(&spec).await? {
        return Ok(EnqueueOutcome::DuplicateSuppressed);
    }

    let outcome = runner
        .schedule_once(spec, run_at.unwrap_or_else(OffsetDateTime::now_utc))
        .await?;
    Ok(match outcome {
        ScheduleOutcome::Scheduled { job_id } => EnqueueOutcome::Scheduled { job_id },
        ScheduleOutcome::AlreadyScheduled => EnqueueOutcome::DuplicateSuppressed,
    })
}

/// Deduplicating front door to the job runner for lastmod recomputation.
pub struct RecomputeScheduler {
    runner: Arc<dyn JobRunner>,
}

impl RecomputeScheduler {
    pub fn new(runner: Arc<dyn JobRunner>) -> Self {
        Self { runner }
    }

    /// Queue one recompute for `key`, at most one pending per key.
    pub async fn enqueue_recompute(&self, key: &PageKey) -> Result<EnqueueOutcome, RepoError> {
        let payload = RecomputeLastmodJobPayload::from_key(key);
        let storage_key = key.storage_key();
        let outcome = enqueue_job(
            self.runner.as_ref(),
            JobType::RecomputeLastmod,
            &storage_key,
            &payload,
            None,
        )
        .await?;

        match &outcome {
            EnqueueOutcome::Scheduled { job_id } => {
                counter!(METRIC_RECOMPUTE_ENQUEUED).increment(1);
                debug!(
                    target = "application::jobs::enqueue_recompute",
                    storage_key = %storage_key,
                    job_id = %job_id,
                    "recompute job scheduled"
                );
            }
            EnqueueOutcome::DuplicateSuppressed => {
                counter!(METRIC_RECOMPUTE_SUPPRESSED).increment(1);
                debug!(
                    target = "application::jobs::enqueue_recompute",
                    storage_key = %storage_key,
                    "recompute already pending"
                );
            }
        }

        Ok(outcome)
    }

    /// Register the recurring full-refresh sweep for `object_type`.
    ///
    /// Idempotent: repeated calls leave exactly one recurring job in place.
    pub async fn register_refresh_sweep(
        &self,
        object_type: &str,
        interval: Duration,
    ) -> Result<EnqueueOutcome, RepoError> {
        let spec = JobSpec::new(
            JobType::RefreshSweep,
            object_type,
            &RefreshSweepJobPayload {
                object_type: object_type.to_string(),
            },
        )?;

        if self.runner.is_scheduled(&spec).await? {
            return Ok(EnqueueOutcome::DuplicateSuppressed);
        }

        let outcome = self
            .runner
            .schedule_recurring(spec, OffsetDateTime::now_utc(), interval)
            .await?;

        Ok(match outcome {
            ScheduleOutcome::Scheduled { job_id } => {
                info!(
                    target = "application::jobs::register_refresh_sweep",
                    object_type,
                    interval_secs = interval.as_secs(),
                    job_id = %job_id,
                    "refresh sweep registered"
                );
                EnqueueOutcome::Scheduled { job_id }
            }
            ScheduleOutcome::AlreadyScheduled => EnqueueOutcome::DuplicateSuppressed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::jobs::InMemoryJobRunner;

    fn scheduler() -> (Arc<InMemoryJobRunner>, RecomputeScheduler) {
        let runner = Arc::new(InMemoryJobRunner::new());
        let scheduler = RecomputeScheduler::new(runner.clone());
        (runner, scheduler)
    }

    #[tokio::test]
    async fn second_enqueue_for_same_key_is_suppressed() {
        let (runner, scheduler) = scheduler();
        let key = PageKey::from_parts("post", None, 3).expect("key");

        let first = scheduler.enqueue_recompute(&key).await.expect("enqueue");
        let second = scheduler.enqueue_recompute(&key).await.expect("enqueue");

        assert!(first.is_scheduled());
        assert_eq!(second, EnqueueOutcome::DuplicateSuppressed);
        assert_eq!(runner.pending_count(), 1);
        let pending = runner.pending();
        assert_eq!(pending[0].spec.dedup_key, "post_3");
    }

    #[tokio::test]
    async fn distinct_keys_each_get_a_job() {
        let (runner, scheduler) = scheduler();
        for page in 1..=3 {
            let key = PageKey::from_parts("post", None, page).expect("key");
            scheduler.enqueue_recompute(&key).await.expect("enqueue");
        }
        assert_eq!(runner.pending_count(), 3);
    }

    #[tokio::test]
    async fn sweep_registration_is_idempotent() {
        let (runner, scheduler) = scheduler();
        let interval = Duration::from_secs(43_200);

        let first = scheduler
            .register_refresh_sweep("posts", interval)
            .await
            .expect("register");
        let second = scheduler
            .register_refresh_sweep("posts", interval)
            .await
            .expect("register");

        assert!(first.is_scheduled());
        assert_eq!(second, EnqueueOutcome::DuplicateSuppressed);
        assert_eq!(runner.pending_count(), 1);
        assert_eq!(runner.pending()[0].interval, Some(interval));
    }

    #[tokio::test]
    async fn sweep_and_recompute_identities_do_not_collide() {
        let (runner, scheduler) = scheduler();
        let key = PageKey::from_parts("posts", None, 1).expect("key");
        scheduler
            .register_refresh_sweep("posts", Duration::from_secs(60))
            .await
            .expect("register");
        let outcome = scheduler.enqueue_recompute(&key).await.expect("enqueue");
        assert!(outcome.is_scheduled());
        assert_eq!(runner.pending_count(), 2);
    }
}
