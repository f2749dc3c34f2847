//! Worker loop executing due jobs from the in-process runner.
//!
//! Every claimed job is offered to each registered provider context; the job
//! bodies discard payloads addressed to another object type.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use time::OffsetDateTime;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::application::jobs::{
    JobWorkerContext, RecomputeLastmodJobPayload, RecomputeOutcome, RefreshSweepJobPayload,
    SweepOutcome,
};
use crate::domain::types::JobType;

use super::jobs::{ClaimedJob, InMemoryJobRunner};

pub struct JobWorker {
    runner: Arc<InMemoryJobRunner>,
    handlers: Vec<JobWorkerContext>,
    concurrency: NonZeroUsize,
    tick: Duration,
}

impl JobWorker {
    pub fn new(runner: Arc<InMemoryJobRunner>, concurrency: NonZeroUsize, tick: Duration) -> Self {
        Self {
            runner,
            handlers: Vec::new(),
            concurrency,
            tick,
        }
    }

    pub fn register(&mut self, handler: JobWorkerContext) {
        self.handlers.push(handler);
    }

    /// Run every job due now. Returns the number of jobs executed.
    pub async fn run_due(&self) -> usize {
        let claimed = self.runner.claim_due(OffsetDateTime::now_utc());
        let count = claimed.len();
        if count == 0 {
            return 0;
        }

        let handlers = self.handlers.as_slice();
        let runner = self.runner.as_ref();
        stream::iter(claimed)
            .for_each_concurrent(Some(self.concurrency.get()), move |job| async move {
                dispatch(handlers, &job).await;
                runner.complete(&job, OffsetDateTime::now_utc());
            })
            .await;
        count
    }

    /// Run due jobs until no one-shot work remains. Recurring jobs stay armed.
    pub async fn drain(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.run_due().await;
            total += ran;
            if ran == 0 || !self.runner.has_one_shot_work() {
                break;
            }
        }
        debug!(
            target = "infra::worker::drain",
            jobs = total,
            "job queue drained"
        );
        total
    }

    /// Tick until `shutdown` resolves.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            target = "infra::worker::run_until",
            providers = self.handlers.len(),
            concurrency = self.concurrency.get(),
            tick_ms = u64::try_from(self.tick.as_millis()).unwrap_or(u64::MAX),
            "job worker started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.run_due().await;
                }
            }
        }

        info!(target = "infra::worker::run_until", "job worker stopped");
    }
}

async fn dispatch(handlers: &[JobWorkerContext], job: &ClaimedJob) {
    match job.spec.job_type {
        JobType::RecomputeLastmod => {
            let Some(payload) = decode::<RecomputeLastmodJobPayload>(job) else {
                return;
            };
            for handler in handlers {
                let outcome = handler.on_recompute_requested(payload.clone()).await;
                if outcome != RecomputeOutcome::ForeignType {
                    debug!(
                        target = "infra::worker::dispatch",
                        job_id = %job.id,
                        object_type = handler.object_type(),
                        outcome = ?outcome,
                        "recompute job handled"
                    );
                }
            }
        }
        JobType::RefreshSweep => {
            let Some(payload) = decode::<RefreshSweepJobPayload>(job) else {
                return;
            };
            for handler in handlers {
                let outcome = handler.on_sweep_triggered(payload.clone()).await;
                if outcome != SweepOutcome::ForeignType {
                    debug!(
                        target = "infra::worker::dispatch",
                        job_id = %job.id,
                        object_type = handler.object_type(),
                        outcome = ?outcome,
                        "sweep job handled"
                    );
                }
            }
        }
    }
}

fn decode<P: serde::de::DeserializeOwned>(job: &ClaimedJob) -> Option<P> {
    match serde_json::from_value(job.spec.payload.clone()) {
        Ok(payload) => Some(payload),
        Err(err) => {
            warn!(
                target = "infra::worker::dispatch",
                job_id = %job.id,
                job_type = job.spec.job_type.as_str(),
                error = %err,
                "discarding job with undecodable payload"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::application::jobs::RecomputeScheduler;
    use crate::application::repos::{JobRunner, JobSpec};
    use crate::application::sitemap::SitemapService;
    use crate::cache::{LastmodCache, ReadContext, SitemapConfig};
    use crate::domain::types::Subtypes;
    use crate::infra::catalog::{CatalogRecord, StaticCatalog};
    use crate::infra::options::InMemoryOptionStore;
    use crate::infra::urls::SitemapUrlBuilder;

    struct Fixture {
        runner: Arc<InMemoryJobRunner>,
        store: Arc<InMemoryOptionStore>,
        scheduler: Arc<RecomputeScheduler>,
        worker: JobWorker,
        users: Arc<SitemapService>,
    }

    fn fixture() -> Fixture {
        let runner = Arc::new(InMemoryJobRunner::new());
        let store = Arc::new(InMemoryOptionStore::new());
        let scheduler = Arc::new(RecomputeScheduler::new(runner.clone()));
        let cache = Arc::new(LastmodCache::new(store.clone(), scheduler.clone()));
        let catalog = Arc::new(StaticCatalog::new(vec![
            CatalogRecord {
                object_type: "users".to_string(),
                sub_type: None,
                location: "https://example.com/authors/ada".to_string(),
                modified_at: datetime!(2024-04-01 00:00 UTC),
            },
            CatalogRecord {
                object_type: "tags".to_string(),
                sub_type: None,
                location: "https://example.com/tags/rust".to_string(),
                modified_at: datetime!(2024-05-01 00:00 UTC),
            },
        ]));
        let urls = Arc::new(SitemapUrlBuilder::new("https://example.com").expect("base"));
        let config = Arc::new(SitemapConfig::default());

        let mut worker = JobWorker::new(
            runner.clone(),
            NonZeroUsize::new(2).expect("non-zero"),
            Duration::from_millis(10),
        );
        let mut users = None;
        for object_type in ["users", "tags"] {
            let provider = Arc::new(
                SitemapService::new(
                    object_type,
                    Subtypes::NoSubtypes,
                    catalog.clone(),
                    cache.clone(),
                    urls.clone(),
                    config.clone(),
                )
                .expect("provider"),
            );
            if object_type == "users" {
                users = Some(provider.clone());
            }
            worker.register(JobWorkerContext::new(provider, scheduler.clone()));
        }

        Fixture {
            runner,
            store,
            scheduler,
            worker,
            users: users.expect("users provider"),
        }
    }

    #[tokio::test]
    async fn drain_runs_recompute_jobs_for_the_owning_provider() {
        let fx = fixture();
        let entries = fx
            .users
            .list_entries(ReadContext::Foreground)
            .await
            .expect("entries");
        assert!(entries[0].lastmod.is_none());
        assert_eq!(fx.runner.pending_count(), 1);

        assert_eq!(fx.worker.drain().await, 1);

        assert_eq!(fx.runner.pending_count(), 0);
        assert_eq!(
            fx.store.value("users_1").as_deref(),
            Some("2024-04-01T00:00:00+00:00")
        );
        assert!(fx.store.value("tags_1").is_none());
    }

    #[tokio::test]
    async fn sweep_fans_out_and_drain_completes_the_pages() {
        let fx = fixture();
        fx.scheduler
            .register_refresh_sweep("tags", Duration::from_secs(3600))
            .await
            .expect("register");

        let ran = fx.worker.drain().await;

        // One sweep plus one recompute.
        assert_eq!(ran, 2);
        assert_eq!(
            fx.store.value("tags_1").as_deref(),
            Some("2024-05-01T00:00:00+00:00")
        );
        let pending = fx.runner.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].interval, Some(Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn undecodable_payload_is_dropped() {
        let fx = fixture();
        let spec = JobSpec::new(
            JobType::RecomputeLastmod,
            "users_1",
            &serde_json::json!({ "unexpected": true }),
        )
        .expect("spec");
        fx.runner
            .schedule_once(spec, OffsetDateTime::now_utc())
            .await
            .expect("schedule");

        assert_eq!(fx.worker.drain().await, 1);
        assert_eq!(fx.runner.pending_count(), 0);
        assert!(fx.store.is_empty());
    }

    #[tokio::test]
    async fn run_until_stops_on_shutdown() {
        let fx = fixture();
        fx.users
            .get_sitemap_lastmod(None, 1, ReadContext::Foreground)
            .await
            .expect("lookup");

        let shutdown = tokio::time::sleep(Duration::from_millis(100));
        fx.worker.run_until(shutdown).await;

        assert!(fx.store.value("users_1").is_some());
    }
}
