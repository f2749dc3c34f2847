//! Recurring sweep that re-queues a recompute for every page of an object type.

use std::time::Instant;

use metrics::histogram;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::PageKey;

use super::{context::JobWorkerContext, queue::EnqueueOutcome};

const METRIC_SWEEP_MS: &str = "sitemaps_sweep_ms";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSweepJobPayload {
    pub object_type: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scheduled: usize,
    pub suppressed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),
    ForeignType,
    CatalogUnavailable,
}

/// Fan out one recompute job per (sub-type, page) of the provider's object type.
pub async fn process_refresh_sweep_job(
    payload: RefreshSweepJobPayload,
    ctx: &JobWorkerContext,
) -> SweepOutcome {
    let provider = ctx.sitemap();
    if payload.object_type != provider.object_type() {
        return SweepOutcome::ForeignType;
    }

    let started_at = Instant::now();
    let descriptors = match provider.sitemap_type_data().await {
        Ok(descriptors) => descriptors,
        Err(err) => {
            warn!(
                target = "application::jobs::process_refresh_sweep_job",
                object_type = %payload.object_type,
                error = %err,
                "failed to enumerate sitemap pages; skipping sweep"
            );
            return SweepOutcome::CatalogUnavailable;
        }
    };

    let mut report = SweepReport::default();
    for descriptor in descriptors {
        for page in descriptor.pages() {
            let key = match PageKey::new(descriptor.sitemap.clone(), page) {
                Ok(key) => key,
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        target = "application::jobs::process_refresh_sweep_job",
                        error = %err,
                        "invalid page key during sweep"
                    );
                    continue;
                }
            };

            match ctx.scheduler().enqueue_recompute(&key).await {
                Ok(EnqueueOutcome::Scheduled { .. }) => report.scheduled += 1,
                Ok(EnqueueOutcome::DuplicateSuppressed) => report.suppressed += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        target = "application::jobs::process_refresh_sweep_job",
                        storage_key = %key,
                        error = %err,
                        "failed to enqueue recompute during sweep"
                    );
                }
            }
        }
    }

    histogram!(METRIC_SWEEP_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
    info!(
        target = "application::jobs::process_refresh_sweep_job",
        object_type = %payload.object_type,
        scheduled = report.scheduled,
        suppressed = report.suppressed,
        failed = report.failed,
        "refresh sweep fanned out"
    );
    SweepOutcome::Completed(report)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::application::jobs::testing::{Harness, harness, record};
    use crate::cache::ReadContext;

    #[tokio::test]
    async fn schedules_one_job_per_page() {
        let items = (0..5)
            .map(|index| record("post", &format!("p{index}"), datetime!(2024-01-01 00:00 UTC)))
            .collect();
        let Harness { ctx, runner, .. } = harness(items);

        let outcome = process_refresh_sweep_job(
            RefreshSweepJobPayload {
                object_type: "post".to_string(),
            },
            &ctx,
        )
        .await;

        // 5 items at 2 per page.
        assert_eq!(
            outcome,
            SweepOutcome::Completed(SweepReport {
                scheduled: 3,
                suppressed: 0,
                failed: 0,
            })
        );
        assert_eq!(runner.pending_count(), 3);
    }

    #[tokio::test]
    async fn pages_already_pending_are_suppressed() {
        let Harness { ctx, runner, .. } =
            harness(vec![record("post", "a", datetime!(2024-01-01 00:00 UTC))]);
        let key = PageKey::from_parts("post", None, 1).expect("key");
        assert!(ctx.cache().get(&key, ReadContext::Foreground).await.is_none());

        let outcome = process_refresh_sweep_job(
            RefreshSweepJobPayload {
                object_type: "post".to_string(),
            },
            &ctx,
        )
        .await;

        assert_eq!(
            outcome,
            SweepOutcome::Completed(SweepReport {
                scheduled: 0,
                suppressed: 1,
                failed: 0,
            })
        );
        assert_eq!(runner.pending_count(), 1);
    }

    #[tokio::test]
    async fn empty_catalog_still_sweeps_one_page() {
        let Harness { ctx, runner, .. } = harness(Vec::new());
        let outcome = process_refresh_sweep_job(
            RefreshSweepJobPayload {
                object_type: "post".to_string(),
            },
            &ctx,
        )
        .await;
        assert!(matches!(outcome, SweepOutcome::Completed(report) if report.scheduled == 1));
        assert_eq!(runner.pending_count(), 1);
    }

    #[tokio::test]
    async fn foreign_sweep_is_ignored() {
        let Harness { ctx, runner, .. } = harness(Vec::new());
        let outcome = process_refresh_sweep_job(
            RefreshSweepJobPayload {
                object_type: "users".to_string(),
            },
            &ctx,
        )
        .await;
        assert_eq!(outcome, SweepOutcome::ForeignType);
        assert_eq!(runner.pending_count(), 0);
    }
}
