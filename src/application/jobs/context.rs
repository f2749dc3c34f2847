use std::sync::Arc;

use crate::{
    application::{repos::CatalogRepo, sitemap::SitemapService},
    cache::{LastmodCache, SitemapConfig},
};

use super::{
    queue::RecomputeScheduler,
    recompute::{RecomputeLastmodJobPayload, RecomputeOutcome, process_recompute_lastmod_job},
    sweep::{RefreshSweepJobPayload, SweepOutcome, process_refresh_sweep_job},
};

/// Per-provider handlers registered with the job worker.
///
/// Each provider gets its own context; job bodies discard payloads addressed to
/// another object type, so several providers may share one queue.
#[derive(Clone)]
pub struct JobWorkerContext {
    sitemap: Arc<SitemapService>,
    scheduler: Arc<RecomputeScheduler>,
}

impl JobWorkerContext {
    pub fn new(sitemap: Arc<SitemapService>, scheduler: Arc<RecomputeScheduler>) -> Self {
        Self { sitemap, scheduler }
    }

    pub fn sitemap(&self) -> &SitemapService {
        &self.sitemap
    }

    pub fn scheduler(&self) -> &RecomputeScheduler {
        &self.scheduler
    }

    pub fn object_type(&self) -> &str {
        self.sitemap.object_type()
    }

    pub fn catalog(&self) -> &dyn CatalogRepo {
        self.sitemap.catalog()
    }

    pub fn cache(&self) -> &LastmodCache {
        self.sitemap.cache()
    }

    pub fn config(&self) -> &SitemapConfig {
        self.sitemap.config()
    }

    pub async fn on_recompute_requested(
        &self,
        payload: RecomputeLastmodJobPayload,
    ) -> RecomputeOutcome {
        process_recompute_lastmod_job(payload, self).await
    }

    pub async fn on_sweep_triggered(&self, payload: RefreshSweepJobPayload) -> SweepOutcome {
        process_refresh_sweep_job(payload, self).await
    }
}
