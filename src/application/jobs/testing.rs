//! Fixtures shared by the job unit tests.

use std::num::NonZeroU32;
use std::sync::Arc;

use time::OffsetDateTime;

use crate::application::repos::CatalogRepo;
use crate::application::sitemap::SitemapService;
use crate::cache::{LastmodCache, SitemapConfig};
use crate::domain::types::Subtypes;
use crate::infra::catalog::{CatalogRecord, StaticCatalog};
use crate::infra::jobs::InMemoryJobRunner;
use crate::infra::options::InMemoryOptionStore;
use crate::infra::urls::SitemapUrlBuilder;

use super::{JobWorkerContext, RecomputeScheduler};

pub(crate) struct Harness {
    pub ctx: JobWorkerContext,
    pub runner: Arc<InMemoryJobRunner>,
    pub store: Arc<InMemoryOptionStore>,
}

pub(crate) fn record(object_type: &str, slug: &str, modified_at: OffsetDateTime) -> CatalogRecord {
    CatalogRecord {
        object_type: object_type.to_string(),
        sub_type: None,
        location: format!("https://example.com/{object_type}/{slug}"),
        modified_at,
    }
}

/// Provider for `post` without sub-types, two items per page.
pub(crate) fn harness(items: Vec<CatalogRecord>) -> Harness {
    let runner = Arc::new(InMemoryJobRunner::new());
    let store = Arc::new(InMemoryOptionStore::new());
    let ctx = build_context(Arc::new(StaticCatalog::new(items)), store.clone(), runner.clone());
    Harness { ctx, runner, store }
}

pub(crate) fn context_with_catalog(
    catalog: Arc<dyn CatalogRepo>,
    store: Arc<InMemoryOptionStore>,
) -> JobWorkerContext {
    build_context(catalog, store, Arc::new(InMemoryJobRunner::new()))
}

fn build_context(
    catalog: Arc<dyn CatalogRepo>,
    store: Arc<InMemoryOptionStore>,
    runner: Arc<InMemoryJobRunner>,
) -> JobWorkerContext {
    let scheduler = Arc::new(RecomputeScheduler::new(runner));
    let cache = Arc::new(LastmodCache::new(store, scheduler.clone()));
    let config = SitemapConfig {
        page_size: NonZeroU32::new(2).expect("non-zero"),
        ..SitemapConfig::default()
    };
    let urls = Arc::new(SitemapUrlBuilder::new("https://example.com").expect("base url"));
    let sitemap = SitemapService::new(
        "post",
        Subtypes::NoSubtypes,
        catalog,
        cache,
        urls,
        Arc::new(config),
    )
    .expect("provider");
    JobWorkerContext::new(Arc::new(sitemap), scheduler)
}
