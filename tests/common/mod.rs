#![allow(dead_code)]

use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;
use std::time::Duration;

use sitemap_lastmod::application::jobs::{JobWorkerContext, RecomputeScheduler};
use sitemap_lastmod::application::repos::CatalogRepo;
use sitemap_lastmod::application::sitemap::{SitemapRegistry, SitemapService};
use sitemap_lastmod::cache::{LastmodCache, SitemapConfig};
use sitemap_lastmod::domain::types::Subtypes;
use sitemap_lastmod::infra::catalog::{CatalogRecord, StaticCatalog};
use sitemap_lastmod::infra::jobs::InMemoryJobRunner;
use sitemap_lastmod::infra::options::InMemoryOptionStore;
use sitemap_lastmod::infra::urls::SitemapUrlBuilder;
use sitemap_lastmod::infra::worker::JobWorker;
use time::OffsetDateTime;

pub const BASE_URL: &str = "https://blog.example.com";

pub struct Stack {
    pub runner: Arc<InMemoryJobRunner>,
    pub store: Arc<InMemoryOptionStore>,
    pub scheduler: Arc<RecomputeScheduler>,
    pub registry: SitemapRegistry,
    pub worker: JobWorker,
}

impl Stack {
    pub fn provider(&self, object_type: &str) -> Arc<SitemapService> {
        self.registry
            .require(object_type)
            .expect("registered provider")
            .clone()
    }
}

/// `count` items of one type, the i-th modified `i` minutes after `start`.
pub fn items(
    object_type: &str,
    sub_type: Option<&str>,
    count: usize,
    start: OffsetDateTime,
) -> Vec<CatalogRecord> {
    (0..count)
        .map(|index| CatalogRecord {
            object_type: object_type.to_string(),
            sub_type: sub_type.map(str::to_string),
            location: format!("{BASE_URL}/{object_type}/{index}"),
            modified_at: start + time::Duration::minutes(index as i64),
        })
        .collect()
}

pub fn stack(records: Vec<CatalogRecord>, page_size: u32, providers: &[(&str, Subtypes)]) -> Stack {
    stack_with_catalog(Arc::new(StaticCatalog::new(records)), page_size, providers)
}

pub fn stack_with_catalog(
    catalog: Arc<dyn CatalogRepo>,
    page_size: u32,
    providers: &[(&str, Subtypes)],
) -> Stack {
    let runner = Arc::new(InMemoryJobRunner::new());
    let store = Arc::new(InMemoryOptionStore::new());
    let scheduler = Arc::new(RecomputeScheduler::new(runner.clone()));
    let cache = Arc::new(LastmodCache::new(store.clone(), scheduler.clone()));
    let urls = Arc::new(SitemapUrlBuilder::new(BASE_URL).expect("base url"));
    let config = Arc::new(SitemapConfig {
        page_size: NonZeroU32::new(page_size).expect("page size"),
        ..SitemapConfig::default()
    });

    let mut registry = SitemapRegistry::new(50_000);
    let mut worker = JobWorker::new(
        runner.clone(),
        NonZeroUsize::new(4).expect("concurrency"),
        Duration::from_millis(10),
    );
    for (object_type, subtypes) in providers {
        let provider = Arc::new(
            SitemapService::new(
                object_type,
                subtypes.clone(),
                catalog.clone(),
                cache.clone(),
                urls.clone(),
                config.clone(),
            )
            .expect("provider"),
        );
        registry.add(provider.clone()).expect("unique provider");
        worker.register(JobWorkerContext::new(provider, scheduler.clone()));
    }

    Stack {
        runner,
        store,
        scheduler,
        registry,
        worker,
    }
}
