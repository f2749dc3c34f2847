//! One-shot job recomputing the lastmod of a single sitemap page.

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{application::repos::PageWindow, cache::PageKey, domain::lastmod::Lastmod};

use super::context::JobWorkerContext;

const METRIC_RECOMPUTE_WRITTEN: &str = "sitemaps_recompute_written_total";
const METRIC_RECOMPUTE_EMPTY: &str = "sitemaps_recompute_empty_total";
const METRIC_RECOMPUTE_FAILED: &str = "sitemaps_recompute_failed_total";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeLastmodJobPayload {
    pub object_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    pub page: u32,
}

impl RecomputeLastmodJobPayload {
    pub fn from_key(key: &PageKey) -> Self {
        Self {
            object_type: key.object_type().to_string(),
            sub_type: key.sub_type().map(str::to_string),
            page: key.page(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecomputeOutcome {
    Written(Lastmod),
    /// The page has no items; nothing is written.
    EmptyPage,
    /// The job belongs to another provider sharing the queue.
    ForeignType,
    InvalidPayload,
    /// The newest item carries a timestamp a W3C lastmod cannot express.
    UnrepresentableTimestamp,
    CatalogUnavailable,
    StoreUnavailable,
}

/// Recompute and store the lastmod of one page.
///
/// Failures are absorbed here: the cache simply stays stale until the next miss or sweep.
pub async fn process_recompute_lastmod_job(
    payload: RecomputeLastmodJobPayload,
    ctx: &JobWorkerContext,
) -> RecomputeOutcome {
    let provider = ctx.sitemap();
    if payload.object_type != provider.object_type() {
        return RecomputeOutcome::ForeignType;
    }

    let key = match provider
        .subtypes()
        .resolve(&payload.object_type, payload.sub_type.as_deref())
        .and_then(|sitemap| PageKey::new(sitemap, payload.page))
    {
        Ok(key) => key,
        Err(err) => {
            warn!(
                target = "application::jobs::process_recompute_lastmod_job",
                object_type = %payload.object_type,
                sub_type = payload.sub_type.as_deref().unwrap_or(""),
                page = payload.page,
                error = %err,
                "discarding recompute job with invalid payload"
            );
            return RecomputeOutcome::InvalidPayload;
        }
    };

    let window = PageWindow::new(
        key.page_number(),
        ctx.config().page_size_for(key.object_type()),
    );
    let items = match ctx.catalog().list_page_items(key.sitemap(), window).await {
        Ok(items) => items,
        Err(err) => {
            counter!(METRIC_RECOMPUTE_FAILED).increment(1);
            warn!(
                target = "application::jobs::process_recompute_lastmod_job",
                storage_key = %key,
                error = %err,
                "catalog query failed; skipping this run"
            );
            return RecomputeOutcome::CatalogUnavailable;
        }
    };

    let Some(latest) = items.iter().map(|item| item.modified_at).max() else {
        counter!(METRIC_RECOMPUTE_EMPTY).increment(1);
        debug!(
            target = "application::jobs::process_recompute_lastmod_job",
            storage_key = %key,
            "page has no items; leaving lastmod unset"
        );
        return RecomputeOutcome::EmptyPage;
    };

    let lastmod = match Lastmod::new(latest) {
        Ok(lastmod) => lastmod,
        Err(err) => {
            counter!(METRIC_RECOMPUTE_FAILED).increment(1);
            warn!(
                target = "application::jobs::process_recompute_lastmod_job",
                storage_key = %key,
                error = %err,
                "newest item timestamp cannot be stored as a lastmod"
            );
            return RecomputeOutcome::UnrepresentableTimestamp;
        }
    };
    if let Err(err) = ctx.cache().set(&key, lastmod).await {
        counter!(METRIC_RECOMPUTE_FAILED).increment(1);
        warn!(
            target = "application::jobs::process_recompute_lastmod_job",
            storage_key = %key,
            error = %err,
            "failed to persist lastmod"
        );
        return RecomputeOutcome::StoreUnavailable;
    }

    counter!(METRIC_RECOMPUTE_WRITTEN).increment(1);
    info!(
        target = "application::jobs::process_recompute_lastmod_job",
        storage_key = %key,
        lastmod = %lastmod,
        items = items.len(),
        "lastmod recomputed"
    );
    RecomputeOutcome::Written(lastmod)
}
