//! Lastmod cache over the persisted option store.
//!
//! Reads never compute. A miss asks the [`RecomputeScheduler`] for a background
//! recompute and returns immediately; only recompute jobs call [`LastmodCache::set`].
//! Entries have no TTL and are only ever overwritten.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use crate::application::jobs::RecomputeScheduler;
use crate::application::repos::{OptionStore, RepoError};
use crate::domain::lastmod::Lastmod;

use super::keys::PageKey;

const SOURCE: &str = "cache::store";
const METRIC_LASTMOD_HIT: &str = "sitemaps_lastmod_hit_total";
const METRIC_LASTMOD_MISS: &str = "sitemaps_lastmod_miss_total";

/// Who is reading. Background readers (e.g. a running sweep) never schedule on miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadContext {
    #[default]
    Foreground,
    Background,
}

pub struct LastmodCache {
    store: Arc<dyn OptionStore>,
    scheduler: Arc<RecomputeScheduler>,
}

impl LastmodCache {
    pub fn new(store: Arc<dyn OptionStore>, scheduler: Arc<RecomputeScheduler>) -> Self {
        Self { store, scheduler }
    }

    /// Cached lastmod for `key`, or `None` when not computed yet.
    ///
    /// On a foreground miss exactly one recompute job is requested for the key.
    pub async fn get(&self, key: &PageKey, context: ReadContext) -> Option<Lastmod> {
        let storage_key = key.storage_key();
        let raw = match self.store.get_value(&storage_key).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    target_module = SOURCE,
                    storage_key = %storage_key,
                    error = %err,
                    "Option store read failed; serving page without lastmod"
                );
                return None;
            }
        };

        if let Some(raw) = raw {
            match Lastmod::parse(&raw) {
                Ok(lastmod) => {
                    counter!(METRIC_LASTMOD_HIT).increment(1);
                    return Some(lastmod);
                }
                Err(err) => {
                    warn!(
                        target_module = SOURCE,
                        storage_key = %storage_key,
                        error = %err,
                        "Discarding malformed cached lastmod"
                    );
                }
            }
        }

        counter!(METRIC_LASTMOD_MISS).increment(1);
        self.signal_miss(key, context).await;
        None
    }

    /// Pure read: no metrics, no scheduling.
    pub async fn peek(&self, key: &PageKey) -> Result<Option<Lastmod>, RepoError> {
        match self.store.get_value(&key.storage_key()).await? {
            Some(raw) => Ok(Lastmod::parse(&raw).ok()),
            None => Ok(None),
        }
    }

    /// Overwrite the cached value. Last writer wins.
    pub async fn set(&self, key: &PageKey, lastmod: Lastmod) -> Result<(), RepoError> {
        let value = lastmod
            .to_w3c()
            .map_err(|err| RepoError::invalid_input(err.to_string()))?;
        self.store.set_value(&key.storage_key(), &value).await
    }

    async fn signal_miss(&self, key: &PageKey, context: ReadContext) {
        if context == ReadContext::Background {
            debug!(
                target_module = SOURCE,
                storage_key = %key,
                "Miss during background read; leaving it to the sweep"
            );
            return;
        }

        if let Err(err) = self.scheduler.enqueue_recompute(key).await {
            warn!(
                target_module = SOURCE,
                storage_key = %key,
                error = %err,
                "Failed to request lastmod recompute"
            );
        }
    }
}
