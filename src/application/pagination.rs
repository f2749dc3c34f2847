//! Sitemap page counts derived from catalog totals.

use std::num::NonZeroU32;
use std::sync::Arc;

use crate::application::repos::{CatalogRepo, RepoError};
use crate::cache::SitemapConfig;
use crate::domain::types::SitemapType;

/// `ceil(total / page_size)`, never less than one page.
pub fn page_count(total: u64, page_size: NonZeroU32) -> u32 {
    let pages = total.div_ceil(u64::from(page_size.get())).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Page counter backed by the catalog and the configured page size.
#[derive(Clone)]
pub struct PageCounter {
    catalog: Arc<dyn CatalogRepo>,
    config: Arc<SitemapConfig>,
}

impl PageCounter {
    pub fn new(catalog: Arc<dyn CatalogRepo>, config: Arc<SitemapConfig>) -> Self {
        Self { catalog, config }
    }

    pub fn page_size(&self, object_type: &str) -> NonZeroU32 {
        self.config.page_size_for(object_type)
    }

    pub async fn page_count(&self, sitemap: &SitemapType) -> Result<u32, RepoError> {
        let total = self.catalog.count_items(sitemap).await?;
        Ok(page_count(total, self.page_size(sitemap.object_type())))
    }
}
