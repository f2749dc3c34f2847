//! Sitemap entry assembly.
//!
//! A [`SitemapService`] is one provider: an object type with its declared sub-types.
//! It turns catalog counts into page descriptors and pairs each page URL with the
//! cached lastmod. The [`SitemapRegistry`] collects providers for the sitemap index.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::application::pagination::PageCounter;
use crate::application::repos::{CatalogRepo, RepoError, UrlBuilder};
use crate::cache::{LastmodCache, PageKey, ReadContext, SitemapConfig};
use crate::domain::error::DomainError;
use crate::domain::lastmod::Lastmod;
use crate::domain::types::{SitemapEntry, SitemapPageDescriptor, SitemapType, Subtypes};

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),
    #[error("failed to build sitemap url: {0}")]
    Url(String),
    #[error("no sitemap provider registered for `{0}`")]
    UnknownObjectType(String),
}

impl SitemapError {
    fn catalog(err: RepoError) -> Self {
        SitemapError::CatalogUnavailable(err.to_string())
    }
}

/// Sitemap provider for one object type.
pub struct SitemapService {
    object_type: String,
    subtypes: Subtypes,
    catalog: Arc<dyn CatalogRepo>,
    cache: Arc<LastmodCache>,
    urls: Arc<dyn UrlBuilder>,
    pages: PageCounter,
    config: Arc<SitemapConfig>,
}

impl SitemapService {
    pub fn new(
        object_type: &str,
        subtypes: Subtypes,
        catalog: Arc<dyn CatalogRepo>,
        cache: Arc<LastmodCache>,
        urls: Arc<dyn UrlBuilder>,
        config: Arc<SitemapConfig>,
    ) -> Result<Self, SitemapError> {
        let declared = subtypes.sitemap_types(object_type)?;
        let Some(first) = declared.first() else {
            return Err(DomainError::validation(format!(
                "object type `{object_type}` declares an empty sub-type list"
            ))
            .into());
        };
        let object_type = first.object_type().to_string();

        Ok(Self {
            object_type,
            subtypes,
            pages: PageCounter::new(catalog.clone(), config.clone()),
            catalog,
            cache,
            urls,
            config,
        })
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn subtypes(&self) -> &Subtypes {
        &self.subtypes
    }

    pub fn catalog(&self) -> &dyn CatalogRepo {
        self.catalog.as_ref()
    }

    pub fn cache(&self) -> &LastmodCache {
        &self.cache
    }

    pub fn config(&self) -> &SitemapConfig {
        &self.config
    }

    /// Page count for one declared sub-type (or the implicit one).
    ///
    /// An undeclared sub-type is rejected rather than reported as zero pages.
    pub async fn max_num_pages(&self, sub_type: Option<&str>) -> Result<u32, SitemapError> {
        let sitemap = self.subtypes.resolve(&self.object_type, sub_type)?;
        self.pages
            .page_count(&sitemap)
            .await
            .map_err(SitemapError::catalog)
    }

    /// One descriptor per declared sub-type, in declaration order.
    pub async fn sitemap_type_data(&self) -> Result<Vec<SitemapPageDescriptor>, SitemapError> {
        let mut descriptors = Vec::new();
        for sitemap in self.subtypes.sitemap_types(&self.object_type)? {
            let page_count = self
                .pages
                .page_count(&sitemap)
                .await
                .map_err(SitemapError::catalog)?;
            descriptors.push(SitemapPageDescriptor {
                sitemap,
                page_count,
            });
        }
        Ok(descriptors)
    }

    /// Cached lastmod of a single page. `Ok(None)` means not computed yet.
    pub async fn get_sitemap_lastmod(
        &self,
        sub_type: Option<&str>,
        page: u32,
        context: ReadContext,
    ) -> Result<Option<Lastmod>, SitemapError> {
        let sitemap = self.subtypes.resolve(&self.object_type, sub_type)?;
        let key = PageKey::new(sitemap, page)?;
        Ok(self.cache.get(&key, context).await)
    }

    /// Ordered entries: sub-type first, then page number.
    pub async fn list_entries(
        &self,
        context: ReadContext,
    ) -> Result<Vec<SitemapEntry>, SitemapError> {
        let mut entries = Vec::new();
        for descriptor in self.sitemap_type_data().await? {
            for page in descriptor.pages() {
                entries.push(self.entry(&descriptor.sitemap, page, context).await?);
            }
        }
        Ok(entries)
    }

    async fn entry(
        &self,
        sitemap: &SitemapType,
        page: u32,
        context: ReadContext,
    ) -> Result<SitemapEntry, SitemapError> {
        let location = self
            .urls
            .build_url(sitemap, page)
            .map_err(|err| SitemapError::Url(err.to_string()))?;
        let key = PageKey::new(sitemap.clone(), page)?;
        let lastmod = self.cache.get(&key, context).await;
        Ok(SitemapEntry { location, lastmod })
    }
}

/// Providers in registration order.
pub struct SitemapRegistry {
    providers: Vec<Arc<SitemapService>>,
    max_index_entries: usize,
}

impl SitemapRegistry {
    pub fn new(max_index_entries: usize) -> Self {
        Self {
            providers: Vec::new(),
            max_index_entries,
        }
    }

    /// Register a provider. Rejects duplicate object types and providers whose
    /// pages would share storage keys with an already registered one.
    pub fn add(&mut self, provider: Arc<SitemapService>) -> Result<(), SitemapError> {
        if self.get(provider.object_type()).is_some() {
            return Err(DomainError::validation(format!(
                "sitemap provider `{}` is already registered",
                provider.object_type()
            ))
            .into());
        }

        let incoming = storage_prefixes(&provider)?;
        for existing in &self.providers {
            let taken = storage_prefixes(existing)?;
            if let Some(prefix) = incoming.iter().find(|prefix| taken.contains(prefix)) {
                return Err(DomainError::validation(format!(
                    "sitemap provider `{}` would share storage keys `{prefix}_<page>` with `{}`",
                    provider.object_type(),
                    existing.object_type()
                ))
                .into());
            }
        }

        self.providers.push(provider);
        Ok(())
    }

    pub fn get(&self, object_type: &str) -> Option<&Arc<SitemapService>> {
        self.providers
            .iter()
            .find(|provider| provider.object_type() == object_type)
    }

    pub fn require(&self, object_type: &str) -> Result<&Arc<SitemapService>, SitemapError> {
        self.get(object_type)
            .ok_or_else(|| SitemapError::UnknownObjectType(object_type.to_string()))
    }

    pub fn providers(&self) -> &[Arc<SitemapService>] {
        &self.providers
    }

    pub async fn list_entries(
        &self,
        object_type: &str,
        context: ReadContext,
    ) -> Result<Vec<SitemapEntry>, SitemapError> {
        self.require(object_type)?.list_entries(context).await
    }

    /// Every provider's entries, concatenated and capped at the index limit.
    pub async fn index_entries(
        &self,
        context: ReadContext,
    ) -> Result<Vec<SitemapEntry>, SitemapError> {
        let mut entries = Vec::new();
        for provider in &self.providers {
            entries.extend(provider.list_entries(context).await?);
            if entries.len() >= self.max_index_entries {
                break;
            }
        }

        if entries.len() > self.max_index_entries {
            warn!(
                target = "application::sitemap::index_entries",
                limit = self.max_index_entries,
                total = entries.len(),
                "sitemap index truncated"
            );
            entries.truncate(self.max_index_entries);
        }
        Ok(entries)
    }
}

fn storage_prefixes(provider: &SitemapService) -> Result<Vec<String>, SitemapError> {
    Ok(provider
        .subtypes()
        .sitemap_types(provider.object_type())?
        .iter()
        .map(PageKey::storage_prefix)
        .collect())
}
