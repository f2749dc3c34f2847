//! Catalog adapter over a fixed list of items, optionally loaded from TOML.
//!
//! ```toml
//! [[items]]
//! object_type = "posts"
//! sub_type = "post"
//! location = "https://example.com/posts/hello"
//! modified_at = "2024-05-01T12:00:00Z"
//! ```

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::info;

use crate::application::repos::{CatalogRepo, PageWindow, RepoError};
use crate::domain::types::{CatalogItem, SitemapType};

use super::error::InfraError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    pub object_type: String,
    pub sub_type: Option<String>,
    pub location: String,
    pub modified_at: OffsetDateTime,
}

impl CatalogRecord {
    fn matches(&self, sitemap: &SitemapType) -> bool {
        self.object_type == sitemap.object_type()
            && sitemap
                .sub_type()
                .is_none_or(|sub_type| self.sub_type.as_deref() == Some(sub_type))
    }
}

/// Items are paged in file order, which is the catalog's stable order.
pub struct StaticCatalog {
    records: Vec<CatalogRecord>,
}

#[derive(Debug, Deserialize)]
struct RawCatalogFile {
    #[serde(default)]
    items: Vec<RawCatalogItem>,
}

#[derive(Debug, Deserialize)]
struct RawCatalogItem {
    object_type: String,
    #[serde(default)]
    sub_type: Option<String>,
    location: String,
    modified_at: String,
}

impl StaticCatalog {
    pub fn new(records: Vec<CatalogRecord>) -> Self {
        Self { records }
    }

    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let body = tokio::fs::read_to_string(path).await?;
        let catalog = Self::from_toml(&body)
            .map_err(|err| InfraError::catalog(format!("{}: {err}", path.display())))?;
        info!(
            target = "infra::catalog::StaticCatalog",
            path = %path.display(),
            items = catalog.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_toml(body: &str) -> Result<Self, InfraError> {
        let raw: RawCatalogFile =
            toml::from_str(body).map_err(|err| InfraError::catalog(err.to_string()))?;

        let records = raw
            .items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let modified_at = OffsetDateTime::parse(item.modified_at.trim(), &Rfc3339)
                    .map_err(|err| {
                        InfraError::catalog(format!("items[{index}].modified_at: {err}"))
                    })?;
                Ok(CatalogRecord {
                    object_type: item.object_type.trim().to_string(),
                    sub_type: item
                        .sub_type
                        .map(|value| value.trim().to_string())
                        .filter(|value| !value.is_empty()),
                    location: item.location,
                    modified_at,
                })
            })
            .collect::<Result<Vec<_>, InfraError>>()?;

        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CatalogRepo for StaticCatalog {
    async fn count_items(&self, sitemap: &SitemapType) -> Result<u64, RepoError> {
        let count = self
            .records
            .iter()
            .filter(|record| record.matches(sitemap))
            .count();
        Ok(count as u64)
    }

    async fn list_page_items(
        &self,
        sitemap: &SitemapType,
        window: PageWindow,
    ) -> Result<Vec<CatalogItem>, RepoError> {
        let Ok(offset) = usize::try_from(window.offset()) else {
            return Ok(Vec::new());
        };
        let limit = usize::try_from(window.page_size.get()).unwrap_or(usize::MAX);

        Ok(self
            .records
            .iter()
            .filter(|record| record.matches(sitemap))
            .skip(offset)
            .take(limit)
            .map(|record| CatalogItem {
                location: record.location.clone(),
                modified_at: record.modified_at,
            })
            .collect())
    }
}
