//! Cache key definitions.
//!
//! A [`PageKey`] identifies one sitemap page. Its [`storage_key`](PageKey::storage_key)
//! is shared by the option store and by recompute-job deduplication, so the read path
//! and the write path always agree on the exact string.

use std::fmt;
use std::num::NonZeroU32;

use crate::domain::error::DomainError;
use crate::domain::types::SitemapType;

const SEGMENT_SEPARATOR: &str = "_";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    sitemap: SitemapType,
    page: NonZeroU32,
}

impl PageKey {
    pub fn new(sitemap: SitemapType, page: u32) -> Result<Self, DomainError> {
        let page = NonZeroU32::new(page)
            .ok_or_else(|| DomainError::validation("sitemap page numbers start at 1"))?;
        Ok(Self { sitemap, page })
    }

    pub fn from_parts(
        object_type: &str,
        sub_type: Option<&str>,
        page: u32,
    ) -> Result<Self, DomainError> {
        Self::new(SitemapType::new(object_type, sub_type)?, page)
    }

    pub fn sitemap(&self) -> &SitemapType {
        &self.sitemap
    }

    pub fn object_type(&self) -> &str {
        self.sitemap.object_type()
    }

    pub fn sub_type(&self) -> Option<&str> {
        self.sitemap.sub_type()
    }

    pub fn page(&self) -> u32 {
        self.page.get()
    }

    pub fn page_number(&self) -> NonZeroU32 {
        self.page
    }

    /// `<object_type>_<sub_type>_<page>` with the sub-type segment omitted when absent.
    pub fn storage_key(&self) -> String {
        format!(
            "{}{SEGMENT_SEPARATOR}{}",
            Self::storage_prefix(&self.sitemap),
            self.page
        )
    }

    /// Every page of `sitemap` is stored as `<prefix>_<page>`.
    ///
    /// The join is not injective: `a_b` without sub-types and `a` with sub-type `b`
    /// share the prefix `a_b`, so providers must be checked for collisions.
    pub fn storage_prefix(sitemap: &SitemapType) -> String {
        [Some(sitemap.object_type()), sitemap.sub_type()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(SEGMENT_SEPARATOR)
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}
