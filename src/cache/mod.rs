//! Sitemap lastmod cache.
//!
//! One persisted value per sitemap page, keyed by [`PageKey::storage_key`]:
//!
//! ```text
//! posts_post_1  => 2024-05-01T12:00:00+00:00
//! users_1       => 2024-04-28T09:15:00+00:00
//! ```
//!
//! Values are filled lazily by background recompute jobs and refreshed by the
//! recurring sweep. See [`SitemapConfig`] for page size and sweep recurrence.

mod config;
mod keys;
mod store;

pub use config::{SitemapConfig, TypeOverrides};
pub(crate) use config::{DEFAULT_PAGE_SIZE, DEFAULT_REFRESH_INTERVAL_SECS};
pub use keys::PageKey;
pub use store::{LastmodCache, ReadContext};
