//! Sitemap cache configuration.
//!
//! Page size and sweep recurrence, each overridable per object type via the
//! `[sitemap.overrides.<object_type>]` table.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

pub(crate) const DEFAULT_PAGE_SIZE: u32 = 2000;
pub(crate) const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 12 * 60 * 60;

/// Per-object-type overrides. Unset fields fall back to the global value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeOverrides {
    pub page_size: Option<NonZeroU32>,
    pub refresh_interval: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapConfig {
    /// Items per sitemap page.
    pub page_size: NonZeroU32,
    /// Recurrence of the full refresh sweep.
    pub refresh_interval: Duration,
    pub per_type_overrides: HashMap<String, TypeOverrides>,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            page_size: NonZeroU32::new(DEFAULT_PAGE_SIZE).unwrap_or(NonZeroU32::MIN),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            per_type_overrides: HashMap::new(),
        }
    }
}

impl From<&crate::config::SitemapSettings> for SitemapConfig {
    fn from(settings: &crate::config::SitemapSettings) -> Self {
        Self {
            page_size: settings.page_size,
            refresh_interval: settings.refresh_interval,
            per_type_overrides: settings
                .overrides
                .iter()
                .map(|(object_type, value)| (object_type.clone(), value.clone()))
                .collect(),
        }
    }
}

impl SitemapConfig {
    pub fn with_override(mut self, object_type: impl Into<String>, value: TypeOverrides) -> Self {
        self.per_type_overrides.insert(object_type.into(), value);
        self
    }

    pub fn page_size_for(&self, object_type: &str) -> NonZeroU32 {
        self.per_type_overrides
            .get(object_type)
            .and_then(|value| value.page_size)
            .unwrap_or(self.page_size)
    }

    pub fn refresh_interval_for(&self, object_type: &str) -> Duration {
        self.per_type_overrides
            .get(object_type)
            .and_then(|value| value.refresh_interval)
            .unwrap_or(self.refresh_interval)
    }
}
