//! Collaborator traits describing the adapters the sitemap core talks to.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::types::{CatalogItem, JobType, SitemapType};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("collaborator timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Slice of the catalog that backs one sitemap page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: NonZeroU32,
    pub page_size: NonZeroU32,
}

impl PageWindow {
    pub fn new(page: NonZeroU32, page_size: NonZeroU32) -> Self {
        Self { page, page_size }
    }

    /// Number of catalog items preceding this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.get() - 1) * u64::from(self.page_size.get())
    }
}

#[async_trait]
pub trait CatalogRepo: Send + Sync {
    /// Total items of the sub-type, or of the object type when no sub-type is set.
    async fn count_items(&self, sitemap: &SitemapType) -> Result<u64, RepoError>;

    /// Items listed on the given sitemap page, in the catalog's stable order.
    async fn list_page_items(
        &self,
        sitemap: &SitemapType,
        window: PageWindow,
    ) -> Result<Vec<CatalogItem>, RepoError>;
}

/// Persisted key/value store holding one lastmod string per page key.
#[async_trait]
pub trait OptionStore: Send + Sync {
    async fn get_value(&self, key: &str) -> Result<Option<String>, RepoError>;

    async fn set_value(&self, key: &str, value: &str) -> Result<(), RepoError>;
}

/// A unit of work handed to the job runner.
///
/// Two specs with the same [`identity`](JobSpec::identity) are the same job as far as
/// deduplication is concerned, regardless of payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub job_type: JobType,
    pub dedup_key: String,
    pub payload: serde_json::Value,
}

impl JobSpec {
    pub fn new<P: Serialize>(
        job_type: JobType,
        dedup_key: impl Into<String>,
        payload: &P,
    ) -> Result<Self, RepoError> {
        let payload = serde_json::to_value(payload)
            .map_err(|err| RepoError::invalid_input(format!("unserializable payload: {err}")))?;
        Ok(Self {
            job_type,
            dedup_key: dedup_key.into(),
            payload,
        })
    }

    pub fn identity(&self) -> String {
        format!("{}:{}", self.job_type.as_str(), self.dedup_key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled { job_id: String },
    /// A job with the same identity is already pending; nothing was added.
    AlreadyScheduled,
}

/// Job scheduling primitive.
///
/// Implementations must make `schedule_once` / `schedule_recurring` an atomic
/// insert-if-absent on the job identity.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn schedule_once(
        &self,
        job: JobSpec,
        run_at: OffsetDateTime,
    ) -> Result<ScheduleOutcome, RepoError>;

    async fn schedule_recurring(
        &self,
        job: JobSpec,
        first_run: OffsetDateTime,
        interval: Duration,
    ) -> Result<ScheduleOutcome, RepoError>;

    async fn is_scheduled(&self, job: &JobSpec) -> Result<bool, RepoError>;
}

pub trait UrlBuilder: Send + Sync {
    /// Absolute location of one sitemap page.
    fn build_url(&self, sitemap: &SitemapType, page: u32) -> Result<String, RepoError>;
}
