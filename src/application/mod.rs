//! Application services: pagination, entry assembly and the recompute jobs.

pub mod error;
pub mod jobs;
pub mod pagination;
pub mod repos;
pub mod sitemap;
