//! Infrastructure adapters and runtime bootstrap.

pub mod catalog;
pub mod error;
pub mod jobs;
mod lock;
pub mod options;
pub mod telemetry;
pub mod urls;
pub mod worker;
