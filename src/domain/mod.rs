pub mod error;
pub mod lastmod;
pub mod types;
