use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::{repos::RepoError, sitemap::SitemapError},
    config::LoadError,
    domain::error::DomainError,
    infra::error::InfraError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Sitemap(#[from] SitemapError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// This error's message followed by each of its sources.
    pub fn messages(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = self.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        messages.dedup();
        messages
    }

    /// Process exit status: 2 for caller mistakes, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_)
            | AppError::Domain(DomainError::Validation { .. })
            | AppError::Domain(DomainError::UnknownSubType { .. })
            | AppError::Sitemap(SitemapError::Domain(_))
            | AppError::Sitemap(SitemapError::UnknownObjectType(_)) => 2,
            _ => 1,
        }
    }
}
