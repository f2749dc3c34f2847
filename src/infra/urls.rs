use url::Url;

use crate::application::repos::{RepoError, UrlBuilder};
use crate::domain::types::SitemapType;

use super::error::InfraError;

/// Builds `<base>/sitemap-<object_type>[-<sub_type>]-<page>.xml`.
#[derive(Debug, Clone)]
pub struct SitemapUrlBuilder {
    base: Url,
}

impl SitemapUrlBuilder {
    pub fn new(base: &str) -> Result<Self, InfraError> {
        let normalized = normalize_base_url(base);
        let base = Url::parse(&normalized).map_err(|err| {
            InfraError::configuration(format!("invalid sitemap base url `{base}`: {err}"))
        })?;
        if base.cannot_be_a_base() {
            return Err(InfraError::configuration(format!(
                "sitemap base url `{normalized}` cannot carry a path"
            )));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }
}

impl UrlBuilder for SitemapUrlBuilder {
    fn build_url(&self, sitemap: &SitemapType, page: u32) -> Result<String, RepoError> {
        let file = match sitemap.sub_type() {
            Some(sub_type) => format!("sitemap-{}-{sub_type}-{page}.xml", sitemap.object_type()),
            None => format!("sitemap-{}-{page}.xml", sitemap.object_type()),
        };
        self.base
            .join(&file)
            .map(String::from)
            .map_err(|err| RepoError::invalid_input(format!("cannot build `{file}`: {err}")))
    }
}

fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    format!("{trimmed}/")
}
