//! Shared domain types for sitemap providers, pages and their entries.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::DomainError;
use super::lastmod::Lastmod;

/// Content category plus an optional refinement, e.g. `posts` / `page`.
///
/// An absent sub-type means the provider serves a single undifferentiated type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SitemapType {
    object_type: String,
    sub_type: Option<String>,
}

impl SitemapType {
    pub fn new(object_type: &str, sub_type: Option<&str>) -> Result<Self, DomainError> {
        let object_type = object_type.trim();
        if object_type.is_empty() {
            return Err(DomainError::validation("object type must not be empty"));
        }
        let sub_type = sub_type
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(Self {
            object_type: object_type.to_string(),
            sub_type,
        })
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn sub_type(&self) -> Option<&str> {
        self.sub_type.as_deref()
    }

    /// Name the catalog should count: the sub-type when present, otherwise the object type.
    pub fn count_target(&self) -> &str {
        self.sub_type.as_deref().unwrap_or(&self.object_type)
    }
}

/// Sub-types a provider declares.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Subtypes {
    /// The provider handles one implicit, undifferentiated type.
    #[default]
    NoSubtypes,
    /// Ordered, de-duplicated list of declared sub-types.
    SubtypeList(Vec<String>),
}

impl Subtypes {
    pub fn list<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered: Vec<String> = Vec::new();
        for name in names {
            let name: String = name.into();
            let name = name.trim().to_string();
            if !name.is_empty() && !ordered.contains(&name) {
                ordered.push(name);
            }
        }
        Self::SubtypeList(ordered)
    }

    pub fn contains(&self, sub_type: &str) -> bool {
        match self {
            Subtypes::NoSubtypes => false,
            Subtypes::SubtypeList(names) => names.iter().any(|name| name == sub_type),
        }
    }

    /// Expand into concrete sitemap types, preserving declaration order.
    pub fn sitemap_types(&self, object_type: &str) -> Result<Vec<SitemapType>, DomainError> {
        match self {
            Subtypes::NoSubtypes => Ok(vec![SitemapType::new(object_type, None)?]),
            Subtypes::SubtypeList(names) => names
                .iter()
                .map(|name| SitemapType::new(object_type, Some(name)))
                .collect(),
        }
    }

    /// Validate a caller-supplied sub-type against the declared set.
    pub fn resolve(
        &self,
        object_type: &str,
        sub_type: Option<&str>,
    ) -> Result<SitemapType, DomainError> {
        let requested = sub_type.map(str::trim).filter(|value| !value.is_empty());
        match (self, requested) {
            (Subtypes::NoSubtypes, None) => SitemapType::new(object_type, None),
            (Subtypes::NoSubtypes, Some(name)) => {
                Err(DomainError::unknown_sub_type(object_type, name))
            }
            (Subtypes::SubtypeList(_), None) => Err(DomainError::validation(format!(
                "object type `{object_type}` requires a sub-type"
            ))),
            (list @ Subtypes::SubtypeList(_), Some(name)) => {
                if list.contains(name) {
                    SitemapType::new(object_type, Some(name))
                } else {
                    Err(DomainError::unknown_sub_type(object_type, name))
                }
            }
        }
    }
}

/// Page count for one sitemap type. Always at least one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapPageDescriptor {
    pub sitemap: SitemapType,
    pub page_count: u32,
}

impl SitemapPageDescriptor {
    pub fn pages(&self) -> RangeInclusive<u32> {
        1..=self.page_count.max(1)
    }
}

/// Final output unit handed to the index/list renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SitemapEntry {
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<Lastmod>,
}

/// An item returned by the content catalog for one sitemap page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub location: String,
    pub modified_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    RecomputeLastmod,
    RefreshSweep,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::RecomputeLastmod => "recompute_lastmod",
            JobType::RefreshSweep => "refresh_sweep",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sub_type_collapses_to_none() {
        let sitemap = SitemapType::new("posts", Some("  ")).expect("valid type");
        assert_eq!(sitemap.sub_type(), None);
        assert_eq!(sitemap.count_target(), "posts");
    }

    #[test]
    fn blank_object_type_is_rejected() {
        assert!(SitemapType::new(" ", None).is_err());
    }

    #[test]
    fn subtype_list_keeps_declaration_order_and_drops_duplicates() {
        let subtypes = Subtypes::list(["post", "page", "post", ""]);
        assert_eq!(
            subtypes,
            Subtypes::SubtypeList(vec!["post".to_string(), "page".to_string()])
        );
        let names: Vec<_> = subtypes
            .sitemap_types("posts")
            .expect("types")
            .into_iter()
            .map(|sitemap| sitemap.count_target().to_string())
            .collect();
        assert_eq!(names, vec!["post", "page"]);
    }

    #[test]
    fn no_subtypes_expands_to_single_implicit_type() {
        let types = Subtypes::NoSubtypes.sitemap_types("users").expect("types");
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].sub_type(), None);
    }

    #[test]
    fn resolve_rejects_undeclared_sub_types() {
        let subtypes = Subtypes::list(["category"]);
        let err = subtypes
            .resolve("taxonomies", Some("post_tag"))
            .expect_err("unknown sub-type");
        assert_eq!(
            err,
            DomainError::unknown_sub_type("taxonomies", "post_tag")
        );

        let err = Subtypes::NoSubtypes
            .resolve("users", Some("admin"))
            .expect_err("provider without sub-types");
        assert!(matches!(err, DomainError::UnknownSubType { .. }));
    }

    #[test]
    fn resolve_accepts_declared_sub_type() {
        let subtypes = Subtypes::list(["category"]);
        let sitemap = subtypes
            .resolve("taxonomies", Some("category"))
            .expect("declared");
        assert_eq!(sitemap.sub_type(), Some("category"));
    }

    #[test]
    fn descriptor_always_exposes_one_page() {
        let descriptor = SitemapPageDescriptor {
            sitemap: SitemapType::new("posts", None).expect("type"),
            page_count: 0,
        };
        assert_eq!(descriptor.pages().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn job_type_names_are_stable() {
        assert_eq!(JobType::RecomputeLastmod.as_str(), "recompute_lastmod");
        assert_eq!(JobType::RefreshSweep.as_str(), "refresh_sweep");
    }
}
