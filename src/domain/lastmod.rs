//! Last-modified timestamps as stored in the option store and emitted in sitemaps.
//!
//! Values are always normalized to UTC, truncated to whole seconds and written in
//! the W3C datetime profile (`YYYY-MM-DDThh:mm:ss+00:00`), so a value survives a
//! write and a read unchanged. An absent lastmod is modelled as
//! `Option<Lastmod>::None`; there is no sentinel value, so the Unix epoch is a
//! perfectly ordinary timestamp.

use std::fmt;

use serde::{Serialize, Serializer};
use time::{
    OffsetDateTime, UtcOffset,
    format_description::{FormatItem, well_known::Rfc3339},
    macros::format_description,
};

use super::error::DomainError;

const W3C_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]+00:00");

/// Years a four-digit W3C datetime can carry.
const MIN_YEAR: i32 = 0;
const MAX_YEAR: i32 = 9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lastmod(OffsetDateTime);

impl Lastmod {
    pub fn new(value: OffsetDateTime) -> Result<Self, DomainError> {
        let utc = value
            .checked_to_offset(UtcOffset::UTC)
            .ok_or_else(|| DomainError::validation("lastmod is out of range in UTC"))?;
        if !(MIN_YEAR..=MAX_YEAR).contains(&utc.year()) {
            return Err(DomainError::validation(format!(
                "lastmod year {} is outside {MIN_YEAR}..={MAX_YEAR}",
                utc.year()
            )));
        }
        let whole_seconds = utc
            .replace_nanosecond(0)
            .map_err(|err| DomainError::validation(format!("invalid lastmod: {err}")))?;
        Ok(Self(whole_seconds))
    }

    pub fn as_datetime(&self) -> OffsetDateTime {
        self.0
    }

    /// Parse a persisted value. Accepts any RFC 3339 timestamp and normalizes it to UTC.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("lastmod value is empty"));
        }
        let value = OffsetDateTime::parse(trimmed, &Rfc3339).map_err(|err| {
            DomainError::validation(format!("invalid lastmod `{trimmed}`: {err}"))
        })?;
        Self::new(value)
    }

    pub fn to_w3c(&self) -> Result<String, DomainError> {
        self.0
            .format(W3C_FORMAT)
            .map_err(|err| DomainError::validation(format!("cannot format lastmod: {err}")))
    }
}

impl TryFrom<OffsetDateTime> for Lastmod {
    type Error = DomainError;

    fn try_from(value: OffsetDateTime) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Lastmod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self.to_w3c().map_err(|_| fmt::Error)?;
        f.write_str(&formatted)
    }
}

impl Serialize for Lastmod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted = self.to_w3c().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}
