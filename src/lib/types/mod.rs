//! Shared data types for metadata extraction.
//! Implemented as newtypes to enforce invariants.

use std::fmt;

use serde::{Serialize, Serializer};
use time::{
    Date, OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description,
};

/// A point in time taken from version-control history.
///
/// Ordering and equality compare the instant, so two timestamps recorded in
/// different offsets still sort chronologically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Timestamp(#[serde(with = "time::serde::rfc3339")] OffsetDateTime);

impl Timestamp {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Accepts RFC 3339 (`git log --format=%aI`), the `%ai` form
    /// `2020-01-01 12:00:00 +0100`, or a bare `YYYY-MM-DD` read as midnight UTC.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
            return Some(Self(dt));
        }

        let git_default = format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute]"
        );
        if let Ok(dt) = OffsetDateTime::parse(s, git_default) {
            return Some(Self(dt));
        }

        Date::parse(s, format_description!("[year]-[month]-[day]"))
            .ok()
            .map(|d| Self(d.midnight().assume_utc()))
    }

    pub fn as_offset_date_time(&self) -> OffsetDateTime {
        self.0
    }

    pub fn as_str(&self) -> String {
        self.0.format(&Rfc3339).unwrap_or_default()
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(value: OffsetDateTime) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

/// Category a post is filed under, as given by its front matter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category(String);

impl Category {
    /// Trims surrounding whitespace; blank input has no category.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
