//! Closed set of content types used inside the broker.
//!
//! A [`MimeType`] is a tag, not a MIME string. Every tag has exactly one short
//! name (used in configuration and logs) and one long form (the IANA media type
//! that goes on the wire). Unknown input never fails: it maps to
//! [`MimeType::NoMimeType`].
//!
//! Note that the long form of [`MimeType::Text`] is `plain/text`, which is what
//! the broker has always produced internally. The reply builder writes
//! `text/plain` on the wire instead; see [`crate::reply`].

use std::fmt;
use std::str::FromStr;

/// Content type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MimeType {
    #[default]
    Json,
    JsonLd,
    GeoJson,
    Text,
    Html,
    MergePatchJson,
    NoMimeType,
}

/// (tag, short name, long name), indexed by discriminant.
const MIME_TABLE: [(MimeType, &str, &str); 7] = [
    (MimeType::Json, "JSON", "application/json"),
    (MimeType::JsonLd, "JSONLD", "application/ld+json"),
    (MimeType::GeoJson, "GEOJSON", "application/geo+json"),
    (MimeType::Text, "TEXT", "plain/text"),
    (MimeType::Html, "HTML", "application/html"),
    (MimeType::MergePatchJson, "MERGEPATCHJSON", "application/merge-patch+json"),
    (MimeType::NoMimeType, "NOMIMETYPE", "NOMIMETYPE"),
];

impl MimeType {
    /// Every tag, in declaration order.
    pub const ALL: [MimeType; 7] = [
        MimeType::Json,
        MimeType::JsonLd,
        MimeType::GeoJson,
        MimeType::Text,
        MimeType::Html,
        MimeType::MergePatchJson,
        MimeType::NoMimeType,
    ];

    /// Short name, e.g. `"MERGEPATCHJSON"`.
    #[must_use]
    pub fn to_short_string(self) -> &'static str {
        MIME_TABLE[self as usize].1
    }

    /// Long (IANA) name, e.g. `"application/ld+json"`.
    #[must_use]
    pub fn to_long_string(self) -> &'static str {
        MIME_TABLE[self as usize].2
    }

    /// Exact match against the short names. Unknown input gives `NoMimeType`.
    #[must_use]
    pub fn from_short_string(s: &str) -> Self {
        MIME_TABLE
            .iter()
            .find(|(_, short, _)| *short == s)
            .map(|(m, _, _)| *m)
            .unwrap_or(MimeType::NoMimeType)
    }

    /// Exact, case-sensitive match against the long names. Unknown input gives `NoMimeType`.
    #[must_use]
    pub fn from_long_string(s: &str) -> Self {
        MIME_TABLE
            .iter()
            .find(|(_, _, long)| *long == s)
            .map(|(m, _, _)| *m)
            .unwrap_or(MimeType::NoMimeType)
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_short_string())
    }
}

impl FromStr for MimeType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(MimeType::from_short_string(s))
    }
}
