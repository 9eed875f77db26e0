//! Content negotiation for the `Accept` and `Content-Type` request headers.
//!
//! Both parsers are lenient: they never reject a request. An unknown `Accept`
//! value means JSON. An unknown `Content-Type` also means JSON, but the raw
//! media type is handed back so the caller can record it and let a later stage
//! decide whether to answer 415.

use crate::mime::MimeType;

/// Media types accepted in `Content-Type`, matched case-sensitively.
const CONTENT_TYPES: [(&str, MimeType); 8] = [
    ("*/*", MimeType::Json),
    ("text/json", MimeType::Json),
    ("application/json", MimeType::Json),
    ("application/ld+json", MimeType::JsonLd),
    ("application/geo+json", MimeType::GeoJson),
    ("application/html", MimeType::Html),
    ("application/merge-patch+json", MimeType::MergePatchJson),
    ("text/plain", MimeType::Text),
];

/// Result of parsing a `Content-Type` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentType<'a> {
    pub mime: MimeType,
    /// Value of a `charset=` parameter, if one was given.
    pub charset: Option<&'a str>,
    /// The trimmed media type when it was not recognized.
    pub invalid: Option<&'a str>,
}

/// Map an `Accept` header value to the outbound content type.
///
/// ```
/// use ngsi_rest::{negotiate::parse_accept_header, MimeType};
///
/// assert_eq!(parse_accept_header("Application/LD+JSON"), MimeType::JsonLd);
/// assert_eq!(parse_accept_header("text/garbage"), MimeType::Json);
/// ```
#[must_use]
pub fn parse_accept_header(value: &str) -> MimeType {
    if value.eq_ignore_ascii_case("application/ld+json") {
        MimeType::JsonLd
    } else {
        // application/json and everything unknown
        MimeType::Json
    }
}

/// Map a `Content-Type` header value to the inbound content type.
///
/// The value is split on the first `;`. Both halves are trimmed and a
/// `charset=` parameter is reported separately.
#[must_use]
pub fn parse_content_type_header(value: &str) -> ContentType<'_> {
    let (media_type, charset) = match value.split_once(';') {
        Some((media_type, params)) => (
            media_type.trim(),
            params.trim().strip_prefix("charset="),
        ),
        None => (value.trim(), None),
    };

    match CONTENT_TYPES.iter().find(|(name, _)| *name == media_type) {
        Some((_, mime)) => ContentType {
            mime: *mime,
            charset,
            invalid: None,
        },
        None => ContentType {
            mime: MimeType::Json,
            charset,
            invalid: Some(media_type),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_is_case_insensitive() {
        assert_eq!(parse_accept_header("application/ld+json"), MimeType::JsonLd);
        assert_eq!(parse_accept_header("APPLICATION/JSON"), MimeType::Json);
    }

    #[test]
    fn accept_defaults_to_json() {
        assert_eq!(parse_accept_header("text/garbage"), MimeType::Json);
        assert_eq!(parse_accept_header("*/*"), MimeType::Json);
        assert_eq!(parse_accept_header(""), MimeType::Json);
    }

    #[test]
    fn content_type_with_charset() {
        let ct = parse_content_type_header("application/json; charset=utf-8");
        assert_eq!(ct.mime, MimeType::Json);
        assert_eq!(ct.charset, Some("utf-8"));
        assert_eq!(ct.invalid, None);
    }

    #[test]
    fn content_type_table() {
        let cases = [
            ("*/*", MimeType::Json),
            ("text/json", MimeType::Json),
            (" application/ld+json ", MimeType::JsonLd),
            ("application/geo+json", MimeType::GeoJson),
            ("application/html", MimeType::Html),
            ("application/merge-patch+json", MimeType::MergePatchJson),
            ("text/plain", MimeType::Text),
        ];
        for (value, expected) in cases {
            let ct = parse_content_type_header(value);
            assert_eq!(ct.mime, expected, "{value}");
            assert!(ct.invalid.is_none(), "{value}");
        }
    }

    #[test]
    fn content_type_is_case_sensitive() {
        let ct = parse_content_type_header("Application/JSON");
        assert_eq!(ct.mime, MimeType::Json);
        assert_eq!(ct.invalid, Some("Application/JSON"));
    }

    #[test]
    fn unknown_content_type_is_reported() {
        let ct = parse_content_type_header("application/xml ; charset=latin1");
        assert_eq!(ct.mime, MimeType::Json);
        assert_eq!(ct.invalid, Some("application/xml"));
        assert_eq!(ct.charset, Some("latin1"));
    }

    #[test]
    fn non_charset_parameter_is_ignored() {
        let ct = parse_content_type_header("text/plain; boundary=x");
        assert_eq!(ct.mime, MimeType::Text);
        assert_eq!(ct.charset, None);
    }
}
