//! Writing replies onto `may_minihttp` responses.
//!
//! The transport only takes `&'static str` header lines. Lines of the few
//! headers with a small value set (content type, CORS, `Allow`) are interned
//! in a process-wide cache of [`HEADER_LINE_CAPACITY`] entries. Every other
//! line, and any line arriving once the cache is full, is leaked for the
//! response that carries it. No staged header is ever dropped.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use http::StatusCode;
use may_minihttp::Response;
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::reply::{OutgoingResponse, ReplySink};

/// Distinct header lines kept for the life of the process.
pub const HEADER_LINE_CAPACITY: usize = 8192;

/// Header slots of a `may_minihttp` response.
pub const MAX_RESPONSE_HEADERS: usize = 16;

/// Headers whose lines repeat across requests.
const INTERNED_HEADERS: [&str; 6] = [
    "Content-Type",
    "Allow",
    "Access-Control-Allow-Origin",
    "Access-Control-Expose-Headers",
    "Access-Control-Allow-Headers",
    "Access-Control-Max-Age",
];

/// Bounded cache of `&'static` header lines.
pub struct HeaderLineCache {
    lines: DashMap<String, &'static str>,
    len: AtomicUsize,
    capacity: usize,
}

impl HeaderLineCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: DashMap::new(),
            len: AtomicUsize::new(0),
            capacity,
        }
    }

    /// `&'static` copy of `"{name}: {value}"`.
    // TODO: write owned header lines once the may_minihttp fork accepts them.
    pub fn line(&self, name: &str, value: &str) -> &'static str {
        let line = format!("{name}: {value}");
        if let Some(interned) = self.lines.get(&line) {
            return *interned;
        }
        let internable = INTERNED_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name));
        if !internable || self.len.load(Ordering::Relaxed) >= self.capacity {
            if internable {
                debug!(header = %name, "Header line cache full, writing uncached line");
            }
            return Box::leak(line.into_boxed_str());
        }
        let entry = self.lines.entry(line.clone()).or_insert_with(|| {
            self.len.fetch_add(1, Ordering::Relaxed);
            Box::leak(line.into_boxed_str())
        });
        *entry
    }

    /// Number of interned lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static HEADER_LINES: Lazy<HeaderLineCache> = Lazy::new(|| HeaderLineCache::new(HEADER_LINE_CAPACITY));

/// Header line from the process-wide cache.
pub fn header_line(name: &str, value: &str) -> &'static str {
    HEADER_LINES.line(name, value)
}

/// Reason phrase of the status line.
#[must_use]
pub fn status_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

/// [`ReplySink`] over a `may_minihttp` response.
pub struct ResponseSink<'a> {
    res: &'a mut Response,
    queued: bool,
}

impl<'a> ResponseSink<'a> {
    pub fn new(res: &'a mut Response) -> Self {
        Self { res, queued: false }
    }

    /// Whether a reply was written.
    #[must_use]
    pub fn queued(&self) -> bool {
        self.queued
    }
}

impl ReplySink for ResponseSink<'_> {
    fn queue(&mut self, status: u16, response: OutgoingResponse) {
        self.res.status_code(usize::from(status), status_reason(status));
        for (ix, (name, value)) in response.headers.iter().enumerate() {
            if ix == MAX_RESPONSE_HEADERS {
                warn!(dropped = response.headers.len() - ix, "Too many response headers");
                break;
            }
            self.res.header(header_line(name, value));
        }
        self.res.body_vec(response.body);
        self.queued = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(405), "Method Not Allowed");
        assert_eq!(status_reason(207), "Multi-Status");
        assert_eq!(status_reason(799), "Unknown");
    }

    #[test]
    fn header_lines_are_interned() {
        let a = header_line("Content-Type", "application/json");
        let b = header_line("Content-Type", "application/json");
        assert_eq!(a, "Content-Type: application/json");
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn one_off_lines_are_not_cached() {
        let cache = HeaderLineCache::new(4);
        let line = cache.line("Fiware-Correlator", "01J0000000000000000000000A");
        assert_eq!(line, "Fiware-Correlator: 01J0000000000000000000000A");
        assert!(cache.is_empty());
    }

    #[test]
    fn full_cache_still_writes_new_lines() {
        let cache = HeaderLineCache::new(4);
        for i in 0..4 {
            cache.line("Allow", &format!("GET{i}"));
        }
        assert_eq!(cache.len(), 4);

        assert_eq!(cache.line("Content-Type", "text/plain"), "Content-Type: text/plain");
        assert_eq!(cache.line("Fiware-Correlator", "NEW"), "Fiware-Correlator: NEW");
        assert_eq!(cache.len(), 4);
        assert!(std::ptr::eq(cache.line("Allow", "GET0"), cache.line("Allow", "GET0")));
    }
}
