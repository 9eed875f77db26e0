use std::io::{self, Read};

use may_minihttp::Request;
use tracing::debug;

/// Owned copy of an inbound request.
///
/// Reading the body consumes the transport request, so everything the
/// pipeline borrows from (method, target, headers, body) is copied here first
/// and the per-request state borrows from this value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRequest {
    pub method: String,
    /// Request target as received, query string included.
    pub target: String,
    /// Header names and values in arrival order. Non-UTF-8 bytes are
    /// replaced.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawRequest {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header, name compared case-insensitively.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Last value of a header, for headers where a repetition overwrites.
    #[must_use]
    pub fn last_header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Copy a `may_minihttp` request, body included.
    pub fn from_request(req: Request) -> io::Result<Self> {
        let method = req.method().to_string();
        let target = req.path().to_string();
        let headers: Vec<(String, String)> = req
            .headers()
            .iter()
            .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
            .collect();

        let mut body = Vec::new();
        req.body().read_to_end(&mut body)?;

        debug!(
            method = %method,
            target = %target,
            header_count = headers.len(),
            body_bytes = body.len(),
            "Request read"
        );
        Ok(Self {
            method,
            target,
            headers,
            body,
        })
    }
}
