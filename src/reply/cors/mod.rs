//! CORS policy applied by the reply builder.
//!
//! One allowed origin is configured for the whole broker: either an exact
//! origin or the wildcard sentinel `__ALL`. Whether a reply gets CORS headers
//! depends on the API family and the verb:
//!
//! - NGSIv2: every verb
//! - NGSIv1: `GET` only
//! - NGSI-LD and admin paths: never
//!
//! When the request's `Origin` is not allowed, the reply carries no CORS
//! headers at all.

mod builder;
mod error;

pub use builder::{CorsPolicyBuilder, DEFAULT_ALLOWED_HEADERS, DEFAULT_EXPOSE_HEADERS, DEFAULT_MAX_AGE};
pub use error::CorsConfigError;

use smallvec::SmallVec;
use tracing::debug;

use crate::state::{ApiVersion, Verb};

/// Configuration value that allows every origin.
pub const WILDCARD_ORIGIN: &str = "__ALL";

/// Origin validation strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigin {
    /// Any origin; answered with `*`
    Wildcard,
    /// Exact string match; the origin is echoed back
    Exact(String),
}

impl AllowedOrigin {
    /// `Access-Control-Allow-Origin` value for `origin`, if allowed.
    fn allow<'a>(&'a self, origin: &'a str) -> Option<&'a str> {
        match self {
            AllowedOrigin::Wildcard => Some("*"),
            AllowedOrigin::Exact(allowed) if allowed == origin => Some(origin),
            AllowedOrigin::Exact(_) => None,
        }
    }
}

/// Headers a reply receives from [`CorsPolicy::response_headers`].
pub type CorsHeaders = SmallVec<[(&'static str, String); 4]>;

/// Broker-wide CORS policy. Build with [`CorsPolicyBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    pub allowed_origin: AllowedOrigin,
    /// Comma-separated, ready to go on the wire.
    pub expose_headers: String,
    /// Comma-separated, ready to go on the wire.
    pub allowed_headers: String,
    pub max_age: u32,
}

impl CorsPolicy {
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.allowed_origin == AllowedOrigin::Wildcard
    }

    /// Whether the API family serves CORS for this verb.
    #[must_use]
    pub fn applies_to(api_version: ApiVersion, verb: Verb) -> bool {
        match api_version {
            ApiVersion::V2 => true,
            ApiVersion::V1 => verb == Verb::Get,
            ApiVersion::NgsiLdV1 | ApiVersion::Admin => false,
        }
    }

    /// CORS headers for a reply to a request with the given `Origin`.
    ///
    /// Empty when the API family or verb does not take part in CORS, or the
    /// origin is not allowed.
    #[must_use]
    pub fn response_headers(
        &self,
        api_version: ApiVersion,
        verb: Verb,
        origin: &str,
    ) -> CorsHeaders {
        let mut headers = CorsHeaders::new();
        if !Self::applies_to(api_version, verb) {
            return headers;
        }
        let Some(allow) = self.allowed_origin.allow(origin) else {
            debug!(origin, allowed = ?self.allowed_origin, "CORS origin not allowed");
            return headers;
        };

        headers.push(("Access-Control-Allow-Origin", allow.to_string()));
        headers.push(("Access-Control-Expose-Headers", self.expose_headers.clone()));
        if verb == Verb::Options {
            headers.push(("Access-Control-Allow-Headers", self.allowed_headers.clone()));
            headers.push(("Access-Control-Max-Age", self.max_age.to_string()));
        }
        headers
    }
}
