//! # Connection State
//!
//! One [`ConnectionState`] exists per in-flight request. It is created when the
//! request arrives, owned by the coroutine serving that request and passed by
//! `&mut` through every stage of the pipeline:
//!
//! ```text
//! header receiver -> URI params -> service routine -> reply builder -> teardown
//! ```
//!
//! Raw header values are borrowed (`&'r str`) from the request buffers, so the
//! state cannot outlive the request it describes.
//!
//! Validation failures are data, not control flow: a stage that rejects the
//! request calls [`ConnectionState::fail`] and later stages check
//! [`ConnectionState::has_failed`] before doing real work.

pub mod deferred;
pub mod problem;
pub mod uri_params;

pub use deferred::{DeferredHandle, DeferredReleases};
pub use problem::{ProblemDetails, ProblemKind};
pub use uri_params::{UriParamError, UriParamOptions, UriParams};

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::ids::CorrelatorId;
use crate::mime::MimeType;

/// Maximum number of `NGSILD-Scope` entries per request.
pub const SCOPE_CAPACITY: usize = 10;

/// Tenant stored when a tenant header arrives and multitenancy is off.
pub const TENANT_NOT_ENABLED: &str = "tenant-is-not-enabled";

/// Status used for requests whose HTTP method is not supported.
pub const BAD_VERB_STATUS: u16 = 405;

/// Byte budget of the comma-separated error attribute list.
pub const ERROR_ATTRIBUTES_CAPACITY: usize = 512;

const MAX_STAGED_HEADERS: usize = 16;

/// Response headers staged by the pipeline and copied onto the reply.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_STAGED_HEADERS]>;

static REQUEST_NO: AtomicU64 = AtomicU64::new(0);

/// HTTP method of the request, restricted to what the broker serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    /// Anything else. The request is answered with [`BAD_VERB_STATUS`].
    NoVerb,
}

impl Verb {
    /// Case-sensitive, as method names are on the wire.
    #[must_use]
    pub fn parse(method: &str) -> Self {
        match method {
            "GET" => Verb::Get,
            "POST" => Verb::Post,
            "PUT" => Verb::Put,
            "PATCH" => Verb::Patch,
            "DELETE" => Verb::Delete,
            "OPTIONS" => Verb::Options,
            _ => Verb::NoVerb,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
            Verb::Options => "OPTIONS",
            Verb::NoVerb => "NOVERB",
        }
    }
}

/// API family of the request, derived from the URL prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    /// NGSIv1, including the `/ngsi9` and `/ngsi10` operation paths.
    V1,
    V2,
    NgsiLdV1,
    /// `/version`, `/statistics` and other administrative paths.
    Admin,
}

impl ApiVersion {
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let under = |prefix: &str| {
            path.strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        };
        if path.starts_with("/ngsi-ld/") {
            ApiVersion::NgsiLdV1
        } else if under("/v2") {
            ApiVersion::V2
        } else if under("/v1") || under("/ngsi9") || under("/ngsi10") {
            ApiVersion::V1
        } else {
            ApiVersion::Admin
        }
    }

    #[must_use]
    pub fn is_ld(self) -> bool {
        self == ApiVersion::NgsiLdV1
    }
}

/// Legacy operation matched by the router.
///
/// Only the NGSIv1 operations have their own error envelope; every other
/// request is [`RequestKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestKind {
    RegisterContext,
    DiscoverContextAvailability,
    SubscribeContextAvailability,
    UpdateContextAvailabilitySubscription,
    Ngsi9SubscriptionsConvOp,
    UnsubscribeContextAvailability,
    NotifyContextAvailability,
    QueryContext,
    SubscribeContext,
    UpdateContextSubscription,
    Ngsi10SubscriptionsConvOp,
    UnsubscribeContext,
    UpdateContext,
    NotifyContext,
    #[default]
    Other,
}

/// Inbound header values, borrowed from the request.
#[derive(Debug, Clone, Default)]
pub struct Inbound<'r> {
    pub content_type: MimeType,
    /// Raw media type of a `Content-Type` the negotiator did not recognize.
    pub invalid_content_type: Option<&'r str>,
    pub charset: Option<&'r str>,
    pub content_length: usize,
    /// Raw `Accept` value.
    pub accept: Option<&'r str>,
    pub link: Option<&'r str>,
    pub authorization: Option<&'r str>,
    pub x_auth_token: Option<&'r str>,
    pub x_forwarded_for: Option<&'r str>,
    pub x_real_ip: Option<&'r str>,
    pub origin: Option<&'r str>,
    pub prefer: Option<&'r str>,
    pub host: Option<&'r str>,
    pub connection: Option<&'r str>,
    pub user_agent: Option<&'r str>,
    pub expect: Option<&'r str>,
    pub correlator: Option<&'r str>,
    pub ngsiv2_attrs_format: Option<&'r str>,
}

/// What the reply will carry besides the body.
#[derive(Debug, Clone, Default)]
pub struct Outbound {
    /// Negotiated from `Accept`; overridden at reply time for errors and 207.
    pub content_type: MimeType,
    /// Set when the client asked for `application/geo+json`.
    pub accept_geojson: bool,
    pub headers: HeaderVec,
}

/// Per-request aggregate of parsed input and staged output.
#[derive(Debug)]
pub struct ConnectionState<'r> {
    pub api_version: ApiVersion,
    pub verb: Verb,
    /// The method was not one of [`Verb`]'s known methods.
    pub bad_verb: bool,
    pub method: &'r str,
    /// URL path without the query string.
    pub path: &'r str,
    pub query: Option<&'r str>,
    /// Path segments captured by `*` in the matched route template.
    pub wildcards: SmallVec<[&'r str; 2]>,
    pub request_kind: RequestKind,

    pub inbound: Inbound<'r>,
    pub outbound: Outbound,

    pub tenant: Option<Cow<'r, str>>,
    pub link_header_present: bool,
    pub scopes: SmallVec<[&'r str; SCOPE_CAPACITY]>,
    pub service_paths: SmallVec<[&'r str; 4]>,
    pub correlator: Cow<'r, str>,

    uri_params: UriParams<'r>,
    uri_params_parsed: bool,

    /// Parsed request body, if any.
    pub request_payload: Option<serde_json::Value>,

    pub status: u16,
    problem: Option<ProblemDetails>,
    error_attributes: String,
    /// Rendered answer. `Cow::Owned` marks a buffer that the reply builder
    /// must release.
    response_payload: Option<Cow<'r, str>>,

    pub deferred: DeferredReleases,

    pub request_no: u64,
    pub received_at: Instant,
}

impl<'r> ConnectionState<'r> {
    /// Create the state for a request line. `target` is the request target
    /// as received, query string included.
    pub fn new(method: &'r str, target: &'r str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        let verb = Verb::parse(method);
        let bad_verb = verb == Verb::NoVerb;
        let request_no = REQUEST_NO.fetch_add(1, Ordering::Relaxed) + 1;

        if bad_verb {
            debug!(request_no, method, "Unsupported HTTP method");
        }

        Self {
            api_version: ApiVersion::from_path(path),
            verb,
            bad_verb,
            method,
            path,
            query,
            wildcards: SmallVec::new(),
            request_kind: RequestKind::Other,
            inbound: Inbound::default(),
            outbound: Outbound::default(),
            tenant: None,
            link_header_present: false,
            scopes: SmallVec::new(),
            service_paths: SmallVec::new(),
            correlator: Cow::Borrowed(""),
            uri_params: UriParams::default(),
            uri_params_parsed: false,
            request_payload: None,
            status: 200,
            problem: None,
            error_attributes: String::new(),
            response_payload: None,
            deferred: DeferredReleases::new(),
            request_no,
            received_at: Instant::now(),
        }
    }

    /// Record a failure. The first recorded problem wins; later calls are
    /// ignored so that an early 400 is not overwritten.
    pub fn fail(&mut self, status: u16, problem: ProblemDetails) {
        if let Some(existing) = &self.problem {
            debug!(
                request_no = self.request_no,
                kept = %existing.title,
                ignored = %problem.title,
                "Problem already recorded"
            );
            return;
        }
        self.status = status;
        self.problem = Some(problem);
    }

    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.problem.is_some()
    }

    #[must_use]
    pub fn problem(&self) -> Option<&ProblemDetails> {
        self.problem.as_ref()
    }

    #[must_use]
    pub fn is_ld(&self) -> bool {
        self.api_version.is_ld()
    }

    /// Parse the query string once. Invalid values are recorded as a 400
    /// problem; calling this a second time is an error.
    pub fn parse_uri_params(&mut self) -> Result<(), UriParamError> {
        if self.uri_params_parsed {
            return Err(UriParamError::AlreadyParsed);
        }
        self.uri_params_parsed = true;

        let Some(query) = self.query else {
            self.uri_params = UriParams::parse("", self.api_version).unwrap_or_default();
            return Ok(());
        };
        match UriParams::parse(query, self.api_version) {
            Ok(params) => self.uri_params = params,
            Err(problem) => {
                warn!(
                    request_no = self.request_no,
                    title = %problem.title,
                    detail = %problem.detail,
                    "Invalid URI parameter"
                );
                self.fail(400, problem);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn uri_params(&self) -> &UriParams<'r> {
        &self.uri_params
    }

    /// Remember an attribute that failed, for error reporting.
    ///
    /// Names that would push the list past [`ERROR_ATTRIBUTES_CAPACITY`]
    /// bytes are dropped.
    pub fn add_error_attribute(&mut self, name: &str) {
        let separator = usize::from(!self.error_attributes.is_empty());
        if self.error_attributes.len() + separator + name.len() > ERROR_ATTRIBUTES_CAPACITY {
            warn!(request_no = self.request_no, attribute = name, "Error attribute list full");
            return;
        }
        if separator == 1 {
            self.error_attributes.push(',');
        }
        self.error_attributes.push_str(name);
    }

    #[must_use]
    pub fn error_attributes(&self) -> &str {
        &self.error_attributes
    }

    /// Split `Fiware-Servicepath` into its components. NGSI-LD requests
    /// have no service paths.
    pub fn set_service_paths(&mut self, value: &'r str) {
        if self.is_ld() {
            return;
        }
        self.service_paths = value
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
    }

    /// Use the received correlator, or mint one, and stage it for the reply.
    pub fn settle_correlator(&mut self) {
        self.correlator = match self.inbound.correlator {
            Some(received) if !received.is_empty() => Cow::Borrowed(received),
            _ => Cow::Owned(CorrelatorId::new().to_string()),
        };
        let value = self.correlator.to_string();
        self.stage_header("Fiware-Correlator", value);
    }

    /// Queue a header for the reply. Staged headers are copied verbatim.
    pub fn stage_header(&mut self, name: impl Into<Arc<str>>, value: impl Into<String>) {
        self.outbound.headers.push((name.into(), value.into()));
    }

    /// Install a rendered answer that the reply builder must release.
    pub fn set_response_payload(&mut self, payload: String) {
        self.response_payload = Some(Cow::Owned(payload));
    }

    /// Install an answer borrowed from request-lifetime data.
    pub fn set_borrowed_payload(&mut self, payload: &'r str) {
        self.response_payload = Some(Cow::Borrowed(payload));
    }

    #[must_use]
    pub fn response_payload(&self) -> Option<&str> {
        self.response_payload.as_deref()
    }

    /// Whether the current payload is owned and therefore released by the
    /// reply builder.
    #[must_use]
    pub fn response_payload_allocated(&self) -> bool {
        matches!(self.response_payload, Some(Cow::Owned(_)))
    }

    /// Drop the response payload. Returns `true` if an allocated buffer was
    /// released; a second call always returns `false`.
    pub fn release_response_payload(&mut self) -> bool {
        matches!(self.response_payload.take(), Some(Cow::Owned(_)))
    }

    /// End of the request: release everything still deferred. Returns how
    /// many deferred entries were released.
    pub fn teardown(mut self) -> usize {
        self.release_response_payload();
        let released = self.deferred.release_all();
        debug!(
            request_no = self.request_no,
            released,
            elapsed_us = self.received_at.elapsed().as_micros() as u64,
            "Connection state torn down"
        );
        released
    }
}
