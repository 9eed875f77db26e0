//! # Reply Builder
//!
//! Turns the final status and rendered answer of a request into exactly one
//! transport response:
//!
//! 1. copy the answer into an [`OutgoingResponse`]
//! 2. on construction failure: release the payload, log, meter, queue nothing
//! 3. copy the staged headers
//! 4. pick `Content-Type` (after the error and multi-status overrides)
//! 5. add CORS headers per [`cors::CorsPolicy`]
//! 6. queue the response with the state's status
//! 7. release the response payload
//!
//! Queueing goes through the [`ReplySink`] trait so that the builder does not
//! depend on a particular HTTP server.

pub mod cors;
pub mod render_error;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error};

use crate::config::BrokerConfig;
use crate::metrics::MetricsSink;
use crate::mime::MimeType;
use crate::state::{ConnectionState, HeaderVec, BAD_VERB_STATUS};

static REPLIES: AtomicU64 = AtomicU64::new(0);

/// Number of replies attempted since process start.
#[must_use]
pub fn reply_count() -> u64 {
    REPLIES.load(Ordering::Relaxed)
}

/// Failure to construct a transport response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The answer is larger than the transport accepts.
    ResponseTooLarge { size: usize, max: usize },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ResponseTooLarge { size, max } => {
                write!(f, "response of {size} bytes exceeds the maximum of {max} bytes")
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// A response ready to be written: headers and an owned copy of the body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingResponse {
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl OutgoingResponse {
    /// Copy `answer` into a new response.
    pub fn from_answer(answer: &str, max_size: usize) -> Result<Self, TransportError> {
        if answer.len() > max_size {
            return Err(TransportError::ResponseTooLarge {
                size: answer.len(),
                max: max_size,
            });
        }
        Ok(Self {
            headers: HeaderVec::new(),
            body: answer.as_bytes().to_vec(),
        })
    }

    pub fn add_header(&mut self, name: impl Into<Arc<str>>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// First header with this name, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }
}

/// Where finished responses are queued.
pub trait ReplySink {
    fn queue(&mut self, status: u16, response: OutgoingResponse);
}

/// What [`ReplyBuilder::reply`] did with the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Queued { status: u16, bytes: usize },
    /// The transport response could not be built; nothing was queued.
    Dropped,
}

/// `Content-Type` for a non-empty answer, after the overrides were applied.
fn content_type_header(state: &ConnectionState<'_>) -> Option<&'static str> {
    if state.outbound.accept_geojson {
        return Some(MimeType::GeoJson.to_long_string());
    }
    match state.outbound.content_type {
        MimeType::Json => Some(MimeType::Json.to_long_string()),
        MimeType::JsonLd => Some(MimeType::JsonLd.to_long_string()),
        _ if state.inbound.accept == Some("application/ld+json") => {
            Some(MimeType::JsonLd.to_long_string())
        }
        // The codec's long form for TEXT is not a valid media type.
        MimeType::Text => Some("text/plain"),
        _ => None,
    }
}

/// Error and multi-status payloads are never JSON-LD.
fn apply_overrides(state: &mut ConnectionState<'_>) {
    if state.status >= 400 && state.outbound.content_type == MimeType::JsonLd {
        state.outbound.content_type = MimeType::Json;
    }
    if state.status == 207 {
        state.outbound.content_type = MimeType::Json;
    }
}

/// Builds and queues replies. Shared by all request coroutines.
#[derive(Clone)]
pub struct ReplyBuilder {
    config: Arc<BrokerConfig>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl fmt::Debug for ReplyBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyBuilder")
            .field("config", &self.config)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl ReplyBuilder {
    pub fn new(config: Arc<BrokerConfig>) -> Self {
        Self {
            config,
            metrics: None,
        }
    }

    /// Report reply metrics to `metrics`. Ignored when metrics are switched
    /// off in the configuration.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        if self.config.metrics {
            self.metrics = Some(metrics);
        }
        self
    }

    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Metrics sink, for NGSIv1/v2 requests only.
    fn metrics_for(&self, state: &ConnectionState<'_>) -> Option<&dyn MetricsSink> {
        if state.is_ld() {
            return None;
        }
        self.metrics.as_deref()
    }

    /// Emit the reply for `state` with body `answer`.
    pub fn reply<S>(&self, state: &mut ConnectionState<'_>, answer: &str, sink: &mut S) -> ReplyOutcome
    where
        S: ReplySink + ?Sized,
    {
        let reply_no = REPLIES.fetch_add(1, Ordering::Relaxed) + 1;
        let tenant = state.tenant.as_deref().unwrap_or("").to_string();
        let service_path = state.service_paths.first().copied().unwrap_or("");

        let mut response = match OutgoingResponse::from_answer(answer, self.config.max_response_size) {
            Ok(response) => response,
            Err(err) => {
                if let Some(metrics) = self.metrics_for(state) {
                    metrics.transport_in_error(&tenant, service_path);
                }
                error!(
                    request_no = state.request_no,
                    reply_no,
                    error = %err,
                    "Runtime Error (building transport response)"
                );
                state.release_response_payload();
                return ReplyOutcome::Dropped;
            }
        };

        if !answer.is_empty() {
            if let Some(metrics) = self.metrics_for(state) {
                metrics.response_size(&tenant, service_path, answer.len());
            }
        }

        for (name, value) in &state.outbound.headers {
            response.add_header(Arc::clone(name), value.clone());
        }

        if !answer.is_empty() {
            apply_overrides(state);
            if let Some(content_type) = content_type_header(state) {
                response.add_header("Content-Type", content_type);
            }
        }

        if let (Some(cors), Some(origin)) = (&self.config.cors, state.inbound.origin) {
            if !origin.is_empty() && state.status != BAD_VERB_STATUS {
                for (name, value) in cors.response_headers(state.api_version, state.verb, origin) {
                    response.add_header(name, value);
                }
            }
        }

        let status = state.status;
        let bytes = response.body.len();
        debug!(
            request_no = state.request_no,
            reply_no,
            status,
            bytes,
            content_type = response.header("Content-Type").unwrap_or("-"),
            "Reply queued"
        );
        sink.queue(status, response);

        state.release_response_payload();
        ReplyOutcome::Queued { status, bytes }
    }
}
