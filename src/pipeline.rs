//! # Request Pipeline
//!
//! Runs one request from raw input to queued reply:
//!
//! 1. create the [`ConnectionState`]
//! 2. visit every header ([`receive_header`]), then split the service path
//!    and settle the correlator
//! 3. answer unsupported methods with 405 and an `Allow` header
//! 4. parse the URI parameters
//! 5. route the request
//! 6. parse a JSON payload
//! 7. run the service routine
//! 8. render the error body for the request's API family
//! 9. hand status and answer to the [`ReplyBuilder`]
//! 10. tear the state down
//!
//! Every stage after a recorded failure is skipped except the error rendering
//! and the reply. The pipeline knows nothing about sockets: the transport
//! hands in a [`RawRequest`] and a [`ReplySink`].

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::config::BrokerConfig;
use crate::headers::receive_header;
use crate::metrics::MetricsSink;
use crate::mime::MimeType;
use crate::reply::render_error::render_error;
use crate::reply::{ReplyBuilder, ReplyOutcome, ReplySink};
use crate::router::{allow_header, AllowedVerbs, RouteResult, Router};
use crate::routines;
use crate::server::request::RawRequest;
use crate::state::{ApiVersion, ConnectionState, ProblemDetails, ProblemKind, BAD_VERB_STATUS};

/// Everything shared by the requests of one server.
#[derive(Clone)]
pub struct Pipeline {
    router: Arc<Router>,
    replies: ReplyBuilder,
    backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("services", &self.router.len())
            .field("replies", &self.replies)
            .finish()
    }
}

impl Pipeline {
    /// Pipeline over the broker's service table.
    pub fn new(config: Arc<BrokerConfig>, backend: Arc<dyn Backend>) -> Self {
        Self::with_router(config, backend, Router::new(routines::services()))
    }

    pub fn with_router(config: Arc<BrokerConfig>, backend: Arc<dyn Backend>, router: Router) -> Self {
        Self {
            router: Arc::new(router),
            replies: ReplyBuilder::new(config),
            backend,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.replies = self.replies.with_metrics(metrics);
        self
    }

    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        self.replies.config()
    }

    /// Serve one request.
    pub fn process<S>(&self, request: &RawRequest, sink: &mut S) -> ReplyOutcome
    where
        S: ReplySink + ?Sized,
    {
        let config = self.replies.config();
        let mut state = ConnectionState::new(&request.method, &request.target);

        for (name, value) in &request.headers {
            receive_header(&mut state, config, name, value);
        }
        if let Some(service_path) = request.last_header_value("Fiware-Servicepath") {
            state.set_service_paths(service_path);
        }
        state.settle_correlator();

        info!(
            request_no = state.request_no,
            method = state.method,
            path = state.path,
            api = ?state.api_version,
            correlator = %state.correlator,
            "Request received"
        );

        if state.bad_verb {
            let allowed = self.router.allowed_verbs(state.path);
            method_not_allowed(&mut state, &allowed);
        }

        if let Err(err) = state.parse_uri_params() {
            error!(request_no = state.request_no, error = %err, "URI parameters");
        }

        let mut routine = None;
        if !state.has_failed() {
            match self.router.route(state.verb, state.path) {
                RouteResult::Matched(matched) => {
                    state.wildcards = matched.wildcards;
                    state.request_kind = matched.service.kind;
                    routine = Some(matched.service.routine);
                }
                RouteResult::MethodNotAllowed { allowed } => method_not_allowed(&mut state, &allowed),
                RouteResult::NotFound => service_not_found(&mut state),
            }
        }

        if !state.has_failed() && !request.body.is_empty() {
            ingest_payload(&mut state, &request.body);
        }

        let mut answer = String::new();
        if let Some(routine) = routine.filter(|_| !state.has_failed()) {
            answer = routine(&mut state, self.backend.as_ref());
        }
        if state.has_failed() && answer.is_empty() {
            answer = error_body(&mut state);
        }

        let outcome = self.replies.reply(&mut state, &answer, sink);
        if let ReplyOutcome::Queued { status, bytes } = outcome {
            info!(
                request_no = state.request_no,
                status,
                bytes,
                duration_us = state.received_at.elapsed().as_micros() as u64,
                "Request completed"
            );
        }
        state.teardown();
        outcome
    }
}

fn method_not_allowed(state: &mut ConnectionState<'_>, allowed: &AllowedVerbs) {
    warn!(
        request_no = state.request_no,
        method = state.method,
        path = state.path,
        "Method not allowed"
    );
    if !allowed.is_empty() {
        state.stage_header("Allow", allow_header(allowed));
    }
    let method = state.method;
    state.fail(
        BAD_VERB_STATUS,
        ProblemDetails::new(ProblemKind::OperationNotSupported, "Method not allowed", method),
    );
}

fn service_not_found(state: &mut ConnectionState<'_>) {
    let path = state.path;
    if state.is_ld() {
        state.fail(
            404,
            ProblemDetails::new(ProblemKind::ResourceNotFound, "Service Not Found", path),
        );
    } else {
        state.fail(
            400,
            ProblemDetails::new(ProblemKind::InvalidRequest, "Service not found", path),
        );
    }
}

/// Media types a JSON payload may be sent as.
const PAYLOAD_TYPES: [MimeType; 4] = [
    MimeType::Json,
    MimeType::JsonLd,
    MimeType::GeoJson,
    MimeType::MergePatchJson,
];

fn ingest_payload(state: &mut ConnectionState<'_>, body: &[u8]) {
    if let Some(invalid) = state.inbound.invalid_content_type {
        state.fail(
            415,
            ProblemDetails::new(ProblemKind::InvalidRequest, "Unsupported Media Type", invalid),
        );
        return;
    }
    let content_type = state.inbound.content_type;
    if !PAYLOAD_TYPES.contains(&content_type) {
        state.fail(
            415,
            ProblemDetails::new(
                ProblemKind::InvalidRequest,
                "Unsupported Media Type",
                content_type.to_long_string(),
            ),
        );
        return;
    }

    match serde_json::from_slice(body) {
        Ok(payload) => {
            debug!(request_no = state.request_no, bytes = body.len(), "Payload parsed");
            state.request_payload = Some(payload);
        }
        Err(err) => {
            warn!(request_no = state.request_no, error = %err, "Payload is not valid JSON");
            state.fail(
                400,
                ProblemDetails::new(ProblemKind::InvalidRequest, "JSON Parse Error", err.to_string()),
            );
        }
    }
}

/// Error body for a failed request, in its API family's format.
fn error_body(state: &mut ConnectionState<'_>) -> String {
    let Some(problem) = state.problem().cloned() else {
        return String::new();
    };
    let status = state.status;
    match state.api_version {
        ApiVersion::NgsiLdV1 => problem.to_json().to_string(),
        ApiVersion::V2 => problem.to_v2_json(status).to_string(),
        ApiVersion::V1 | ApiVersion::Admin => render_error(state, status, &problem.description()),
    }
}
