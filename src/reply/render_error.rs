//! Error bodies of the legacy (NGSIv1) operations.
//!
//! Each NGSIv1 operation reports errors inside its own response envelope and
//! answers with transport status 200; the real status travels in the body as
//! an `errorCode`, `statusCode` or `responseCode` member. Requests that are not
//! NGSIv1 operations get the generic envelope, and for those the transport
//! status is the error status.

use http::StatusCode;
use serde_json::{json, Map, Value};
use tracing::error;

use crate::state::problem::v2_error_name;
use crate::state::{ApiVersion, ConnectionState, RequestKind};

/// Registration and subscription id reported when the operation failed
/// before one was assigned.
pub const NO_ID: &str = "000000000000000000000000";

type EnvelopeFn = fn(Value) -> Value;

fn error_code(code: Value) -> Value {
    json!({ "errorCode": code })
}

fn registration_error(code: Value) -> Value {
    json!({ "registrationId": NO_ID, "errorCode": code })
}

fn subscription_error(code: Value) -> Value {
    json!({ "subscriptionId": NO_ID, "errorCode": code })
}

fn subscribe_error(code: Value) -> Value {
    json!({ "subscribeError": { "errorCode": code } })
}

fn unsubscribe_status(code: Value) -> Value {
    json!({ "subscriptionId": "", "statusCode": code })
}

fn response_code(code: Value) -> Value {
    json!({ "responseCode": code })
}

/// Envelope builders by operation. Each receives the rendered status code
/// object.
const ENVELOPES: [(RequestKind, EnvelopeFn); 14] = [
    (RequestKind::RegisterContext, registration_error),
    (RequestKind::DiscoverContextAvailability, error_code),
    (RequestKind::SubscribeContextAvailability, subscription_error),
    (RequestKind::UpdateContextAvailabilitySubscription, error_code),
    (RequestKind::Ngsi9SubscriptionsConvOp, error_code),
    (RequestKind::UnsubscribeContextAvailability, unsubscribe_status),
    (RequestKind::NotifyContextAvailability, response_code),
    (RequestKind::QueryContext, error_code),
    (RequestKind::SubscribeContext, subscribe_error),
    (RequestKind::UpdateContextSubscription, subscribe_error),
    (RequestKind::Ngsi10SubscriptionsConvOp, subscribe_error),
    (RequestKind::UnsubscribeContext, unsubscribe_status),
    (RequestKind::UpdateContext, error_code),
    (RequestKind::NotifyContext, response_code),
];

/// Reason phrase the broker uses for a status code.
#[must_use]
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        404 => "No context element found",
        _ => StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown"),
    }
}

/// `{"code": "404", "reasonPhrase": ..., "details": ...}`. Empty details are
/// left out.
#[must_use]
pub fn status_code_json(status: u16, details: &str) -> Value {
    let mut code = Map::new();
    code.insert("code".into(), Value::String(status.to_string()));
    code.insert("reasonPhrase".into(), Value::String(reason_phrase(status).into()));
    if !details.is_empty() {
        code.insert("details".into(), Value::String(details.into()));
    }
    Value::Object(code)
}

/// Generic envelope for requests without an operation-specific one.
fn generic_envelope(api_version: ApiVersion, status: u16, details: &str) -> Value {
    match api_version {
        ApiVersion::V2 => json!({
            "error": v2_error_name(status),
            "description": details,
        }),
        _ => json!({ "orionError": status_code_json(status, details) }),
    }
}

/// Render the error body for the operation matched by the router.
///
/// Resets the transport status to 200 for NGSIv1 operations; for every other
/// request the status becomes `status`.
pub fn render_error(state: &mut ConnectionState<'_>, status: u16, details: &str) -> String {
    let code = status_code_json(status, details);
    state.status = 200;

    let body = match ENVELOPES.iter().find(|(kind, _)| *kind == state.request_kind) {
        Some((_, envelope)) => envelope(code),
        None => {
            error!(
                request_no = state.request_no,
                kind = ?state.request_kind,
                status,
                "Unknown request type, using the generic error envelope"
            );
            state.status = status;
            generic_envelope(state.api_version, status, details)
        }
    };
    body.to_string()
}
