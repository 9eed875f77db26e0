//! Header receiver: called once per inbound header.
//!
//! Names are matched case-insensitively. Values are stored by reference into
//! the [`ConnectionState`]; the few headers with real semantics (scope,
//! tenant, content negotiation) are validated here. A header that is rejected
//! records a 400 problem on the state, and the remaining headers are still
//! visited.

use std::borrow::Cow;

use tracing::{debug, warn};

use crate::config::BrokerConfig;
use crate::negotiate::{parse_accept_header, parse_content_type_header};
use crate::state::{ConnectionState, ProblemDetails, SCOPE_CAPACITY, TENANT_NOT_ENABLED};

/// Answer of the receiver to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderAck {
    Continue,
}

/// Header values that must never reach the logs.
const CREDENTIAL_HEADERS: [&str; 2] = ["authorization", "x-auth-token"];

/// Visit one header.
pub fn receive_header<'r>(
    state: &mut ConnectionState<'r>,
    config: &BrokerConfig,
    name: &str,
    value: &'r str,
) -> HeaderAck {
    let is = |known: &str| name.eq_ignore_ascii_case(known);

    if CREDENTIAL_HEADERS.iter().any(|&c| is(c)) {
        debug!(request_no = state.request_no, header = name, "Header received");
    } else {
        debug!(request_no = state.request_no, header = name, value, "Header received");
    }

    if is("NGSILD-Scope") {
        scope_header(state, value);
    } else if is("Ngsiv2-AttrsFormat") {
        state.inbound.ngsiv2_attrs_format = Some(value);
    } else if is("X-Auth-Token") {
        state.inbound.x_auth_token = Some(value);
    } else if is("Fiware-Correlator") {
        state.inbound.correlator = Some(value);
    } else if is("Expect") {
        state.inbound.expect = Some(value);
    } else if is("User-Agent") {
        state.inbound.user_agent = Some(value);
    } else if is("Host") {
        state.inbound.host = Some(value);
    } else if is("Connection") {
        state.inbound.connection = Some(value);
    } else if is("Origin") {
        state.inbound.origin = Some(value);
    } else if is("Prefer") {
        state.inbound.prefer = Some(value);
    } else if is("Link") {
        state.inbound.link = Some(value);
        state.link_header_present = true;
    } else if is("Authorization") {
        state.inbound.authorization = Some(value);
    } else if is("X-Real-IP") {
        state.inbound.x_real_ip = Some(value);
    } else if is("X-Forwarded-For") {
        state.inbound.x_forwarded_for = Some(value);
    } else if is("Fiware-Servicepath") {
        // split later, once the API version is final
    } else if is("Content-Type") {
        let content_type = parse_content_type_header(value);
        state.inbound.content_type = content_type.mime;
        state.inbound.charset = content_type.charset;
        if let Some(invalid) = content_type.invalid {
            debug!(request_no = state.request_no, content_type = invalid, "Unrecognized Content-Type");
            state.inbound.invalid_content_type = Some(invalid);
        }
    } else if is("Content-Length") {
        state.inbound.content_length = leading_digits(value);
    } else if is("Accept") {
        state.inbound.accept = Some(value);
        state.outbound.content_type = parse_accept_header(value);
        state.outbound.accept_geojson = value.trim().eq_ignore_ascii_case("application/geo+json");
    } else if is("NGSILD-Tenant") || is("Fiware-Service") {
        state.tenant = Some(tenant_header(state, config, value));
    }

    HeaderAck::Continue
}

/// Split `NGSILD-Scope` on `,`. More than [`SCOPE_CAPACITY`] entries reject
/// the header; nothing beyond the capacity is stored.
fn scope_header<'r>(state: &mut ConnectionState<'r>, value: &'r str) {
    state.scopes.clear();
    if value.is_empty() {
        return;
    }
    for token in value.split(',') {
        if state.scopes.len() == SCOPE_CAPACITY {
            warn!(request_no = state.request_no, "Bad Input (too many scopes)");
            state.scopes.clear();
            state.fail(
                400,
                ProblemDetails::bad_request("Bad value for HTTP header /NGSILD-Scope/", value),
            );
            return;
        }
        state.scopes.push(token.trim());
    }
}

fn tenant_header<'r>(
    state: &mut ConnectionState<'r>,
    config: &BrokerConfig,
    value: &'r str,
) -> Cow<'r, str> {
    if config.multitenancy {
        return if value.bytes().any(|b| b.is_ascii_uppercase()) {
            Cow::Owned(value.to_ascii_lowercase())
        } else {
            Cow::Borrowed(value)
        };
    }

    if state.is_ld() {
        warn!(
            request_no = state.request_no,
            "tenant in use but tenant support is not enabled for the broker"
        );
        state.fail(
            400,
            ProblemDetails::bad_request(
                "Tenants not supported",
                "tenant in use but tenant support is not enabled for the broker",
            ),
        );
    }
    Cow::Borrowed(TENANT_NOT_ENABLED)
}

/// `atoi`: optional whitespace, then the longest run of digits. Anything
/// unparsable is 0.
fn leading_digits(value: &str) -> usize {
    let trimmed = value.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().unwrap_or(0)
}
