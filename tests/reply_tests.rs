mod common;

use std::sync::Arc;

use common::recorder::Recorder;
use ngsi_rest::config::BrokerConfig;
use ngsi_rest::metrics::CounterMetrics;
use ngsi_rest::reply::cors::CorsPolicyBuilder;
use ngsi_rest::{ConnectionState, MimeType, ProblemDetails, ReplyBuilder, ReplyOutcome};

fn cors_config(origin: &str) -> Arc<BrokerConfig> {
    Arc::new(BrokerConfig {
        cors: Some(CorsPolicyBuilder::new().allowed_origin(origin).build().unwrap()),
        ..BrokerConfig::default()
    })
}

#[test]
fn test_ld_error_is_plain_json() {
    let builder = ReplyBuilder::new(Arc::new(BrokerConfig::default()));
    let mut state = ConnectionState::new("GET", "/ngsi-ld/v1/entities/urn:E1");
    state.outbound.content_type = MimeType::JsonLd;
    state.fail(404, ProblemDetails::bad_request("Entity Not Found", "urn:E1"));

    let mut sink = Recorder::default();
    let outcome = builder.reply(&mut state, r#"{"type":"x"}"#, &mut sink);
    assert!(matches!(outcome, ReplyOutcome::Queued { status: 404, .. }));
    assert_eq!(sink.only().1.header("Content-Type"), Some("application/json"));
}

#[test]
fn test_multi_status_is_plain_json() {
    let builder = ReplyBuilder::new(Arc::new(BrokerConfig::default()));
    let mut state = ConnectionState::new("POST", "/ngsi-ld/v1/entityOperations/create");
    state.outbound.content_type = MimeType::JsonLd;
    state.status = 207;

    let mut sink = Recorder::default();
    builder.reply(&mut state, r#"{"success":[],"errors":[]}"#, &mut sink);
    assert_eq!(sink.only().0, 207);
    assert_eq!(sink.only().1.header("Content-Type"), Some("application/json"));
}

#[test]
fn test_geojson_accept_overrides() {
    let builder = ReplyBuilder::new(Arc::new(BrokerConfig::default()));
    let mut state = ConnectionState::new("GET", "/ngsi-ld/v1/entities");
    state.outbound.accept_geojson = true;

    let mut sink = Recorder::default();
    builder.reply(&mut state, "{}", &mut sink);
    assert_eq!(sink.only().1.header("Content-Type"), Some("application/geo+json"));
}

#[test]
fn test_cors_wildcard() {
    let builder = ReplyBuilder::new(cors_config("__ALL"));
    let mut state = ConnectionState::new("GET", "/v2/entities");
    state.inbound.origin = Some("https://a.example");

    let mut sink = Recorder::default();
    builder.reply(&mut state, "[]", &mut sink);
    let response = &sink.only().1;
    assert_eq!(response.header("Access-Control-Allow-Origin"), Some("*"));
    assert!(response
        .header("Access-Control-Expose-Headers")
        .unwrap()
        .contains("Fiware-Correlator"));
    assert!(!response.has_header("Access-Control-Max-Age"));
}

#[test]
fn test_cors_origin_mismatch() {
    let builder = ReplyBuilder::new(cors_config("https://a.example"));
    let mut state = ConnectionState::new("GET", "/v2/entities");
    state.inbound.origin = Some("https://b.example");

    let mut sink = Recorder::default();
    builder.reply(&mut state, "[]", &mut sink);
    assert!(!sink.only().1.has_header("Access-Control-Allow-Origin"));
}

#[test]
fn test_cors_preflight_extras() {
    let builder = ReplyBuilder::new(cors_config("https://a.example"));
    let mut state = ConnectionState::new("OPTIONS", "/v2/entities");
    state.inbound.origin = Some("https://a.example");

    let mut sink = Recorder::default();
    builder.reply(&mut state, "", &mut sink);
    let response = &sink.only().1;
    assert_eq!(response.header("Access-Control-Allow-Origin"), Some("https://a.example"));
    assert_eq!(response.header("Access-Control-Max-Age"), Some("86400"));
    assert!(response.has_header("Access-Control-Allow-Headers"));
}

#[test]
fn test_no_cors_for_ld() {
    let builder = ReplyBuilder::new(cors_config("__ALL"));
    let mut state = ConnectionState::new("GET", "/ngsi-ld/v1/entities");
    state.inbound.origin = Some("https://a.example");

    let mut sink = Recorder::default();
    builder.reply(&mut state, "[]", &mut sink);
    assert!(!sink.only().1.has_header("Access-Control-Allow-Origin"));
}

#[test]
fn test_transport_failure_drops_reply() {
    let config = Arc::new(BrokerConfig {
        max_response_size: 4,
        ..BrokerConfig::default()
    });
    let metrics = Arc::new(CounterMetrics::new());
    let builder = ReplyBuilder::new(config).with_metrics(metrics.clone());

    let mut state = ConnectionState::new("GET", "/v2/entities");
    state.set_response_payload("[1,2,3]".to_string());
    let mut sink = Recorder::default();
    let outcome = builder.reply(&mut state, "[1,2,3]", &mut sink);

    assert_eq!(outcome, ReplyOutcome::Dropped);
    assert!(sink.replies.is_empty());
    assert!(state.response_payload().is_none());
    assert_eq!(metrics.totals().transport_in_errors, 1);
}

#[test]
fn test_response_size_metrics() {
    let metrics = Arc::new(CounterMetrics::new());
    let builder = ReplyBuilder::new(Arc::new(BrokerConfig::default())).with_metrics(metrics.clone());

    let mut state = ConnectionState::new("GET", "/v2/entities");
    let mut sink = Recorder::default();
    builder.reply(&mut state, "[]", &mut sink);
    assert_eq!(metrics.totals().response_bytes, 2);

    let mut state = ConnectionState::new("GET", "/ngsi-ld/v1/entities");
    builder.reply(&mut state, "[]", &mut sink);
    assert_eq!(metrics.totals().response_bytes, 2);
}

#[test]
fn test_metrics_switched_off() {
    let config = Arc::new(BrokerConfig {
        metrics: false,
        ..BrokerConfig::default()
    });
    let metrics = Arc::new(CounterMetrics::new());
    let builder = ReplyBuilder::new(config).with_metrics(metrics.clone());

    let mut state = ConnectionState::new("GET", "/v2/entities");
    let mut sink = Recorder::default();
    builder.reply(&mut state, "[]", &mut sink);
    assert_eq!(metrics.totals().response_bytes, 0);
}
