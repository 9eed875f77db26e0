use ngsi_rest::config::BrokerConfig;
use ngsi_rest::state::{ProblemKind, TENANT_NOT_ENABLED};
use ngsi_rest::{receive_header, ConnectionState, HeaderAck, MimeType};

fn multitenant() -> BrokerConfig {
    BrokerConfig {
        multitenancy: true,
        ..BrokerConfig::default()
    }
}

#[test]
fn test_scope_is_split() {
    let config = BrokerConfig::default();
    let mut state = ConnectionState::new("GET", "/ngsi-ld/v1/entities");
    let ack = receive_header(&mut state, &config, "NGSILD-Scope", "/a,/b, /c");
    assert_eq!(ack, HeaderAck::Continue);
    assert_eq!(state.scopes.as_slice(), ["/a", "/b", "/c"]);
    assert!(!state.has_failed());
}

#[test]
fn test_too_many_scopes() {
    let config = BrokerConfig::default();
    let value = (0..11).map(|i| format!("/s{i}")).collect::<Vec<_>>().join(",");
    let mut state = ConnectionState::new("GET", "/ngsi-ld/v1/entities");
    receive_header(&mut state, &config, "ngsild-scope", &value);

    assert!(state.scopes.is_empty());
    assert_eq!(state.status, 400);
    let problem = state.problem().unwrap();
    assert_eq!(problem.kind, ProblemKind::BadRequestData);
    assert!(problem.title.contains("/NGSILD-Scope/"));
}

#[test]
fn test_ten_scopes_fit() {
    let config = BrokerConfig::default();
    let value = (0..10).map(|i| format!("/s{i}")).collect::<Vec<_>>().join(",");
    let mut state = ConnectionState::new("GET", "/ngsi-ld/v1/entities");
    receive_header(&mut state, &config, "NGSILD-Scope", &value);
    assert_eq!(state.scopes.len(), 10);
    assert!(!state.has_failed());
}

#[test]
fn test_ld_tenant_without_multitenancy() {
    let config = BrokerConfig::default();
    let mut state = ConnectionState::new("GET", "/ngsi-ld/v1/entities");
    receive_header(&mut state, &config, "NGSILD-Tenant", "acme");

    assert_eq!(state.status, 400);
    assert_eq!(state.problem().unwrap().title, "Tenants not supported");
    assert_eq!(state.tenant.as_deref(), Some(TENANT_NOT_ENABLED));
}

#[test]
fn test_legacy_tenant_without_multitenancy() {
    let config = BrokerConfig::default();
    let mut state = ConnectionState::new("GET", "/v2/entities");
    receive_header(&mut state, &config, "Fiware-Service", "acme");

    assert!(!state.has_failed());
    assert_eq!(state.tenant.as_deref(), Some(TENANT_NOT_ENABLED));
}

#[test]
fn test_tenant_is_lowercased() {
    let config = multitenant();
    let mut state = ConnectionState::new("GET", "/v2/entities");
    receive_header(&mut state, &config, "Fiware-Service", "AcMe");
    assert_eq!(state.tenant.as_deref(), Some("acme"));

    let mut state = ConnectionState::new("GET", "/ngsi-ld/v1/entities");
    receive_header(&mut state, &config, "NGSILD-Tenant", "acme");
    assert_eq!(state.tenant.as_deref(), Some("acme"));
    assert!(!state.has_failed());
}

#[test]
fn test_accept_and_content_type() {
    let config = BrokerConfig::default();
    let mut state = ConnectionState::new("POST", "/ngsi-ld/v1/entities");
    receive_header(&mut state, &config, "Accept", "application/ld+json");
    receive_header(&mut state, &config, "Content-Type", "application/json; charset=utf-8");

    assert_eq!(state.outbound.content_type, MimeType::JsonLd);
    assert_eq!(state.inbound.content_type, MimeType::Json);
    assert_eq!(state.inbound.charset, Some("utf-8"));
    assert!(state.inbound.invalid_content_type.is_none());
}

#[test]
fn test_geojson_accept() {
    let config = BrokerConfig::default();
    let mut state = ConnectionState::new("GET", "/ngsi-ld/v1/entities");
    receive_header(&mut state, &config, "Accept", "application/geo+json");
    assert!(state.outbound.accept_geojson);
}

#[test]
fn test_unknown_content_type_is_kept() {
    let config = BrokerConfig::default();
    let mut state = ConnectionState::new("POST", "/v2/entities");
    receive_header(&mut state, &config, "Content-Type", "application/xml");
    assert_eq!(state.inbound.invalid_content_type, Some("application/xml"));
    assert!(!state.has_failed());
}

#[test]
fn test_plain_headers_are_stored() {
    let config = BrokerConfig::default();
    let mut state = ConnectionState::new("GET", "/v2/entities");
    receive_header(&mut state, &config, "x-auth-token", "secret");
    receive_header(&mut state, &config, "ORIGIN", "https://a.example");
    receive_header(&mut state, &config, "Link", "<https://ctx.example>");
    receive_header(&mut state, &config, "X-Unknown", "ignored");

    assert_eq!(state.inbound.x_auth_token, Some("secret"));
    assert_eq!(state.inbound.origin, Some("https://a.example"));
    assert!(state.link_header_present);
    assert!(!state.has_failed());
}

#[test]
fn test_content_length_leading_digits() {
    let config = BrokerConfig::default();
    let mut state = ConnectionState::new("POST", "/v2/entities");
    receive_header(&mut state, &config, "Content-Length", "12abc");
    assert_eq!(state.inbound.content_length, 12);

    receive_header(&mut state, &config, "content-length", "abc");
    assert_eq!(state.inbound.content_length, 0);
    assert!(!state.has_failed());
}
