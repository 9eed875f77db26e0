use super::*;
use crate::backend::Backend;
use crate::state::{ConnectionState, RequestKind, Verb};

fn noop(_state: &mut ConnectionState<'_>, _backend: &dyn Backend) -> String {
    String::new()
}

fn service(verb: Verb, template: &'static str) -> RestService {
    RestService {
        verb,
        template,
        kind: RequestKind::Other,
        routine: noop,
        name: template,
    }
}

fn router() -> Router {
    Router::new(vec![
        service(Verb::Get, "/v2/entities"),
        service(Verb::Post, "/v2/entities"),
        service(Verb::Get, "/v2/entities/*/attrs/*"),
        service(Verb::Get, "/ngsi-ld/v1/csourceRegistrations/*"),
    ])
}

#[test]
fn test_literal_path() {
    let router = router();
    match router.route(Verb::Post, "/v2/entities") {
        RouteResult::Matched(m) => {
            assert_eq!(m.service.verb, Verb::Post);
            assert!(m.wildcards.is_empty());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_wildcards_are_captured_in_order() {
    let router = router();
    match router.route(Verb::Get, "/v2/entities/E1/attrs/temperature") {
        RouteResult::Matched(m) => assert_eq!(m.wildcards.as_slice(), ["E1", "temperature"]),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_wildcard_needs_a_segment() {
    let router = router();
    assert!(matches!(
        router.route(Verb::Get, "/ngsi-ld/v1/csourceRegistrations/"),
        RouteResult::NotFound
    ));
    assert!(matches!(
        router.route(Verb::Get, "/ngsi-ld/v1/csourceRegistrations/a/b"),
        RouteResult::NotFound
    ));
}

#[test]
fn test_other_verb_is_method_not_allowed() {
    let router = router();
    match router.route(Verb::Delete, "/v2/entities") {
        RouteResult::MethodNotAllowed { allowed } => {
            assert_eq!(allowed.as_slice(), [Verb::Get, Verb::Post]);
            assert_eq!(allow_header(&allowed), "GET, POST");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_allowed_verbs_for_unknown_path() {
    let router = router();
    assert!(router.allowed_verbs("/v2/nothing").is_empty());
    assert_eq!(router.allowed_verbs("/v2/entities").len(), 2);
    assert_eq!(router.len(), 4);
}
