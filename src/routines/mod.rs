//! Service routines and the broker's service table.
//!
//! A routine runs after the request passed header, URI parameter and payload
//! checks. It either returns the rendered answer, or records a problem on the
//! state and returns an empty string so that the pipeline renders the error
//! body for the request's API family.

mod get_entities;
mod get_registration;
mod options;
mod post_update_context_subscription;
mod version;

pub use get_entities::get_entities;
pub use get_registration::get_registration;
pub use options::options_entities;
pub use post_update_context_subscription::post_update_context_subscription;
pub use version::{version, VERSION_INFO};

use crate::backend::{BackendError, DEFAULT_TENANT};
use crate::router::RestService;
use crate::state::{ConnectionState, ProblemDetails, RequestKind, Verb, TENANT_NOT_ENABLED};

/// Services answered by the broker, in match order.
#[must_use]
pub fn services() -> Vec<RestService> {
    vec![
        RestService {
            verb: Verb::Get,
            template: "/v2/entities",
            kind: RequestKind::Other,
            routine: get_entities,
            name: "getEntities",
        },
        RestService {
            verb: Verb::Options,
            template: "/v2/entities",
            kind: RequestKind::Other,
            routine: options_entities,
            name: "optionsEntities",
        },
        RestService {
            verb: Verb::Get,
            template: "/ngsi-ld/v1/csourceRegistrations/*",
            kind: RequestKind::Other,
            routine: get_registration,
            name: "getRegistration",
        },
        RestService {
            verb: Verb::Post,
            template: "/v1/updateContextSubscription",
            kind: RequestKind::UpdateContextSubscription,
            routine: post_update_context_subscription,
            name: "postUpdateContextSubscription",
        },
        RestService {
            verb: Verb::Post,
            template: "/ngsi10/updateContextSubscription",
            kind: RequestKind::UpdateContextSubscription,
            routine: post_update_context_subscription,
            name: "postUpdateContextSubscription",
        },
        RestService {
            verb: Verb::Get,
            template: "/version",
            kind: RequestKind::Other,
            routine: version,
            name: "version",
        },
    ]
}

/// Backend partition of the request's tenant.
pub(crate) fn tenant_key<'a>(state: &'a ConnectionState<'_>) -> &'a str {
    match state.tenant.as_deref() {
        None | Some(TENANT_NOT_ENABLED) => DEFAULT_TENANT,
        Some(tenant) => tenant,
    }
}

/// Record a backend failure on the state.
pub(crate) fn fail_from_backend(state: &mut ConnectionState<'_>, title: &str, err: BackendError) {
    state.fail(err.status, ProblemDetails::new(err.kind, title, err.details));
}
