use tracing::error;

use super::tenant_key;
use crate::backend::Backend;
use crate::state::{ConnectionState, ProblemDetails};

/// `GET /ngsi-ld/v1/csourceRegistrations/{registrationId}`
pub fn get_registration(state: &mut ConnectionState<'_>, backend: &dyn Backend) -> String {
    let Some(id) = state.wildcards.first().copied() else {
        state.fail(
            400,
            ProblemDetails::bad_request("Missing registration id", state.path),
        );
        return String::new();
    };

    match backend.registration(tenant_key(state), id) {
        Ok(registration) => {
            state.status = 200;
            registration.to_string()
        }
        Err(err) => {
            error!(request_no = state.request_no, registration = id, error = %err, "Registration lookup failed");
            state.fail(err.status, ProblemDetails::new(err.kind, err.details, id));
            String::new()
        }
    }
}
