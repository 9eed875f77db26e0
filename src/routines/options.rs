use crate::backend::Backend;
use crate::state::ConnectionState;

/// Verbs served on `/v2/entities`.
const ENTITIES_ALLOW: &str = "GET, OPTIONS";

/// `OPTIONS /v2/entities`: no body, only the `Allow` header.
pub fn options_entities(state: &mut ConnectionState<'_>, _backend: &dyn Backend) -> String {
    state.stage_header("Allow", ENTITIES_ALLOW);
    state.status = 200;
    String::new()
}
