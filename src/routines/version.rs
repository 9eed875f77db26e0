use serde_json::json;

use crate::backend::Backend;
use crate::state::ConnectionState;

/// Name and version reported by `GET /version`.
pub const VERSION_INFO: (&str, &str) = (env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

/// `GET /version`
pub fn version(state: &mut ConnectionState<'_>, _backend: &dyn Backend) -> String {
    state.status = 200;
    json!({
        "orion": {
            "version": VERSION_INFO.1,
            "name": VERSION_INFO.0,
        }
    })
    .to_string()
}
