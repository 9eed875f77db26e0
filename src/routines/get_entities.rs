use serde_json::{Map, Value};
use tracing::debug;

use super::{fail_from_backend, tenant_key};
use crate::backend::{Backend, EntityQuery};
use crate::state::{ConnectionState, ProblemDetails};

const GEOMETRIES: [&str; 4] = ["point", "line", "polygon", "box"];
const GEORELS: [&str; 5] = ["near", "coveredBy", "intersects", "equals", "disjoint"];

/// `GET /v2/entities`
pub fn get_entities(state: &mut ConnectionState<'_>, backend: &dyn Backend) -> String {
    let params = state.uri_params();

    if params.id.is_some() && params.id_pattern.is_some() {
        return reject(state, "Incompatible parameters: id, IdPattern".to_string());
    }
    if params.r#type.is_some() && params.type_pattern.is_some() {
        return reject(state, "Incompatible parameters: type, typePattern".to_string());
    }

    let geometry = params.geometry.as_deref().unwrap_or("");
    let coords = params.coordinates.as_deref().unwrap_or("");
    let georel = params.georel.as_deref().unwrap_or("");
    if !coords.is_empty() && geometry.is_empty() {
        return reject(state, "Invalid query: URI param /coords/ used without /geometry/".to_string());
    }
    if !geometry.is_empty() && coords.is_empty() {
        return reject(state, "Invalid query: URI param /geometry/ used without /coords/".to_string());
    }
    if !georel.is_empty() && geometry.is_empty() {
        return reject(state, "Invalid query: URI param /georel/ used without /geometry/".to_string());
    }
    if !geometry.is_empty() {
        if let Err(reason) = check_geo_scope(geometry, coords, georel) {
            return reject(state, format!("Invalid query: {reason}"));
        }
    }

    let id_pattern = match (&params.id, &params.id_pattern) {
        (Some(ids), _) => ids
            .split(',')
            .map(|id| format!("^{}$", regex::escape(id)))
            .collect::<Vec<_>>()
            .join("|"),
        (None, Some(pattern)) => pattern.to_string(),
        (None, None) => ".*".to_string(),
    };
    let query = EntityQuery {
        id_pattern,
        types: params.types.iter().cloned().collect(),
        type_pattern: params
            .type_pattern
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(str::to_string),
        service_paths: state.service_paths.iter().map(|p| p.to_string()).collect(),
        offset: params.offset as usize,
        limit: params.limit as usize,
    };
    let count = params.count;
    let key_values = params.options.key_values;
    let values = params.options.values;

    let page = match backend.query_entities(tenant_key(state), &query) {
        Ok(page) => page,
        Err(err) => {
            fail_from_backend(state, "Invalid query", err);
            return String::new();
        }
    };
    debug!(
        request_no = state.request_no,
        total = page.total,
        returned = page.entities.len(),
        "Entities found"
    );

    if count {
        state.stage_header("Fiware-Total-Count", page.total.to_string());
    }
    state.status = 200;
    if page.entities.is_empty() {
        return "[]".to_string();
    }

    let rendered: Vec<Value> = page
        .entities
        .into_iter()
        .map(|entity| {
            if values {
                values_only(entity)
            } else if key_values {
                key_values_only(entity)
            } else {
                entity
            }
        })
        .collect();
    Value::Array(rendered).to_string()
}

fn reject(state: &mut ConnectionState<'_>, reason: String) -> String {
    state.fail(400, ProblemDetails::bad_request(reason, ""));
    String::new()
}

/// Attribute objects replaced by their `value` member.
fn key_values_only(entity: Value) -> Value {
    match entity {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(name, attr)| match attr {
                    Value::Object(mut attr) if attr.contains_key("value") => {
                        let value = attr.remove("value").unwrap_or(Value::Null);
                        (name, value)
                    }
                    other => (name, other),
                })
                .collect::<Map<_, _>>(),
        ),
        other => other,
    }
}

/// Attribute values only, in document order.
fn values_only(entity: Value) -> Value {
    match key_values_only(entity) {
        Value::Object(fields) => Value::Array(
            fields
                .into_iter()
                .filter(|(name, _)| name != "id" && name != "type")
                .map(|(_, value)| value)
                .collect(),
        ),
        other => other,
    }
}

/// Format checks for a `geometry`/`coords`/`georel` scope.
fn check_geo_scope(geometry: &str, coords: &str, georel: &str) -> Result<(), String> {
    if !GEOMETRIES.contains(&geometry) {
        return Err(format!("invalid geometry: {geometry}"));
    }

    let mut points = Vec::new();
    for pair in coords.split(';') {
        let (lat, lon) = pair
            .split_once(',')
            .ok_or_else(|| format!("invalid coordinates: {pair}"))?;
        let lat: f64 = lat
            .trim()
            .parse()
            .map_err(|_| format!("invalid coordinates: {pair}"))?;
        let lon: f64 = lon
            .trim()
            .parse()
            .map_err(|_| format!("invalid coordinates: {pair}"))?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(format!("coordinates out of range: {pair}"));
        }
        points.push((lat, lon));
    }

    match geometry {
        "point" if points.len() != 1 => return Err("point geometry needs exactly one coordinate".into()),
        "box" if points.len() != 2 => return Err("box geometry needs exactly two coordinates".into()),
        "line" if points.len() < 2 => return Err("line geometry needs at least two coordinates".into()),
        "polygon" if points.len() < 4 || points.first() != points.last() => {
            return Err("polygon geometry needs at least four coordinates, first and last equal".into())
        }
        _ => {}
    }

    if georel.is_empty() {
        return Ok(());
    }
    let mut tokens = georel.split(';');
    let relation = tokens.next().unwrap_or("");
    if !GEORELS.contains(&relation) {
        return Err(format!("invalid georel: {relation}"));
    }
    if relation == "near" {
        if geometry != "point" {
            return Err("georel /near/ used with a geometry other than point".into());
        }
        let mut distance = false;
        for modifier in tokens {
            let (name, value) = modifier
                .split_once(':')
                .ok_or_else(|| format!("invalid georel modifier: {modifier}"))?;
            if name != "maxDistance" && name != "minDistance" {
                return Err(format!("invalid georel modifier: {modifier}"));
            }
            if value.parse::<f64>().is_err() {
                return Err(format!("invalid distance for /{name}/: {value}"));
            }
            distance = true;
        }
        if !distance {
            return Err("georel /near/ needs maxDistance or minDistance".into());
        }
    }
    Ok(())
}
