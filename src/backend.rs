//! Storage seam of the service routines.
//!
//! Routines talk to a [`Backend`]; the broker binary and the tests use the
//! in-process [`MemoryBackend`]. Entities, registrations and subscriptions
//! are kept as JSON documents, partitioned by tenant.

use std::fmt;

use dashmap::DashMap;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::state::ProblemKind;

/// Tenant key used when the request carried no tenant.
pub const DEFAULT_TENANT: &str = "";

/// Failure reported by a backend operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub status: u16,
    pub kind: ProblemKind,
    pub details: String,
}

impl BackendError {
    pub fn new(status: u16, kind: ProblemKind, details: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            details: details.into(),
        }
    }

    pub fn not_found(details: impl Into<String>) -> Self {
        Self::new(404, ProblemKind::ResourceNotFound, details)
    }

    pub fn bad_request(details: impl Into<String>) -> Self {
        Self::new(400, ProblemKind::BadRequestData, details)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.details, self.status)
    }
}

impl std::error::Error for BackendError {}

/// Entity query built by `GET /v2/entities`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityQuery {
    /// Regular expression over entity ids.
    pub id_pattern: String,
    /// Exact types; empty means any type.
    pub types: Vec<String>,
    /// Regular expression over entity types. Excludes `types`.
    pub type_pattern: Option<String>,
    /// Service paths to search. Empty means all of them.
    pub service_paths: Vec<String>,
    pub offset: usize,
    pub limit: usize,
}

impl Default for EntityQuery {
    fn default() -> Self {
        Self {
            id_pattern: ".*".to_string(),
            types: Vec::new(),
            type_pattern: None,
            service_paths: Vec::new(),
            offset: 0,
            limit: usize::MAX,
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityPage {
    pub entities: Vec<Value>,
    /// Matches before pagination.
    pub total: usize,
}

/// Body of an NGSIv1 `updateContextSubscription`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    pub subscription_id: String,
    pub duration: Option<String>,
    pub throttling: Option<String>,
}

/// What the service routines need from storage.
pub trait Backend: Send + Sync {
    fn query_entities(&self, tenant: &str, query: &EntityQuery) -> Result<EntityPage, BackendError>;

    /// NGSI-LD context source registration by id.
    fn registration(&self, tenant: &str, id: &str) -> Result<Value, BackendError>;

    /// Apply an update and return the stored subscription.
    fn update_context_subscription(
        &self,
        tenant: &str,
        update: &SubscriptionUpdate,
    ) -> Result<Value, BackendError>;
}

#[derive(Debug, Clone)]
struct StoredEntity {
    service_path: String,
    entity: Value,
}

impl StoredEntity {
    fn field(&self, name: &str) -> &str {
        self.entity.get(name).and_then(Value::as_str).unwrap_or("")
    }
}

/// `/a/#` matches `/a` and everything below it; other paths match exactly.
fn service_path_matches(requested: &str, stored: &str) -> bool {
    match requested.strip_suffix("/#") {
        Some(prefix) => {
            stored == prefix
                || prefix.is_empty()
                || stored
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        }
        None => requested == stored,
    }
}

fn compile(pattern: &str, what: &str) -> Result<Regex, BackendError> {
    Regex::new(pattern).map_err(|err| {
        debug!(pattern, error = %err, "Invalid pattern");
        BackendError::bad_request(format!("invalid regular expression for {what}: {pattern}"))
    })
}

/// In-process backend keyed by tenant.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entities: DashMap<String, Vec<StoredEntity>>,
    registrations: DashMap<(String, String), Value>,
    subscriptions: DashMap<(String, String), Value>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entity. `entity` must carry `id` and `type` members.
    pub fn insert_entity(&self, tenant: &str, service_path: &str, entity: Value) {
        self.entities
            .entry(tenant.to_string())
            .or_default()
            .push(StoredEntity {
                service_path: service_path.to_string(),
                entity,
            });
    }

    pub fn insert_registration(&self, tenant: &str, id: &str, registration: Value) {
        self.registrations
            .insert((tenant.to_string(), id.to_string()), registration);
    }

    pub fn insert_subscription(&self, tenant: &str, id: &str, subscription: Value) {
        self.subscriptions
            .insert((tenant.to_string(), id.to_string()), subscription);
    }
}

impl Backend for MemoryBackend {
    fn query_entities(&self, tenant: &str, query: &EntityQuery) -> Result<EntityPage, BackendError> {
        let id_re = compile(&query.id_pattern, "entity id")?;
        let type_re = query
            .type_pattern
            .as_deref()
            .map(|p| compile(p, "entity type"))
            .transpose()?;

        let Some(stored) = self.entities.get(tenant) else {
            return Ok(EntityPage::default());
        };

        let matching: Vec<&StoredEntity> = stored
            .iter()
            .filter(|e| id_re.is_match(e.field("id")))
            .filter(|e| query.types.is_empty() || query.types.iter().any(|t| t == e.field("type")))
            .filter(|e| type_re.as_ref().map_or(true, |re| re.is_match(e.field("type"))))
            .filter(|e| {
                query.service_paths.is_empty()
                    || query
                        .service_paths
                        .iter()
                        .any(|p| service_path_matches(p, &e.service_path))
            })
            .collect();

        let total = matching.len();
        let entities = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|e| e.entity.clone())
            .collect();
        Ok(EntityPage { entities, total })
    }

    fn registration(&self, tenant: &str, id: &str) -> Result<Value, BackendError> {
        self.registrations
            .get(&(tenant.to_string(), id.to_string()))
            .map(|r| r.value().clone())
            .ok_or_else(|| BackendError::not_found("registration not found"))
    }

    fn update_context_subscription(
        &self,
        tenant: &str,
        update: &SubscriptionUpdate,
    ) -> Result<Value, BackendError> {
        let key = (tenant.to_string(), update.subscription_id.clone());
        let mut subscription = self
            .subscriptions
            .get_mut(&key)
            .ok_or_else(|| BackendError::not_found(""))?;

        if !subscription.is_object() {
            *subscription = Value::Object(Map::new());
        }
        if let Value::Object(fields) = subscription.value_mut() {
            if let Some(duration) = &update.duration {
                fields.insert("duration".into(), Value::String(duration.clone()));
            }
            if let Some(throttling) = &update.throttling {
                fields.insert("throttling".into(), Value::String(throttling.clone()));
            }
        }
        Ok(subscription.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.insert_entity("", "/", json!({"id": "Room1", "type": "Room"}));
        backend.insert_entity("", "/a/b", json!({"id": "Room2", "type": "Room"}));
        backend.insert_entity("", "/a", json!({"id": "Car1", "type": "Car"}));
        backend.insert_entity("acme", "/", json!({"id": "Room9", "type": "Room"}));
        backend
    }

    #[test]
    fn tenants_are_separate() {
        let page = backend().query_entities("acme", &EntityQuery::default()).unwrap();
        assert_eq!(page.total, 1);
        let page = backend().query_entities("other", &EntityQuery::default()).unwrap();
        assert!(page.entities.is_empty());
    }

    #[test]
    fn filters_and_pagination() {
        let backend = backend();
        let query = EntityQuery {
            types: vec!["Room".into()],
            offset: 1,
            limit: 5,
            ..EntityQuery::default()
        };
        let page = backend.query_entities("", &query).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.entities, vec![json!({"id": "Room2", "type": "Room"})]);

        let query = EntityQuery {
            type_pattern: Some("^C".into()),
            ..EntityQuery::default()
        };
        assert_eq!(backend.query_entities("", &query).unwrap().total, 1);
    }

    #[test]
    fn service_path_hierarchy() {
        assert!(service_path_matches("/a/#", "/a"));
        assert!(service_path_matches("/a/#", "/a/b"));
        assert!(!service_path_matches("/a/#", "/ab"));
        assert!(service_path_matches("/#", "/x"));
        assert!(!service_path_matches("/a", "/a/b"));

        let query = EntityQuery {
            service_paths: vec!["/a/#".into()],
            ..EntityQuery::default()
        };
        assert_eq!(backend().query_entities("", &query).unwrap().total, 2);
    }

    #[test]
    fn invalid_pattern_is_bad_request() {
        let query = EntityQuery {
            id_pattern: "(".into(),
            ..EntityQuery::default()
        };
        let err = backend().query_entities("", &query).unwrap_err();
        assert_eq!(err.status, 400);
    }

    #[test]
    fn subscription_update() {
        let backend = MemoryBackend::new();
        backend.insert_subscription("", "S1", json!({"subscriptionId": "S1"}));
        let update = SubscriptionUpdate {
            subscription_id: "S1".into(),
            duration: Some("P1M".into()),
            throttling: None,
        };
        let stored = backend.update_context_subscription("", &update).unwrap();
        assert_eq!(stored["duration"], "P1M");

        let missing = SubscriptionUpdate {
            subscription_id: "nope".into(),
            ..update
        };
        assert_eq!(backend.update_context_subscription("", &missing).unwrap_err().status, 404);
    }
}
