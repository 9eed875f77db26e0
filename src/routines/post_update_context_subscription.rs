use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::tenant_key;
use crate::backend::{Backend, SubscriptionUpdate};
use crate::reply::render_error::{render_error, status_code_json};
use crate::state::ConnectionState;

/// `POST /v1/updateContextSubscription`
///
/// Errors travel inside `subscribeError` with transport status 200.
pub fn post_update_context_subscription(state: &mut ConnectionState<'_>, backend: &dyn Backend) -> String {
    let update = match subscription_update(state.request_payload.as_ref()) {
        Ok(update) => update,
        Err(details) => {
            warn!(request_no = state.request_no, details, "Bad updateContextSubscription payload");
            return render_error(state, 400, details);
        }
    };

    state.status = 200;
    match backend.update_context_subscription(tenant_key(state), &update) {
        Ok(stored) => {
            debug!(request_no = state.request_no, subscription = %update.subscription_id, "Subscription updated");
            let mut response = Map::new();
            response.insert("subscriptionId".into(), Value::String(update.subscription_id));
            for field in ["duration", "throttling"] {
                if let Some(value) = stored.get(field) {
                    response.insert(field.into(), value.clone());
                }
            }
            json!({ "subscribeResponse": response }).to_string()
        }
        Err(err) => json!({
            "subscribeError": {
                "subscriptionId": update.subscription_id,
                "errorCode": status_code_json(err.status, &err.details),
            }
        })
        .to_string(),
    }
}

fn subscription_update(payload: Option<&Value>) -> Result<SubscriptionUpdate, &'static str> {
    let payload = payload.ok_or("payload is missing")?;
    let text = |name: &str| -> Result<Option<String>, &'static str> {
        match payload.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err("string value expected"),
        }
    };
    let subscription_id = text("subscriptionId")?
        .filter(|id| !id.is_empty())
        .ok_or("subscriptionId is missing")?;
    Ok(SubscriptionUpdate {
        subscription_id,
        duration: text("duration")?,
        throttling: text("throttling")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::state::RequestKind;

    fn state_with(payload: Option<Value>) -> ConnectionState<'static> {
        let mut state = ConnectionState::new("POST", "/v1/updateContextSubscription");
        state.request_kind = RequestKind::UpdateContextSubscription;
        state.request_payload = payload;
        state
    }

    #[test]
    fn updates_known_subscription() {
        let backend = MemoryBackend::new();
        backend.insert_subscription("", "S1", json!({}));
        let mut state = state_with(Some(json!({"subscriptionId": "S1", "duration": "PT1H"})));
        let answer: Value = serde_json::from_str(&post_update_context_subscription(&mut state, &backend)).unwrap();
        assert_eq!(state.status, 200);
        assert_eq!(
            answer,
            json!({"subscribeResponse": {"subscriptionId": "S1", "duration": "PT1H"}})
        );
    }

    #[test]
    fn unknown_subscription_in_envelope() {
        let mut state = state_with(Some(json!({"subscriptionId": "S9"})));
        let answer: Value =
            serde_json::from_str(&post_update_context_subscription(&mut state, &MemoryBackend::new())).unwrap();
        assert_eq!(state.status, 200);
        assert_eq!(answer["subscribeError"]["subscriptionId"], "S9");
        assert_eq!(answer["subscribeError"]["errorCode"]["code"], "404");
    }

    #[test]
    fn missing_payload() {
        let mut state = state_with(None);
        let answer: Value =
            serde_json::from_str(&post_update_context_subscription(&mut state, &MemoryBackend::new())).unwrap();
        assert_eq!(state.status, 200);
        assert_eq!(answer["subscribeError"]["errorCode"]["details"], "payload is missing");
    }
}
