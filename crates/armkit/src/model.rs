//! SDK model view of ARM documents
//!
//! On the wire, most resource attributes live under a `properties`
//! envelope. The vendor SDK models flatten that envelope so attributes sit
//! next to `id`, `location`, `tags` and friends. Module rules speak the
//! flattened view; the REST client converts at the edge.

use serde_json::{Map, Value};

/// Top-level keys that stay outside the `properties` envelope
pub const ENVELOPE_KEYS: &[&str] = &[
    "id",
    "name",
    "type",
    "location",
    "tags",
    "sku",
    "kind",
    "identity",
    "etag",
    "plan",
    "zones",
    "systemData",
    "managedBy",
    "extendedLocation",
];

const PROPERTIES: &str = "properties";

fn is_envelope_key(key: &str) -> bool {
    ENVELOPE_KEYS.contains(&key)
}

/// Lift `properties` entries to the top level.
///
/// Entries whose key collides with an envelope key stay under `properties`.
pub fn flatten(document: Value) -> Value {
    let Value::Object(mut map) = document else {
        return document;
    };
    let Some(Value::Object(properties)) = map.remove(PROPERTIES) else {
        return Value::Object(map);
    };

    let mut kept = Map::new();
    for (key, value) in properties {
        if is_envelope_key(&key) || map.contains_key(&key) {
            kept.insert(key, value);
        } else {
            map.insert(key, value);
        }
    }
    if !kept.is_empty() {
        map.insert(PROPERTIES.to_string(), Value::Object(kept));
    }
    Value::Object(map)
}

/// Wrap every non-envelope key into `properties`.
pub fn unflatten(document: Value) -> Value {
    let Value::Object(map) = document else {
        return document;
    };

    let mut out = Map::new();
    let mut properties = Map::new();
    for (key, value) in map {
        if key == PROPERTIES {
            if let Value::Object(inner) = value {
                properties.extend(inner);
            }
        } else if is_envelope_key(&key) {
            out.insert(key, value);
        } else {
            properties.insert(key, value);
        }
    }
    if !properties.is_empty() {
        out.insert(PROPERTIES.to_string(), Value::Object(properties));
    }
    Value::Object(out)
}

/// `properties.provisioningState` of a wire document (or the flattened key)
pub fn provisioning_state(document: &Value) -> Option<&str> {
    document
        .pointer("/properties/provisioningState")
        .or_else(|| document.get("provisioningState"))
        .and_then(Value::as_str)
}

/// Whether a provisioning state is terminal
pub fn is_terminal_state(state: &str) -> bool {
    matches!(
        state.to_ascii_lowercase().as_str(),
        "succeeded" | "failed" | "canceled" | "cancelled"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_lifts_properties() {
        let wire = json!({
            "id": "/x/eh1",
            "name": "eh1",
            "properties": {"partitionCount": 4, "status": "Active"},
        });
        assert_eq!(
            flatten(wire),
            json!({"id": "/x/eh1", "name": "eh1", "partitionCount": 4, "status": "Active"})
        );
    }

    #[test]
    fn test_unflatten_wraps_attributes() {
        let model = json!({"location": "eastus", "tags": {"a": "b"}, "minimumTlsVersion": "TLS1_2", "sku": {"name": "Standard_LRS"}});
        assert_eq!(
            unflatten(model),
            json!({
                "location": "eastus",
                "tags": {"a": "b"},
                "sku": {"name": "Standard_LRS"},
                "properties": {"minimumTlsVersion": "TLS1_2"},
            })
        );
    }

    #[test]
    fn test_round_trip_keeps_colliding_keys() {
        let wire = json!({"name": "db", "properties": {"name": "inner", "maxSizeBytes": 10}});
        let model = flatten(wire.clone());
        assert_eq!(model, json!({"name": "db", "maxSizeBytes": 10, "properties": {"name": "inner"}}));
        assert_eq!(unflatten(model), json!({"name": "db", "properties": {"name": "inner", "maxSizeBytes": 10}}));
    }

    #[test]
    fn test_empty_properties_are_omitted() {
        assert_eq!(unflatten(json!({"location": "eastus"})), json!({"location": "eastus"}));
        assert_eq!(flatten(json!({"a": 1})), json!({"a": 1}));
    }

    #[test]
    fn test_provisioning_state() {
        let wire = json!({"properties": {"provisioningState": "Updating"}});
        assert_eq!(provisioning_state(&wire), Some("Updating"));
        assert!(!is_terminal_state("Updating"));
        assert!(is_terminal_state("Succeeded"));
        assert!(is_terminal_state("Canceled"));
        assert_eq!(provisioning_state(&json!({})), None);
    }
}
