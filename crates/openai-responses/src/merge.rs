//! Building resources from layered JSON fields.
//!
//! Every response is assembled from three shallow layers: computed defaults,
//! the partial object a test supplied, and the request body. Later layers
//! win, so the request always beats the test's partial and the partial
//! always beats the defaults. Request keys set to `null` mean "unchanged"
//! and are dropped before merging.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{MockError, Result};

/// A JSON object.
pub type Fields = Map<String, Value>;

/// The object inside `value`, or an empty object for anything else.
pub fn object(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// Drop top-level keys whose value is `null`.
pub fn strip_nulls(mut fields: Fields) -> Fields {
    fields.retain(|_, v| !v.is_null());
    fields
}

/// Merge `defaults`, then `partial`, then `request` (nulls dropped).
pub fn merge_layers(defaults: Fields, partial: &Fields, request: Fields) -> Fields {
    let mut merged = defaults;
    for (key, value) in partial {
        merged.insert(key.clone(), value.clone());
    }
    for (key, value) in strip_nulls(request) {
        merged.insert(key, value);
    }
    merged
}

/// Validate merged fields into a typed resource.
pub fn build<T: DeserializeOwned>(kind: &'static str, fields: Fields) -> Result<T> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| MockError::Unbuildable {
        kind,
        message: e.to_string(),
    })
}

/// Serialize a resource into its fields.
pub fn to_fields<T: Serialize>(resource: &T) -> Result<Fields> {
    match serde_json::to_value(resource)? {
        Value::Object(map) => Ok(map),
        other => Err(MockError::Serialization(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Layer `partial` and then `request` over an existing resource.
pub fn update<T: Serialize + DeserializeOwned>(
    kind: &'static str,
    existing: &T,
    partial: &Fields,
    request: Fields,
) -> Result<T> {
    build(kind, merge_layers(to_fields(existing)?, partial, request))
}

/// Layer a test partial over a resource.
pub fn merge_with_partial<T: Serialize + DeserializeOwned>(
    kind: &'static str,
    resource: &T,
    partial: &Fields,
) -> Result<T> {
    update(kind, resource, partial, Fields::new())
}
