//! Plain-data export and import through `serde_json::Value`.
//!
//! An instance becomes an object keyed by field name. Nested instances become
//! nested objects, Lists become arrays. A Choice holding an instance is
//! tagged with its type name (`{"Leaf": {...}}`) so it can be loaded back.
//! Processing-instruction fields are not exported.

use crate::error::{Error, Result};
use crate::model::{Entry, Instance, Value};
use crate::node::{FieldDescriptor, NodeKind};
use crate::registry;
use crate::schema::TypeDescriptor;
use serde_json::{Map, Value as JsonValue, json};
use std::sync::Arc;

pub fn to_dict(instance: &Instance) -> JsonValue {
    let mut map = Map::new();
    for field in instance.descriptor().fields() {
        if field.is_header() {
            continue;
        }
        let value = instance.get(field.name()).unwrap_or(&Value::Null);
        let tag_objects = matches!(field.kind(), NodeKind::Choice { .. });
        map.insert(field.name().to_string(), export_value(value, tag_objects));
    }
    JsonValue::Object(map)
}

fn export_value(value: &Value, tag_objects: bool) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Integer(i) => json!(i),
        Value::Object(obj) => export_object(obj, tag_objects),
        Value::List(_) | Value::Mixed(_) | Value::Entries(_) => JsonValue::Array(
            value
                .items()
                .iter()
                .map(|entry| match entry {
                    Entry::Text(s) => JsonValue::String(s.clone()),
                    Entry::Object(obj) => export_object(obj, tag_objects),
                })
                .collect(),
        ),
        Value::Pairs(pairs) => JsonValue::Array(
            pairs
                .iter()
                .map(|(k, v)| json!([k, v]))
                .collect(),
        ),
    }
}

fn export_object(obj: &Instance, tagged: bool) -> JsonValue {
    if tagged {
        let mut map = Map::new();
        map.insert(obj.type_name().to_string(), to_dict(obj));
        JsonValue::Object(map)
    } else {
        to_dict(obj)
    }
}

/// Build an instance of `ty` from the shape produced by [`to_dict`]. Keys
/// missing from `data` keep their defaults.
pub fn from_dict(ty: &Arc<TypeDescriptor>, data: &JsonValue) -> Result<Instance> {
    let JsonValue::Object(map) = data else {
        return Err(Error::ParseFailure(format!(
            "expected an object for '{}', got {}",
            ty.name(),
            data
        )));
    };
    let mut instance = Instance::new(ty)?;
    for (key, raw) in map {
        let field = ty.field(key).ok_or_else(|| {
            Error::NamingError(format!("'{}' has no field named '{}'", ty.name(), key))
        })?;
        if field.is_header() {
            continue;
        }
        let value = import_value(field, raw)?;
        instance.set(key, value)?;
    }
    Ok(instance)
}

fn import_value(field: &FieldDescriptor, raw: &JsonValue) -> Result<Value> {
    match (field.kind(), raw) {
        (_, JsonValue::Null) => Ok(Value::Null),
        (NodeKind::Item { item_type }, obj @ JsonValue::Object(_)) => {
            let item_ty = registry::resolve(field.registry(), item_type)?;
            Ok(Value::from(from_dict(&item_ty, obj)?))
        }
        (NodeKind::List { item_type }, JsonValue::Array(items)) => {
            let item_ty = registry::resolve(field.registry(), item_type)?;
            let entries = items
                .iter()
                .map(|item| match item {
                    JsonValue::String(s) => Ok(Entry::Text(s.clone())),
                    other => from_dict(&item_ty, other).map(Entry::Object),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Entries(entries))
        }
        (NodeKind::Choice { .. }, JsonValue::Array(items)) => {
            let entries = items
                .iter()
                .map(|item| match import_choice(field, item)? {
                    Value::Object(obj) => Ok(Entry::Object(*obj)),
                    Value::Text(s) => Ok(Entry::Text(s)),
                    other => Err(Error::TypeMismatch {
                        field: field.name().to_string(),
                        value: other.repr(),
                    }),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Entries(entries))
        }
        (NodeKind::Choice { .. }, item) => import_choice(field, item),
        (_, JsonValue::String(s)) => Ok(Value::Text(s.clone())),
        (_, JsonValue::Number(n)) => n.as_i64().map(Value::Integer).ok_or_else(|| {
            Error::TypeMismatch {
                field: field.name().to_string(),
                value: n.to_string(),
            }
        }),
        (_, other) => Err(Error::TypeMismatch {
            field: field.name().to_string(),
            value: other.to_string(),
        }),
    }
}

/// `"text"` or `{"TypeName": {...}}`.
fn import_choice(field: &FieldDescriptor, item: &JsonValue) -> Result<Value> {
    match item {
        JsonValue::String(s) => Ok(Value::Text(s.clone())),
        JsonValue::Object(map) if map.len() == 1 => {
            let Some((type_name, inner)) = map.iter().next() else {
                return Ok(Value::Null);
            };
            let alt_ty = registry::resolve(field.registry(), type_name)?;
            Ok(Value::from(from_dict(&alt_ty, inner)?))
        }
        other => Err(Error::TypeMismatch {
            field: field.name().to_string(),
            value: other.to_string(),
        }),
    }
}
