use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable identifier of an upstream record. Numeric upstream ids are kept in
/// their decimal string form so every resource shares one key type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads an id out of a JSON value. Strings and integers are accepted.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A JSON object of field replacements sent with an update or create.
pub type Patch = Map<String, Value>;

/// An opaque upstream record: a stable id plus whatever fields the backend sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Entity {
    /// Builds an entity from one element of a collection payload.
    /// Returns `None` when the element is not an object or carries no usable id.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut fields) = value else {
            return None;
        };
        let id = fields.remove("id").as_ref().and_then(EntityId::from_value)?;
        Some(Self { id, fields })
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self.fields.get(name) {
            Some(Value::Null) | None => None,
            Some(v) => Some(v),
        }
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Truthiness of a flag field (favorite, archived, ...). Missing is false.
    pub fn flag(&self, name: &str) -> bool {
        match self.field(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => matches!(s.as_str(), "true" | "1"),
            _ => false,
        }
    }

    /// Returns a copy with every patch field replacing the current value.
    /// An `id` key in the patch is ignored; callers reject it earlier.
    pub fn patched(&self, patch: &Patch) -> Self {
        let mut next = self.clone();
        for (key, value) in patch {
            if key == "id" {
                continue;
            }
            next.fields.insert(key.clone(), value.clone());
        }
        next
    }
}

/// Renders a scalar field the way filters and labels compare it.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_accepts_numeric_id() {
        let entity = Entity::from_value(json!({"id": 42, "name": "Sara"})).unwrap();
        assert_eq!(entity.id.as_str(), "42");
        assert_eq!(entity.str_field("name"), Some("Sara"));
        assert!(!entity.fields.contains_key("id"));
    }

    #[test]
    fn test_from_value_rejects_missing_or_blank_id() {
        assert!(Entity::from_value(json!({"name": "x"})).is_none());
        assert!(Entity::from_value(json!({"id": "  "})).is_none());
        assert!(Entity::from_value(json!([1, 2])).is_none());
    }

    #[test]
    fn test_serializes_flat() {
        let entity = Entity::from_value(json!({"id": "7", "status": "NEW"})).unwrap();
        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(value, json!({"id": "7", "status": "NEW"}));
    }

    #[test]
    fn test_patched_ignores_id_and_keeps_original() {
        let entity = Entity::from_value(json!({"id": "1", "x": 1})).unwrap();
        let patch = json!({"id": "9", "x": 2}).as_object().cloned().unwrap();
        let next = entity.patched(&patch);
        assert_eq!(next.id.as_str(), "1");
        assert_eq!(next.field("x"), Some(&json!(2)));
        assert_eq!(entity.field("x"), Some(&json!(1)));
    }

    #[test]
    fn test_null_field_reads_as_missing() {
        let entity = Entity::from_value(json!({"id": "1", "email": null})).unwrap();
        assert!(entity.field("email").is_none());
        assert!(!entity.flag("favorite"));
    }
}
