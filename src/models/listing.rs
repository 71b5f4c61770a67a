//! Draft listing submitted for validation

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Unvalidated listing. Marketplace fields are kept as raw JSON so that
/// anything the caller supplies is submitted untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftListing(Map<String, Value>);

impl DraftListing {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn category_id(&self) -> Option<&str> {
        self.0.get("category_id").and_then(Value::as_str)
    }

    pub fn price(&self) -> Option<f64> {
        self.0.get("price").and_then(Value::as_f64)
    }

    pub fn set_price(&mut self, price: i64) {
        self.0.insert("price".to_string(), json!(price));
    }

    /// Value name of the attribute with `id`, if set.
    pub fn attribute(&self, id: &str) -> Option<&str> {
        self.attributes()?
            .iter()
            .find(|a| a.get("id").and_then(Value::as_str) == Some(id))
            .and_then(|a| a.get("value_name").or_else(|| a.get("value_id")))
            .and_then(Value::as_str)
    }

    fn attributes(&self) -> Option<&Vec<Value>> {
        self.0.get("attributes").and_then(Value::as_array)
    }

    /// Set the attribute `id` to `value_name`, replacing any previous entry.
    pub fn set_attribute(&mut self, id: &str, value_name: &str) {
        let entry = json!({"id": id, "value_name": value_name});
        let attrs = self
            .0
            .entry("attributes")
            .or_insert_with(|| Value::Array(Vec::new()));
        if !attrs.is_array() {
            *attrs = Value::Array(Vec::new());
        }
        if let Value::Array(list) = attrs {
            match list
                .iter()
                .position(|a| a.get("id").and_then(Value::as_str) == Some(id))
            {
                Some(i) => list[i] = entry,
                None => list.push(entry),
            }
        }
    }
}
