//! Field-level access shared by every record type.
//!
//! Derived views address record fields by name because the sort key and the
//! search columns are chosen at runtime by the presentation layer.

use serde_json::Value;
use std::borrow::Cow;

/// A single field value as seen by derived-view code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Number(f64),
    Text(&'a str),
}

impl<'a> FieldValue<'a> {
    /// Numeric reading of the value; text counts when it parses as a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(t) => t.trim().parse::<f64>().ok(),
        }
        .filter(|n| !n.is_nan())
    }

    pub fn as_text(&self) -> Cow<'a, str> {
        match self {
            FieldValue::Number(n) => Cow::Owned(n.to_string()),
            FieldValue::Text(t) => Cow::Borrowed(t),
        }
    }
}

/// A record whose fields can be looked up by name.
pub trait Record {
    /// Fields searched by free-text queries, in priority order.
    const SEARCH_FIELDS: &'static [&'static str];

    fn field(&self, name: &str) -> Option<FieldValue<'_>>;
}

pub(crate) fn field_from_value(value: &Value) -> Option<FieldValue<'_>> {
    match value {
        Value::Number(n) => n.as_f64().map(FieldValue::Number),
        Value::String(s) => Some(FieldValue::Text(s)),
        _ => None,
    }
}

pub(crate) fn number(value: Option<f64>) -> Option<FieldValue<'static>> {
    value.map(FieldValue::Number)
}

pub(crate) fn text(value: Option<&str>) -> Option<FieldValue<'_>> {
    value.map(FieldValue::Text)
}

impl Record for Value {
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "code", "id"];

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        self.get(name).and_then(field_from_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_record_fields() {
        let record = json!({"name": "Canada", "value": 12.5, "flag": true});

        assert_eq!(record.field("name"), Some(FieldValue::Text("Canada")));
        assert_eq!(record.field("value"), Some(FieldValue::Number(12.5)));
        assert_eq!(record.field("flag"), None);
        assert_eq!(record.field("missing"), None);
    }

    #[test]
    fn test_field_value_as_number() {
        assert_eq!(FieldValue::Text(" 7.25").as_number(), Some(7.25));
        assert_eq!(FieldValue::Text("seven").as_number(), None);
        assert_eq!(FieldValue::Number(3.0).as_number(), Some(3.0));
        assert_eq!(FieldValue::Number(f64::NAN).as_number(), None);
    }
}
