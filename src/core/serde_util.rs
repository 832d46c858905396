//! Lenient deserializers for loosely-typed dashboard payloads.
//!
//! Upstream records are not validated by the producer, so numeric fields
//! may arrive as numbers, numeric strings or null, and collections may hold
//! the odd malformed row. These helpers normalize at the boundary so the
//! rest of the crate works with typed records.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

/// Reads a JSON number or numeric string as `f64`. Anything else is absent.
pub(crate) fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value))
}

pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts `"2024"` as well as `2024`.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string or number, got {other}"
        ))),
    }
}

/// Accepts a JSON array of strings, a JSON-encoded array inside a string, or null.
pub(crate) fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(Value::String(encoded)) => match serde_json::from_str::<Vec<Value>>(&encoded) {
            Ok(items) => items,
            Err(_) if encoded.trim().is_empty() => Vec::new(),
            Err(_) => vec![Value::String(encoded)],
        },
        _ => Vec::new(),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}

/// Parses each element of a JSON array on its own, dropping rows that fail.
pub(crate) fn records_from_value<T: DeserializeOwned>(value: Value) -> Vec<T> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!(index, error = %e, "Dropping malformed record");
                    None
                }
            })
            .collect(),
        Value::Null => Vec::new(),
        other => {
            debug!(kind = %value_kind(&other), "Expected an array of records");
            Vec::new()
        }
    }
}

/// `null` or missing stays `None`; any other value becomes a (possibly empty) list.
pub(crate) fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(records_from_value))
}

pub(crate) fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(records_from_value).unwrap_or_default())
}

pub(crate) fn lenient_object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match serde_json::from_value(v) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(error = %e, "Ignoring malformed object");
            None
        }
    }))
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Row {
        code: String,
        #[serde(default, deserialize_with = "lenient_f64")]
        amount: Option<f64>,
    }

    #[test]
    fn test_number_from_value() {
        assert_eq!(number_from_value(&json!(4.5)), Some(4.5));
        assert_eq!(number_from_value(&json!(" 12 ")), Some(12.0));
        assert_eq!(number_from_value(&json!("n/a")), None);
        assert_eq!(number_from_value(&json!(null)), None);
        assert_eq!(number_from_value(&json!(true)), None);
    }

    #[test]
    fn test_records_from_value_drops_malformed_rows() {
        let rows: Vec<Row> = records_from_value(json!([
            {"code": "A", "amount": "3.5"},
            {"amount": 1.0},
            {"code": "C", "amount": null},
            {"code": "D", "amount": "lots"}
        ]));

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].amount, Some(3.5));
        assert_eq!(rows[1].code, "C");
        assert!(rows[1].amount.is_none());
        assert!(rows[2].amount.is_none());
    }

    #[test]
    fn test_records_from_non_array_is_empty() {
        let rows: Vec<Row> = records_from_value(json!({"code": "A"}));
        assert!(rows.is_empty());
    }

    #[test]
    fn test_string_list_accepts_encoded_arrays() {
        #[derive(Deserialize)]
        struct Lists {
            #[serde(default, deserialize_with = "string_list")]
            plain: Vec<String>,
            #[serde(default, deserialize_with = "string_list")]
            encoded: Vec<String>,
            #[serde(default, deserialize_with = "string_list")]
            missing: Vec<String>,
        }

        let lists: Lists = serde_json::from_value(json!({
            "plain": ["China", "Mexico"],
            "encoded": "[\"Steel\", \"Aluminum\"]"
        }))
        .unwrap();

        assert_eq!(lists.plain, vec!["China", "Mexico"]);
        assert_eq!(lists.encoded, vec!["Steel", "Aluminum"]);
        assert!(lists.missing.is_empty());
    }
}
