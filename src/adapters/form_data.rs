//! Conversions between value bundles and flat form-data pairs.

use serde_json::Value;

use crate::domain::ValueBundle;

/// Build a bundle from form pairs. Repeated keys collect into an array.
pub fn form_pairs_to_values<I, K, V>(pairs: I) -> ValueBundle
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut values = ValueBundle::new();

    for (key, value) in pairs {
        let key = key.into();
        let value = Value::String(value.into());

        match values.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                values.insert(key, value);
            }
        }
    }

    values
}

/// Flatten a bundle into form pairs.
///
/// Arrays become one pair per item, nulls are skipped, strings are sent
/// as-is and every other value is sent as its JSON text.
pub fn values_to_form_pairs(values: &ValueBundle) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for (key, value) in values {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|item| !item.is_null()) {
                    pairs.push((key.clone(), stringify(item)));
                }
            }
            other => pairs.push((key.clone(), stringify(other))),
        }
    }

    pairs
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
