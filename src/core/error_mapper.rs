//! Interpretation of submission results.
//!
//! The orchestrator never looks inside a result itself. It asks an
//! `ErrorMapper` whether the result carries field errors; `None` means the
//! submission succeeded.

use serde::Serialize;
use serde_json::Value;

use crate::domain::FieldErrorMap;

/// Extracts field errors from a submission result
pub trait ErrorMapper<R>: Send + Sync {
    fn map(&self, result: &R) -> Option<FieldErrorMap>;
}

impl<R, F> ErrorMapper<R> for F
where
    F: Fn(&R) -> Option<FieldErrorMap> + Send + Sync,
{
    fn map(&self, result: &R) -> Option<FieldErrorMap> {
        (self)(result)
    }
}

/// Recognizes the conventional `{"errors": {field: [messages]}}` shape.
///
/// A single string is accepted in place of a message list. Any other result
/// shape, or an empty `errors` object, counts as success.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorMapper;

impl<R: Serialize> ErrorMapper<R> for DefaultErrorMapper {
    fn map(&self, result: &R) -> Option<FieldErrorMap> {
        let value = serde_json::to_value(result).ok()?;
        errors_from_value(&value)
    }
}

/// Read an `errors` object out of a JSON result
pub fn errors_from_value(value: &Value) -> Option<FieldErrorMap> {
    let errors = value.get("errors")?.as_object()?;

    let mut map = FieldErrorMap::new();
    for (field, messages) in errors {
        match messages {
            Value::String(message) => map.push(field.clone(), message.clone()),
            Value::Array(items) => {
                for message in items.iter().filter_map(Value::as_str) {
                    map.push(field.clone(), message);
                }
            }
            _ => {}
        }
    }

    map.normalize()
}
