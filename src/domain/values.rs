//! Value bundles and field error maps.
//!
//! A value bundle is the set of form field values, keyed by field name.
//! A field error map is keyed the same way and carries the ordered messages
//! for each field that failed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current set of form field values
pub type ValueBundle = Map<String, Value>;

/// Reserved key for errors that belong to the form as a whole
pub const FORM_ERROR_KEY: &str = "_form";

/// Field name -> ordered error messages.
///
/// A map built by this crate never holds a field with zero messages, and an
/// empty map is reported as `None` by every producer (`normalize`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrorMap(BTreeMap<String, Vec<String>>);

impl FieldErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message for a field, keeping insertion order within the field
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Builder-style `push`
    pub fn with(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.push(field, message);
        self
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// First message for a field, the one shown next to the input
    pub fn first(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    /// Form-level messages (stored under `FORM_ERROR_KEY`)
    pub fn form_errors(&self) -> Option<&[String]> {
        self.get(FORM_ERROR_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop fields without messages; an empty result becomes `None`
    pub fn normalize(self) -> Option<Self> {
        let map: BTreeMap<String, Vec<String>> = self
            .0
            .into_iter()
            .filter(|(_, messages)| !messages.is_empty())
            .collect();

        if map.is_empty() {
            None
        } else {
            Some(Self(map))
        }
    }
}

impl FromIterator<(String, Vec<String>)> for FieldErrorMap {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, Vec<String>>> for FieldErrorMap {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self {
        Self(map)
    }
}

impl IntoIterator for FieldErrorMap {
    type Item = (String, Vec<String>);
    type IntoIter = std::collections::btree_map::IntoIter<String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Where a field error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
    /// Reported by the submission handler (or set manually)
    Server,

    /// Produced by client-side schema validation on change/blur
    Validation,
}

/// Error attached to a single field in the form control
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub kind: FieldErrorKind,
    pub message: String,
}

impl FieldError {
    pub fn server(message: impl Into<String>) -> Self {
        Self {
            kind: FieldErrorKind::Server,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: FieldErrorKind::Validation,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_empty_fields() {
        let map: FieldErrorMap = [
            ("email".to_string(), vec!["taken".to_string()]),
            ("name".to_string(), Vec::new()),
        ]
        .into_iter()
        .collect();

        let normalized = map.normalize().unwrap();
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized.first("email"), Some("taken"));
        assert!(normalized.get("name").is_none());
    }

    #[test]
    fn test_normalize_empty_is_none() {
        assert!(FieldErrorMap::new().normalize().is_none());

        let only_empty: FieldErrorMap = [("a".to_string(), Vec::new())].into_iter().collect();
        assert!(only_empty.normalize().is_none());
    }

    #[test]
    fn test_push_keeps_message_order() {
        let map = FieldErrorMap::new()
            .with("password", "too short")
            .with("password", "needs a digit");

        assert_eq!(
            map.get("password").unwrap(),
            &["too short".to_string(), "needs a digit".to_string()]
        );
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let map = FieldErrorMap::new().with("email", "already registered");
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json, serde_json::json!({"email": ["already registered"]}));
    }
}
