//! Schema validation for value bundles.
//!
//! A schema reports structured issues (a path into the bundle plus a
//! message). `flatten` folds them into a flat field error map keyed by the
//! top-level field; issues with an empty path are form-level.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{FieldErrorMap, ValueBundle, FORM_ERROR_KEY};

/// When client-side validation runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Only when a submission starts
    #[default]
    OnSubmit,

    /// On every value change
    OnChange,

    /// When a field loses focus
    OnBlur,
}

/// One problem found by a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaIssue {
    /// Path into the bundle; empty for form-level issues
    pub path: Vec<String>,
    pub message: String,
}

impl SchemaIssue {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: field.into().split('.').map(str::to_string).collect(),
            message: message.into(),
        }
    }

    pub fn form(message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
        }
    }
}

/// Something that can check a value bundle
pub trait Schema: Send + Sync {
    fn parse(&self, values: &ValueBundle) -> Result<(), Vec<SchemaIssue>>;
}

/// Issues split into form-level and per-field messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenedIssues {
    pub form_errors: Vec<String>,
    pub field_errors: FieldErrorMap,
}

impl FlattenedIssues {
    /// Field errors plus form-level errors under `FORM_ERROR_KEY`
    pub fn into_error_map(self) -> Option<FieldErrorMap> {
        let mut map = self.field_errors;
        for message in self.form_errors {
            map.push(FORM_ERROR_KEY, message);
        }
        map.normalize()
    }
}

pub fn flatten(issues: &[SchemaIssue]) -> FlattenedIssues {
    let mut flat = FlattenedIssues::default();
    for issue in issues {
        match issue.path.first() {
            Some(field) => flat.field_errors.push(field.clone(), issue.message.clone()),
            None => flat.form_errors.push(issue.message.clone()),
        }
    }
    flat
}

/// Run a schema and return its per-field errors, or `None` when it passes
pub fn validate(schema: &dyn Schema, values: &ValueBundle) -> Option<FieldErrorMap> {
    match schema.parse(values) {
        Ok(()) => None,
        Err(issues) => flatten(&issues).field_errors.normalize(),
    }
}

/// First message the schema reports for a single field
pub fn validate_field(schema: &dyn Schema, values: &ValueBundle, field: &str) -> Option<String> {
    let errors = validate(schema, values)?;
    errors.first(field).map(str::to_string)
}

static NULL: Value = Value::Null;

type CustomCheck = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;
type Refinement = Arc<dyn Fn(&ValueBundle) -> Option<SchemaIssue> + Send + Sync>;

/// Check applied to a single field
#[derive(Clone)]
pub enum Rule {
    /// Present, not null, not blank, not an empty list
    Required(String),
    /// Minimum character count (strings) or item count (lists)
    MinLength(usize, String),
    /// Maximum character count (strings) or item count (lists)
    MaxLength(usize, String),
    Email(String),
    Custom(CustomCheck),
}

impl Rule {
    pub fn required(message: impl Into<String>) -> Self {
        Self::Required(message.into())
    }

    pub fn min_length(min: usize, message: impl Into<String>) -> Self {
        Self::MinLength(min, message.into())
    }

    pub fn max_length(max: usize, message: impl Into<String>) -> Self {
        Self::MaxLength(max, message.into())
    }

    pub fn email(message: impl Into<String>) -> Self {
        Self::Email(message.into())
    }

    pub fn custom(check: impl Fn(&Value) -> Option<String> + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(check))
    }

    fn check(&self, value: &Value) -> Option<String> {
        match self {
            Self::Required(message) => is_blank(value).then(|| message.clone()),
            Self::MinLength(min, message) => {
                length_of(value).filter(|len| len < min).map(|_| message.clone())
            }
            Self::MaxLength(max, message) => {
                length_of(value).filter(|len| len > max).map(|_| message.clone())
            }
            Self::Email(message) => match value.as_str() {
                Some(s) if looks_like_email(s) => None,
                _ => Some(message.clone()),
            },
            Self::Custom(check) => check(value),
        }
    }
}

/// Declarative schema built from per-field rules and whole-form refinements.
///
/// Field names may be dotted (`address.city`) to reach into nested objects;
/// issues for them are reported under the top-level field.
#[derive(Clone, Default)]
pub struct RuleSchema {
    fields: Vec<(String, Vec<Rule>)>,
    refinements: Vec<Refinement>,
}

impl RuleSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.fields.push((name.into(), rules.into_iter().collect()));
        self
    }

    /// Cross-field check; return an issue to fail the bundle
    pub fn refine(
        mut self,
        check: impl Fn(&ValueBundle) -> Option<SchemaIssue> + Send + Sync + 'static,
    ) -> Self {
        self.refinements.push(Arc::new(check));
        self
    }
}

impl Schema for RuleSchema {
    fn parse(&self, values: &ValueBundle) -> Result<(), Vec<SchemaIssue>> {
        let mut issues = Vec::new();

        for (name, rules) in &self.fields {
            let value = lookup(values, name).unwrap_or(&NULL);
            let required = rules.iter().any(|r| matches!(r, Rule::Required(_)));

            // Optional fields that are absent skip their checks
            if !required && is_blank(value) {
                continue;
            }

            for rule in rules {
                if let Some(message) = rule.check(value) {
                    let stop = matches!(rule, Rule::Required(_));
                    issues.push(SchemaIssue::field(name.clone(), message));
                    if stop {
                        break;
                    }
                }
            }
        }

        issues.extend(self.refinements.iter().filter_map(|check| check(values)));

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

fn lookup<'a>(values: &'a ValueBundle, dotted: &str) -> Option<&'a Value> {
    let mut parts = dotted.split('.');
    let mut current = values.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn looks_like_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .map_or(false, |(host, tld)| !host.is_empty() && !tld.is_empty())
}
