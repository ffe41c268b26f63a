//! Schema-checking wrapper around another submitter.
//!
//! The wrapped handler only sees bundles that pass the schema. Failures
//! come back as `{"success": false, "errors": {...}}` with form-level
//! messages under `_form`, so the default error mapper picks them up. The
//! schema is also exposed for the form to reuse on the client side.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::Submitter;
use crate::core::validation::{flatten, Schema};
use crate::domain::ValueBundle;

pub struct Validated<S> {
    schema: Arc<dyn Schema>,
    inner: S,
}

/// Check bundles against `schema` before handing them to `inner`
pub fn validated<S>(schema: Arc<dyn Schema>, inner: S) -> Validated<S>
where
    S: Submitter<Value>,
{
    Validated { schema, inner }
}

#[async_trait]
impl<S> Submitter<Value> for Validated<S>
where
    S: Submitter<Value>,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn submit(&self, data: &ValueBundle) -> Result<Value> {
        if let Err(issues) = self.schema.parse(data) {
            debug!(issues = issues.len(), "Rejected by attached schema");
            let errors = flatten(&issues).into_error_map().unwrap_or_default();
            return Ok(json!({ "success": false, "errors": errors }));
        }

        self.inner.submit(data).await
    }

    fn schema(&self) -> Option<Arc<dyn Schema>> {
        Some(Arc::clone(&self.schema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::submit_fn;
    use crate::core::validation::{Rule, RuleSchema, SchemaIssue};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn login_schema() -> Arc<dyn Schema> {
        Arc::new(
            RuleSchema::new()
                .field("email", [Rule::email("Invalid email")])
                .field("password", [Rule::min_length(8, "At least 8 characters")])
                .refine(|values| {
                    (values.get("email") == values.get("password"))
                        .then(|| SchemaIssue::form("Email and password must differ"))
                }),
        )
    }

    #[tokio::test]
    async fn test_invalid_bundle_never_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let action = validated(
            login_schema(),
            submit_fn(move |_data: ValueBundle| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(json!({"success": true})) }
            }),
        );

        let data = json!({"email": "x", "password": "x"}).as_object().cloned().unwrap();
        let result = action.submit(&data).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(result["success"], false);
        assert_eq!(result["errors"]["email"], json!(["Invalid email"]));
        assert_eq!(result["errors"]["password"], json!(["At least 8 characters"]));
        assert_eq!(result["errors"]["_form"], json!(["Email and password must differ"]));
    }

    #[tokio::test]
    async fn test_valid_bundle_passes_through() {
        let action = validated(
            login_schema(),
            submit_fn(|data: ValueBundle| async move { Ok(json!({"success": true, "user": data["email"]})) }),
        );

        let data = json!({"email": "a@b.co", "password": "hunter22"}).as_object().cloned().unwrap();
        let result = action.submit(&data).await.unwrap();

        assert_eq!(result, json!({"success": true, "user": "a@b.co"}));
        assert!(action.schema().is_some());
    }
}
