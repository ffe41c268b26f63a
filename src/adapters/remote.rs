//! Remote action adapter: submits value bundles to an HTTP endpoint.
//!
//! Endpoint: POST <endpoint>
//! Body: JSON object, or URL-encoded form pairs
//! Auth: optional Bearer token
//!
//! In form encoding the previous result travels back to the server in the
//! `__prev_state` field, so the handler can build on it.

use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{values_to_form_pairs, Submitter};
use crate::core::validation::Schema;
use crate::domain::ValueBundle;

/// Form field carrying the previous result in form encoding
pub const PREV_STATE_FIELD: &str = "__prev_state";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Request body encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Json,
    Form,
}

impl FromStr for Encoding {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "form" => Ok(Self::Form),
            other => anyhow::bail!("Unknown encoding '{}' (expected json or form)", other),
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Form => write!(f, "form"),
        }
    }
}

/// HTTP-backed submitter
pub struct RemoteAction {
    name: String,
    endpoint: String,
    encoding: Encoding,
    timeout: Duration,
    bearer_token: Option<String>,
    client: reqwest::Client,
    prev_state: Mutex<Option<Value>>,
    schema: Option<Arc<dyn Schema>>,
}

impl RemoteAction {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            name: "remote".to_string(),
            endpoint: endpoint.into(),
            encoding: Encoding::default(),
            timeout: DEFAULT_TIMEOUT,
            bearer_token: None,
            client: reqwest::Client::new(),
            prev_state: Mutex::new(None),
            schema: None,
        }
    }

    /// Create from the `submit` section of the resolved configuration
    pub fn from_config() -> Result<Self> {
        let settings = &crate::config::config()?.submit;
        let endpoint = settings
            .endpoint
            .clone()
            .context("No submit endpoint configured (set submit.endpoint or pass --url)")?;

        Ok(Self::new(endpoint)
            .with_encoding(settings.encoding)
            .with_timeout(Duration::from_secs(settings.timeout_seconds)))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Last result received in form encoding
    pub fn previous_state(&self) -> Option<Value> {
        self.lock_prev_state().clone()
    }

    fn lock_prev_state(&self) -> std::sync::MutexGuard<'_, Option<Value>> {
        match self.prev_state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn form_body(&self, data: &ValueBundle) -> Vec<(String, String)> {
        let mut pairs = values_to_form_pairs(data);
        if let Some(prev) = self.lock_prev_state().as_ref() {
            pairs.push((PREV_STATE_FIELD.to_string(), prev.to_string()));
        }
        pairs
    }
}

#[async_trait]
impl Submitter<Value> for RemoteAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, data: &ValueBundle) -> Result<Value> {
        let mut request = self.client.post(&self.endpoint).timeout(self.timeout);

        if let Some(ref token) = self.bearer_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        request = match self.encoding {
            Encoding::Json => request.json(data),
            Encoding::Form => request.form(&self.form_body(data)),
        };

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.endpoint))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read response body")?;

        debug!(status = %status, bytes = text.len(), "Remote action responded");

        let result = if text.trim().is_empty() && status.is_success() {
            Value::Null
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => {
                    if !status.is_success() {
                        warn!(status = %status, "Remote action returned an error status with a JSON body");
                    }
                    value
                }
                Err(_) if status.is_success() => {
                    anyhow::bail!("Remote action returned a non-JSON body ({})", status)
                }
                Err(_) => anyhow::bail!("Remote action error ({}): {}", status, text),
            }
        };

        if self.encoding == Encoding::Form {
            *self.lock_prev_state() = Some(result.clone());
        }

        Ok(result)
    }

    fn schema(&self) -> Option<Arc<dyn Schema>> {
        self.schema.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encoding_parse() {
        assert_eq!("json".parse::<Encoding>().unwrap(), Encoding::Json);
        assert_eq!("FORM".parse::<Encoding>().unwrap(), Encoding::Form);
        assert!("xml".parse::<Encoding>().is_err());
        assert_eq!(Encoding::Form.to_string(), "form");
    }

    #[test]
    fn test_form_body_carries_previous_state() {
        let action = RemoteAction::new("http://localhost:1/submit").with_encoding(Encoding::Form);
        let mut data = ValueBundle::new();
        data.insert("count".into(), json!(1));

        let first = action.form_body(&data);
        assert!(!first.iter().any(|(k, _)| k == PREV_STATE_FIELD));

        *action.lock_prev_state() = Some(json!({"count": 1}));
        let second = action.form_body(&data);
        assert!(second.contains(&(PREV_STATE_FIELD.to_string(), r#"{"count":1}"#.to_string())));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_failure() {
        let action = RemoteAction::new("http://127.0.0.1:9/submit")
            .with_timeout(Duration::from_millis(500));

        let err = action.submit(&ValueBundle::new()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to reach"));
    }
}
