//! Submission records for the attempt log.
//!
//! One record is created per submission attempt that reached the submit
//! function. Records are never mutated after they are appended.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::values::ValueBundle;

/// A single entry in the submission history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord<R> {
    /// Unique identifier for this attempt
    pub id: Uuid,

    /// When the attempt resolved
    pub timestamp: DateTime<Utc>,

    /// Values handed to the submit function
    pub payload: ValueBundle,

    /// Result returned by the submit function (none on transport failure)
    pub response: Option<R>,

    /// Captured transport error, rendered with its cause chain
    pub error: Option<String>,

    /// Time spent in the submit function, in milliseconds
    pub duration_ms: u64,

    pub success: bool,
}

impl<R> SubmissionRecord<R> {
    /// Record for an attempt whose submit function returned a result
    pub fn resolved(id: Uuid, payload: ValueBundle, response: R, success: bool) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            payload,
            response: Some(response),
            error: None,
            duration_ms: 0,
            success,
        }
    }

    /// Record for an attempt whose submit function failed
    pub fn failed(id: Uuid, payload: ValueBundle, error: &anyhow::Error) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            payload,
            response: None,
            error: Some(format!("{:#}", error)),
            duration_ms: 0,
            success: false,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }
}
