//! Submission status exposed to the UI layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::values::{FieldError, FieldErrorMap};

/// Status record for the submission pipeline.
///
/// `is_submitting` implies `is_pending`, and after a completed attempt at
/// most one of `is_submit_successful` / `submit_errors` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionFormState<R> {
    pub is_submitting: bool,

    /// Includes transition and optimistic in-flight time
    pub is_pending: bool,

    pub is_submit_successful: bool,

    /// Field errors from the last client validation or server response
    pub submit_errors: Option<FieldErrorMap>,

    /// Last result returned by the submit function
    pub action_result: Option<R>,
}

impl<R> Default for ActionFormState<R> {
    fn default() -> Self {
        Self {
            is_submitting: false,
            is_pending: false,
            is_submit_successful: false,
            submit_errors: None,
            action_result: None,
        }
    }
}

impl<R> ActionFormState<R> {
    /// State after client-side validation blocked the attempt
    pub fn invalid(errors: FieldErrorMap) -> Self {
        Self {
            submit_errors: Some(errors),
            ..Self::default()
        }
    }

    /// Enter the in-flight phase, keeping the last result around
    pub fn begin(&mut self) {
        self.is_submitting = true;
        self.is_pending = true;
        self.submit_errors = None;
    }

    /// State after the handler reported field errors
    pub fn rejected(errors: FieldErrorMap, result: R) -> Self {
        Self {
            submit_errors: Some(errors),
            action_result: Some(result),
            ..Self::default()
        }
    }

    /// State after a successful attempt
    pub fn succeeded(result: R) -> Self {
        Self {
            is_submit_successful: true,
            action_result: Some(result),
            ..Self::default()
        }
    }

    /// Transport failure: leaves `submit_errors` and `action_result` alone
    pub fn fail(&mut self) {
        self.is_submitting = false;
        self.is_pending = false;
        self.is_submit_successful = false;
    }
}

/// Form-control state merged with the submission status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormState<R> {
    /// Per-field errors currently shown by the form control
    pub errors: BTreeMap<String, FieldError>,

    pub is_dirty: bool,

    pub is_submitting: bool,
    pub is_pending: bool,
    pub is_submit_successful: bool,
    pub submit_errors: Option<FieldErrorMap>,
    pub action_result: Option<R>,
}
