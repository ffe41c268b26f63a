//! Terminal paths of a submission attempt.

use serde::Serialize;

use super::values::FieldErrorMap;

/// What a single `execute_submit` run ended with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Client-side validation blocked the attempt
    Invalid(FieldErrorMap),

    /// A plugin gate aborted the attempt
    Vetoed,

    /// The handler accepted the submission
    Succeeded,

    /// The handler reported field errors
    Rejected(FieldErrorMap),

    /// The submit function failed (message with cause chain)
    Failed(String),
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Whether the attempt reached the submit function
    pub fn reached_transport(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Rejected(_) | Self::Failed(_))
    }
}

/// Failure handed to `on_error` callbacks and plugin error hooks
#[derive(Debug)]
pub enum SubmitFailure<'a, R> {
    /// The handler returned a result that maps to field errors
    Rejected {
        result: &'a R,
        errors: &'a FieldErrorMap,
    },

    /// The submit function itself failed
    Transport(&'a anyhow::Error),
}

impl<R> SubmitFailure<'_, R> {
    /// Result, when the handler produced one
    pub fn result(&self) -> Option<&R> {
        match self {
            Self::Rejected { result, .. } => Some(result),
            Self::Transport(_) => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl<R> std::fmt::Display for SubmitFailure<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected { errors, .. } => {
                let fields: Vec<&str> = errors.fields().collect();
                write!(f, "submission rejected for fields: {}", fields.join(", "))
            }
            Self::Transport(err) => write!(f, "submission failed: {:#}", err),
        }
    }
}
