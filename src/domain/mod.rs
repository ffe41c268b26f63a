//! Domain types for the submission pipeline.
//!
//! This module contains the core data structures:
//! - Values: value bundles, field error maps, per-field errors
//! - State: submission status and the composed form state
//! - Record: immutable entries of the submission history
//! - Outcome: terminal paths of a submission attempt

pub mod outcome;
pub mod record;
pub mod state;
pub mod values;

// Re-export commonly used types
pub use outcome::{SubmitFailure, SubmitOutcome};
pub use record::SubmissionRecord;
pub use state::{ActionFormState, FormState};
pub use values::{FieldError, FieldErrorKind, FieldErrorMap, ValueBundle, FORM_ERROR_KEY};
