//! Core submission logic.
//!
//! This module contains:
//! - ActionForm: the submission orchestrator
//! - Validation: schema checks and issue flattening
//! - ErrorMapper: field errors out of submission results
//! - Optimistic: confirmed/speculative state with rollback
//! - History: bounded attempt log
//! - Plugins: lifecycle hooks
//! - Control and Transition: capabilities the orchestrator drives

pub mod control;
pub mod error_mapper;
pub mod history;
pub mod inspector;
pub mod optimistic;
pub mod orchestrator;
pub mod plugins;
pub mod transition;
pub mod validation;

// Re-export commonly used types
pub use control::{FormControl, InMemoryForm};
pub use error_mapper::{errors_from_value, DefaultErrorMapper, ErrorMapper};
pub use history::{SubmissionHistory, HISTORY_CAPACITY};
pub use inspector::InspectorSnapshot;
pub use optimistic::{OptimisticConfig, OptimisticController, OptimisticState};
pub use orchestrator::{ActionForm, ActionFormBuilder, ActionFormOptions};
pub use plugins::{Cleanup, Plugin, PluginRunner, SubmitGate};
pub use transition::{select_driver, InlineTransition, NativeTransition, TransitionDriver, TransitionKind};
pub use validation::{flatten, validate, validate_field, Rule, RuleSchema, Schema, SchemaIssue, ValidationMode};
