//! actionform - Form submission orchestration
//!
//! Bridges a form-state capability with asynchronous submit handlers
//! (remote actions or plain async functions), adding schema validation,
//! optimistic updates with rollback, debounced draft persistence and a
//! plugin lifecycle.
//!
//! # Architecture
//!
//! Everything funnels through one pipeline, `ActionForm::execute_submit`:
//! - Client validation may block the attempt before anything else runs
//! - Plugins may veto it silently
//! - The submit result is mapped to field errors; none means success
//! - Success commits optimistic state and clears the persisted draft
//! - Failures roll optimistic state back and are reported, never thrown
//!
//! # Modules
//!
//! - `adapters`: Submit contract and transports (function, HTTP, schema wrapper)
//! - `core`: Orchestrator, validation, optimistic state, history, plugins
//! - `domain`: Data structures (values, error maps, state, records)
//! - `persist`: Key-value stores and debounced snapshot writes
//! - `config`: Layered configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```no_run
//! use actionform::{submit_fn, ActionForm, ValueBundle};
//! use serde_json::{json, Value};
//!
//! # async fn demo() {
//! let form = ActionForm::builder(submit_fn(|data: ValueBundle| async move {
//!     Ok::<Value, anyhow::Error>(json!({"success": true, "echo": data}))
//! }))
//! .persist_key("signup")
//! .build();
//!
//! form.set_value("email", json!("ada@example.com"));
//! form.handle_submit().await;
//! form.settle().await;
//!
//! assert!(form.form_state().is_submit_successful);
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod persist;

// Re-export main types at crate root for convenience
pub use adapters::{submit_fn, validated, Encoding, RemoteAction, Submitter};
pub use core::{
    ActionForm, ActionFormBuilder, ErrorMapper, FormControl, InMemoryForm, OptimisticConfig,
    OptimisticState, Plugin, Rule, RuleSchema, Schema, SchemaIssue, SubmitGate, ValidationMode,
};
pub use domain::{
    ActionFormState, FieldError, FieldErrorKind, FieldErrorMap, FormState, SubmissionRecord,
    SubmitFailure, SubmitOutcome, ValueBundle,
};
pub use persist::{FileStore, KeyValueStore, MemoryStore, Persistence};
