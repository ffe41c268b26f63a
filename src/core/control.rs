//! Form-control capability.
//!
//! The form-state library owns the values and per-field errors. The
//! orchestrator only reads values and asks for error mutations through this
//! trait; it never keeps a competing copy of the bundle.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use crate::domain::{FieldError, FieldErrorMap, ValueBundle};

/// Operations the orchestrator needs from a form-state library.
///
/// The trait has no change subscription. Only `ActionForm::set_value` is
/// watched for debounced saves and on-change validation; calling
/// `set_value` here directly bypasses both. Inspector metadata lives on the
/// owning `ActionForm` (`inspect`), not on the control.
pub trait FormControl: Send + Sync {
    /// Snapshot of the current values
    fn values(&self) -> ValueBundle;

    /// Replace all values and start a fresh, clean state
    fn reset(&self, values: ValueBundle);

    fn set_value(&self, field: &str, value: Value);

    fn set_error(&self, field: &str, error: FieldError);

    fn clear_errors(&self, field: &str);

    fn errors(&self) -> BTreeMap<String, FieldError>;

    /// Whether any value differs from the last reset
    fn is_dirty(&self) -> bool;

    /// Apply the first message of every field in `errors` as a server error
    fn apply_server_errors(&self, errors: &FieldErrorMap) {
        for (field, messages) in errors.iter() {
            if let Some(first) = messages.first() {
                self.set_error(field, FieldError::server(first.clone()));
            }
        }
    }
}

/// Default form control backed by an in-process map
#[derive(Debug, Clone, Default)]
pub struct InMemoryForm {
    state: Arc<RwLock<FormData>>,
}

#[derive(Debug, Default)]
struct FormData {
    defaults: ValueBundle,
    values: ValueBundle,
    errors: BTreeMap<String, FieldError>,
}

impl InMemoryForm {
    pub fn new(values: ValueBundle) -> Self {
        let form = Self::default();
        form.reset(values);
        form
    }

    pub fn value(&self, field: &str) -> Option<Value> {
        self.read().values.get(field).cloned()
    }

    pub fn error(&self, field: &str) -> Option<FieldError> {
        self.read().errors.get(field).cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, FormData> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, FormData> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl FormControl for InMemoryForm {
    fn values(&self) -> ValueBundle {
        self.read().values.clone()
    }

    fn reset(&self, values: ValueBundle) {
        let mut state = self.write();
        state.defaults = values.clone();
        state.values = values;
        state.errors.clear();
    }

    fn set_value(&self, field: &str, value: Value) {
        self.write().values.insert(field.to_string(), value);
    }

    fn set_error(&self, field: &str, error: FieldError) {
        self.write().errors.insert(field.to_string(), error);
    }

    fn clear_errors(&self, field: &str) {
        self.write().errors.remove(field);
    }

    fn errors(&self) -> BTreeMap<String, FieldError> {
        self.read().errors.clone()
    }

    fn is_dirty(&self) -> bool {
        let state = self.read();
        state.values != state.defaults
    }
}
