//! Optimistic state: a confirmed value and a speculative value.
//!
//! The speculative value is what the UI shows while a submission is in
//! flight. It only ever moves through three transitions:
//! - `apply_speculative`: speculative = reducer(confirmed, data)
//! - `commit`: confirmed = reducer(confirmed, data), speculative = confirmed
//! - `rollback`: speculative = confirmed

use std::fmt;
use std::sync::Arc;

use crate::domain::ValueBundle;

/// Pure function computing the next optimistic value from submitted data
pub type Reducer<T> = Arc<dyn Fn(&T, &ValueBundle) -> T + Send + Sync>;

/// Optimistic configuration: both a key and a reducer are required
#[derive(Clone)]
pub struct OptimisticConfig<T> {
    pub key: String,
    pub reducer: Reducer<T>,
    pub initial: T,
}

impl<T> OptimisticConfig<T> {
    pub fn new(
        key: impl Into<String>,
        initial: T,
        reducer: impl Fn(&T, &ValueBundle) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            reducer: Arc::new(reducer),
            initial,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for OptimisticConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimisticConfig")
            .field("key", &self.key)
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}

/// What a form exposes about its optimistic slot
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticState<T> {
    pub key: String,

    /// Speculative value shown to the UI
    pub data: T,

    pub confirmed: T,

    /// An attempt that applied `data` has not resolved yet
    pub is_pending: bool,
}

/// Holder of the confirmed and speculative values for one form instance
pub struct OptimisticController<T> {
    key: String,
    reducer: Reducer<T>,
    confirmed: T,
    speculative: T,
}

impl<T: Clone> OptimisticController<T> {
    pub fn new(config: OptimisticConfig<T>) -> Self {
        Self {
            key: config.key,
            reducer: config.reducer,
            confirmed: config.initial.clone(),
            speculative: config.initial,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn confirmed(&self) -> &T {
        &self.confirmed
    }

    /// Value currently shown to the UI
    pub fn current(&self) -> &T {
        &self.speculative
    }

    /// Publish reducer(confirmed, data) as the speculative value
    pub fn apply_speculative(&mut self, data: &ValueBundle) -> T {
        self.speculative = (self.reducer)(&self.confirmed, data);
        self.speculative.clone()
    }

    /// Accept the submission: fold `data` into the confirmed baseline
    pub fn commit(&mut self, data: &ValueBundle) -> T {
        self.confirmed = (self.reducer)(&self.confirmed, data);
        self.speculative = self.confirmed.clone();
        self.confirmed.clone()
    }

    /// Discard whatever speculative value is showing
    pub fn rollback(&mut self) {
        self.speculative = self.confirmed.clone();
    }
}
