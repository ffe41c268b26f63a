//! Submit adapters.
//!
//! Adapters turn a concrete transport into the generic submit contract the
//! orchestrator consumes: take a value bundle, return a result or fail.
//! Expected failures (field errors) come back as results; `Err` is reserved
//! for transport-level failures.

pub mod form_data;
pub mod function;
pub mod remote;
pub mod validated;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::validation::Schema;
use crate::domain::ValueBundle;

pub use form_data::{form_pairs_to_values, values_to_form_pairs};
pub use function::{submit_fn, FnSubmitter};
pub use remote::{Encoding, RemoteAction, PREV_STATE_FIELD};
pub use validated::{validated, Validated};

/// Transport-agnostic submit function
#[async_trait]
pub trait Submitter<R>: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Submit values and return the handler's result
    async fn submit(&self, data: &ValueBundle) -> Result<R>;

    /// Schema attached to this submitter, picked up when the form has none
    fn schema(&self) -> Option<Arc<dyn Schema>> {
        None
    }
}

#[async_trait]
impl<R, S> Submitter<R> for Arc<S>
where
    R: Send + 'static,
    S: Submitter<R> + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn submit(&self, data: &ValueBundle) -> Result<R> {
        (**self).submit(data).await
    }

    fn schema(&self) -> Option<Arc<dyn Schema>> {
        (**self).schema()
    }
}
