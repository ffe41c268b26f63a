//! Adapter for caller-supplied async functions.
//!
//! This is the standalone mode: no server action, just a closure that
//! wraps whatever client the application already uses.

use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;

use super::Submitter;
use crate::domain::ValueBundle;

/// Submitter backed by an async closure
pub struct FnSubmitter<F> {
    name: String,
    f: F,
}

/// Wrap `f` as a submitter
pub fn submit_fn<R, F, Fut>(f: F) -> FnSubmitter<F>
where
    F: Fn(ValueBundle) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    FnSubmitter {
        name: "function".to_string(),
        f,
    }
}

impl<F> FnSubmitter<F> {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl<R, F, Fut> Submitter<R> for FnSubmitter<F>
where
    R: Send + 'static,
    F: Fn(ValueBundle) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, data: &ValueBundle) -> Result<R> {
        (self.f)(data.clone()).await
    }
}
