//! Plugin lifecycle.
//!
//! Plugins are registered once when the form is built. The runner calls
//! their hooks in registration order:
//! - `on_mount` once at initialization, collecting cleanups
//! - `before_submit` sequentially before each attempt; `Abort` stops it
//! - `on_success` / `on_error` after each attempt resolves
//! - cleanups once at teardown

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::{SubmitFailure, ValueBundle};

/// Cleanup returned by a mount hook, run once at teardown
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// Decision of a pre-submit hook
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitGate {
    #[default]
    Proceed,

    /// Abort the attempt silently
    Abort,
}

/// Set of optional lifecycle hooks. Every hook defaults to a no-op.
#[async_trait]
pub trait Plugin<R>: Send + Sync {
    /// Human-readable plugin name
    fn name(&self) -> &str;

    async fn before_submit(&self, _data: &ValueBundle) -> SubmitGate {
        SubmitGate::Proceed
    }

    fn on_success(&self, _result: &R, _data: &ValueBundle) {}

    fn on_error(&self, _failure: &SubmitFailure<'_, R>, _data: &ValueBundle) {}

    fn on_mount(&self) -> Option<Cleanup> {
        None
    }
}

/// Ordered plugin list plus the cleanups collected at mount
pub struct PluginRunner<R> {
    plugins: Vec<Arc<dyn Plugin<R>>>,
    cleanups: Mutex<Vec<(String, Cleanup)>>,
    mounted: AtomicBool,
}

impl<R> PluginRunner<R> {
    pub fn new(plugins: Vec<Arc<dyn Plugin<R>>>) -> Self {
        Self {
            plugins,
            cleanups: Mutex::new(Vec::new()),
            mounted: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Run every mount hook once; later calls do nothing
    pub fn mount(&self) {
        if self.mounted.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut cleanups = self.lock_cleanups();
        for plugin in &self.plugins {
            if let Some(cleanup) = plugin.on_mount() {
                cleanups.push((plugin.name().to_string(), cleanup));
            }
        }
        debug!(plugins = self.plugins.len(), cleanups = cleanups.len(), "Plugins mounted");
    }

    /// Await each pre-submit hook in order; the first `Abort` wins
    pub async fn gate(&self, data: &ValueBundle) -> SubmitGate {
        for plugin in &self.plugins {
            if plugin.before_submit(data).await == SubmitGate::Abort {
                info!(plugin = plugin.name(), "Submission aborted by plugin");
                return SubmitGate::Abort;
            }
        }
        SubmitGate::Proceed
    }

    pub fn notify_success(&self, result: &R, data: &ValueBundle) {
        for plugin in &self.plugins {
            plugin.on_success(result, data);
        }
    }

    pub fn notify_error(&self, failure: &SubmitFailure<'_, R>, data: &ValueBundle) {
        for plugin in &self.plugins {
            plugin.on_error(failure, data);
        }
    }

    /// Run collected cleanups in registration order, exactly once
    pub fn teardown(&self) {
        let cleanups = std::mem::take(&mut *self.lock_cleanups());
        for (name, cleanup) in cleanups {
            debug!(plugin = %name, "Running plugin cleanup");
            cleanup();
        }
    }

    fn lock_cleanups(&self) -> std::sync::MutexGuard<'_, Vec<(String, Cleanup)>> {
        match self.cleanups.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
