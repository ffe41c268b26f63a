//! Transition drivers for `handle_submit`.
//!
//! A transition runs a submission in the background while the caller goes
//! on, and reports whether any transition is still in flight. Two drivers
//! exist and one is picked when the form is built:
//! - `NativeTransition`: spawns onto the tokio runtime present at build time
//! - `InlineTransition`: awaits the work in place (no runtime available)

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::warn;

pub type TransitionWork = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Which driver a form ended up with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Native,
    Inline,
}

#[async_trait]
pub trait TransitionDriver: Send + Sync {
    fn kind(&self) -> TransitionKind;

    /// Start `work`; an inline driver returns once it finished
    async fn start(&self, work: TransitionWork);

    /// Whether any started work is still running
    fn is_pending(&self) -> bool;

    /// Wait for every started transition to finish
    async fn settle(&self);
}

/// Pick the driver for the current execution context
pub fn select_driver() -> Arc<dyn TransitionDriver> {
    match Handle::try_current() {
        Ok(runtime) => Arc::new(NativeTransition::new(runtime)),
        Err(_) => Arc::new(InlineTransition::default()),
    }
}

/// Decrements the in-flight counter when dropped
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Spawns each transition as a tokio task
pub struct NativeTransition {
    runtime: Handle,
    in_flight: Arc<AtomicUsize>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NativeTransition {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            in_flight: Arc::new(AtomicUsize::new(0)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl TransitionDriver for NativeTransition {
    fn kind(&self) -> TransitionKind {
        TransitionKind::Native
    }

    async fn start(&self, work: TransitionWork) {
        let guard = InFlight::enter(&self.in_flight);
        let task = self.runtime.spawn(async move {
            let _guard = guard;
            work.await;
        });

        let mut tasks = self.lock_tasks();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    async fn settle(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.lock_tasks());
            if tasks.is_empty() {
                return;
            }
            for task in tasks {
                if let Err(e) = task.await {
                    warn!(error = %e, "Transition task ended abnormally");
                }
            }
        }
    }
}

/// Runs each transition to completion inside `start`
#[derive(Default)]
pub struct InlineTransition {
    in_flight: Arc<AtomicUsize>,
}

#[async_trait]
impl TransitionDriver for InlineTransition {
    fn kind(&self) -> TransitionKind {
        TransitionKind::Inline
    }

    async fn start(&self, work: TransitionWork) {
        let _guard = InFlight::enter(&self.in_flight);
        work.await;
    }

    fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    async fn settle(&self) {}
}
