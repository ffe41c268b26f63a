//! Debounced snapshot writes.
//!
//! Every `schedule` call bumps a generation counter and arms a timer. When
//! the timer fires it only writes if no newer call arrived in between, so a
//! burst of changes collapses into a single write of the last bundle.
//!
//! The generation is only read or bumped while the `pending` lock is held,
//! and a flush keeps that lock until its write lands. `discard` and `cancel`
//! therefore return only after any in-progress write has finished.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::Persistence;
use crate::domain::ValueBundle;

/// Quiet period used when none is configured
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Coalescing writer for one persistence key
#[derive(Clone)]
pub struct DebouncedSaver {
    inner: Arc<SaverInner>,
}

struct SaverInner {
    key: String,
    delay: Duration,
    persistence: Persistence,
    generation: AtomicU64,
    pending: Mutex<Option<ValueBundle>>,
    cancelled: AtomicBool,
    /// Timers need a runtime; without one writes happen immediately
    runtime: Option<Handle>,
}

impl DebouncedSaver {
    pub fn new(key: impl Into<String>, delay: Duration, persistence: Persistence) -> Self {
        Self {
            inner: Arc::new(SaverInner {
                key: key.into(),
                delay,
                persistence,
                generation: AtomicU64::new(0),
                pending: Mutex::new(None),
                cancelled: AtomicBool::new(false),
                runtime: Handle::try_current().ok(),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Queue a bundle; only the last one in a quiet period is written
    pub fn schedule(&self, values: ValueBundle) {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return;
        }

        let ticket = {
            let mut pending = self.inner.lock_pending();
            *pending = Some(values);
            self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let runtime = match (&self.inner.runtime, self.inner.delay.is_zero()) {
            (Some(runtime), false) => runtime,
            _ => {
                self.inner.flush();
                return;
            }
        };

        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            tokio::time::sleep(inner.delay).await;
            inner.flush_ticket(ticket);
        });
    }

    /// Write the pending bundle now, if any
    pub fn flush(&self) {
        self.inner.flush();
    }

    /// Whether a bundle is waiting for its quiet period to end
    pub fn has_pending(&self) -> bool {
        self.inner.lock_pending().is_some()
    }

    /// Drop the pending bundle; later `schedule` calls still work
    pub fn discard(&self) {
        let mut pending = self.inner.lock_pending();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        pending.take();
    }

    /// Drop the pending bundle and ignore later `schedule` calls
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let mut pending = self.inner.lock_pending();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if pending.take().is_some() {
            debug!(key = %self.inner.key, "Dropped pending snapshot write");
        }
    }
}

impl SaverInner {
    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<ValueBundle>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn flush(&self) {
        let mut pending = self.lock_pending();
        self.write(pending.take());
    }

    /// Timer path: write only if `ticket` is still the latest schedule
    fn flush_ticket(&self, ticket: u64) {
        let mut pending = self.lock_pending();
        if self.generation.load(Ordering::SeqCst) != ticket {
            return;
        }
        self.write(pending.take());
    }

    /// Called with the `pending` lock held
    fn write(&self, values: Option<ValueBundle>) {
        let Some(values) = values else {
            return;
        };

        if let Err(e) = self.persistence.save(&self.key, &values) {
            warn!(key = %self.key, error = %e, "Debounced snapshot write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{KeyValueStore, MemoryStore, StoreError};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    /// Memory store that counts writes
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        writes: AtomicUsize,
    }

    impl KeyValueStore for CountingStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    fn bundle(step: u64) -> ValueBundle {
        let mut values = ValueBundle::new();
        values.insert("step".into(), json!(step));
        values
    }

    #[tokio::test]
    async fn test_burst_collapses_into_one_write() {
        let store = Arc::new(CountingStore::default());
        let persistence = Persistence::new(store.clone());
        let saver = DebouncedSaver::new("wizard", Duration::from_millis(30), persistence.clone());

        for step in 1..=5 {
            saver.schedule(bundle(step));
        }
        assert!(saver.has_pending());
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(persistence.load("wizard"), Some(bundle(5)));
        assert!(!saver.has_pending());
    }

    #[tokio::test]
    async fn test_zero_delay_writes_immediately() {
        let store = Arc::new(CountingStore::default());
        let persistence = Persistence::new(store.clone());
        let saver = DebouncedSaver::new("k", Duration::ZERO, persistence.clone());

        saver.schedule(bundle(1));
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(persistence.load("k"), Some(bundle(1)));
    }

    #[tokio::test]
    async fn test_cancel_drops_pending_write() {
        let store = Arc::new(CountingStore::default());
        let saver = DebouncedSaver::new("k", Duration::from_millis(20), Persistence::new(store.clone()));

        saver.schedule(bundle(1));
        saver.cancel();
        saver.schedule(bundle(2));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_discard_keeps_saver_usable() {
        let store = Arc::new(CountingStore::default());
        let persistence = Persistence::new(store.clone());
        let saver = DebouncedSaver::new("k", Duration::from_millis(20), persistence.clone());

        saver.schedule(bundle(1));
        saver.discard();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);

        saver.schedule(bundle(2));
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(persistence.load("k"), Some(bundle(2)));
    }

    /// Memory store whose writes take a while to land
    struct SlowStore {
        inner: MemoryStore,
        latency: Duration,
    }

    impl KeyValueStore for SlowStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            std::thread::sleep(self.latency);
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_discard_waits_for_in_progress_write() {
        let store = Arc::new(SlowStore {
            inner: MemoryStore::new(),
            latency: Duration::from_millis(80),
        });
        let persistence = Persistence::new(store.clone());
        let saver = DebouncedSaver::new("k", Duration::from_millis(10), persistence.clone());

        saver.schedule(bundle(1));
        // Timer has fired and the write is sleeping inside the store
        tokio::time::sleep(Duration::from_millis(40)).await;

        saver.discard();
        persistence.clear("k").unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(persistence.load("k").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stale_timer_does_not_flush_newer_bundle() {
        let store = Arc::new(CountingStore::default());
        let persistence = Persistence::new(store.clone());
        let saver = DebouncedSaver::new("k", Duration::from_millis(60), persistence.clone());

        saver.schedule(bundle(1));
        tokio::time::sleep(Duration::from_millis(30)).await;
        saver.schedule(bundle(2));

        // First timer expires here and must leave the newer bundle queued
        tokio::time::sleep(Duration::from_millis(45)).await;
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
        assert!(saver.has_pending());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(persistence.load("k"), Some(bundle(2)));
    }

    #[test]
    fn test_without_runtime_writes_immediately() {
        let store = Arc::new(CountingStore::default());
        let persistence = Persistence::new(store.clone());
        let saver = DebouncedSaver::new("k", DEFAULT_DEBOUNCE, persistence.clone());

        saver.schedule(bundle(7));
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(persistence.load("k"), Some(bundle(7)));
    }
}
