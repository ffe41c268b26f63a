//! Submission orchestration for a single form instance.
//!
//! `ActionForm` coordinates client validation, plugin gates, optimistic
//! state, the submit call, error mapping, history, persistence and the
//! caller's callbacks into one pipeline (`execute_submit`).
//!
//! Attempts are not serialized. Two overlapping submissions both run to
//! completion and whichever resolves last decides the observable state.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{form_pairs_to_values, Submitter};
use crate::domain::{
    ActionFormState, FieldError, FieldErrorMap, FormState, SubmissionRecord, SubmitFailure,
    SubmitOutcome, ValueBundle,
};
use crate::persist::{
    merge_snapshot, DebouncedSaver, KeyValueStore, MemoryStore, PersistError, Persistence,
    DEFAULT_DEBOUNCE,
};

use super::control::{FormControl, InMemoryForm};
use super::error_mapper::{DefaultErrorMapper, ErrorMapper};
use super::history::SubmissionHistory;
use super::inspector::InspectorSnapshot;
use super::optimistic::{OptimisticConfig, OptimisticController, OptimisticState};
use super::plugins::{Plugin, PluginRunner, SubmitGate};
use super::transition::{select_driver, TransitionDriver, TransitionKind};
use super::validation::{self, Schema, ValidationMode};

pub type SuccessCallback<R> = Arc<dyn Fn(&R) + Send + Sync>;
pub type ErrorCallback<R> = Arc<dyn Fn(&SubmitFailure<'_, R>) + Send + Sync>;

/// Recognized options, filled in through `ActionFormBuilder`
pub struct ActionFormOptions<R> {
    pub default_values: ValueBundle,

    /// Field-state update trigger, passed through to the form control's owner
    pub mode: ValidationMode,

    /// Enables persistence under this key
    pub persist_key: Option<String>,
    pub persist_debounce: Duration,

    /// Backend for persistence; the process session store when unset
    pub store: Option<Arc<dyn KeyValueStore>>,

    pub error_mapper: Option<Arc<dyn ErrorMapper<R>>>,
    pub on_success: Option<SuccessCallback<R>>,
    pub on_error: Option<ErrorCallback<R>>,

    /// Overrides any schema carried by the submitter
    pub schema: Option<Arc<dyn Schema>>,
    pub validation_mode: ValidationMode,

    pub plugins: Vec<Arc<dyn Plugin<R>>>,
    pub control: Option<Arc<dyn FormControl>>,
    pub transition: Option<Arc<dyn TransitionDriver>>,
}

impl<R> Default for ActionFormOptions<R> {
    fn default() -> Self {
        Self {
            default_values: ValueBundle::new(),
            mode: ValidationMode::default(),
            persist_key: None,
            persist_debounce: DEFAULT_DEBOUNCE,
            store: None,
            error_mapper: None,
            on_success: None,
            on_error: None,
            schema: None,
            validation_mode: ValidationMode::default(),
            plugins: Vec::new(),
            control: None,
            transition: None,
        }
    }
}

/// Submission orchestrator. Clones share the same instance.
pub struct ActionForm<R, T = ()> {
    inner: Arc<Inner<R, T>>,
}

impl<R, T> Clone for ActionForm<R, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<R, T> {
    submitter: Arc<dyn Submitter<R>>,
    control: Arc<dyn FormControl>,
    schema: Option<Arc<dyn Schema>>,
    mode: ValidationMode,
    validation_mode: ValidationMode,
    error_mapper: Arc<dyn ErrorMapper<R>>,
    on_success: Option<SuccessCallback<R>>,
    on_error: Option<ErrorCallback<R>>,
    persist_key: Option<String>,
    persistence: Persistence,
    saver: Option<DebouncedSaver>,
    optimistic: Option<Mutex<OptimisticController<T>>>,
    /// Attempts whose speculative value is still showing
    speculating: AtomicUsize,
    state: Mutex<ActionFormState<R>>,
    history: Mutex<SubmissionHistory<R>>,
    plugins: PluginRunner<R>,
    transition: Arc<dyn TransitionDriver>,
    torn_down: AtomicBool,
}

impl<R, T> Inner<R, T> {
    fn is_live(&self) -> bool {
        !self.torn_down.load(Ordering::SeqCst)
    }

    fn teardown(&self) -> bool {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Some(saver) = &self.saver {
            saver.cancel();
        }
        self.plugins.teardown();
        true
    }
}

impl<R, T> Drop for Inner<R, T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Counts an attempt as speculating until dropped
struct Speculating<'a>(&'a AtomicUsize);

impl<'a> Speculating<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Speculating<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Builder for `ActionForm`
pub struct ActionFormBuilder<R, T = ()> {
    submitter: Arc<dyn Submitter<R>>,
    options: ActionFormOptions<R>,
    optimistic: Option<OptimisticConfig<T>>,
}

impl<R> ActionForm<R, ()>
where
    R: Clone + Serialize + Send + Sync + 'static,
{
    /// Start configuring a form around `submitter`
    pub fn builder(submitter: impl Submitter<R> + 'static) -> ActionFormBuilder<R, ()> {
        ActionFormBuilder {
            submitter: Arc::new(submitter),
            options: ActionFormOptions::default(),
            optimistic: None,
        }
    }
}

impl<R, T> ActionFormBuilder<R, T>
where
    R: Clone + Serialize + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn options(mut self, options: ActionFormOptions<R>) -> Self {
        self.options = options;
        self
    }

    pub fn default_values(mut self, values: ValueBundle) -> Self {
        self.options.default_values = values;
        self
    }

    pub fn mode(mut self, mode: ValidationMode) -> Self {
        self.options.mode = mode;
        self
    }

    pub fn persist_key(mut self, key: impl Into<String>) -> Self {
        self.options.persist_key = Some(key.into());
        self
    }

    pub fn persist_debounce(mut self, delay: Duration) -> Self {
        self.options.persist_debounce = delay;
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.options.store = Some(store);
        self
    }

    pub fn error_mapper(mut self, mapper: impl ErrorMapper<R> + 'static) -> Self {
        self.options.error_mapper = Some(Arc::new(mapper));
        self
    }

    pub fn on_success(mut self, callback: impl Fn(&R) + Send + Sync + 'static) -> Self {
        self.options.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error(
        mut self,
        callback: impl Fn(&SubmitFailure<'_, R>) + Send + Sync + 'static,
    ) -> Self {
        self.options.on_error = Some(Arc::new(callback));
        self
    }

    pub fn schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.options.schema = Some(schema);
        self
    }

    pub fn validation_mode(mut self, mode: ValidationMode) -> Self {
        self.options.validation_mode = mode;
        self
    }

    pub fn plugin(mut self, plugin: impl Plugin<R> + 'static) -> Self {
        self.options.plugins.push(Arc::new(plugin));
        self
    }

    pub fn plugins(mut self, plugins: impl IntoIterator<Item = Arc<dyn Plugin<R>>>) -> Self {
        self.options.plugins.extend(plugins);
        self
    }

    pub fn control(mut self, control: Arc<dyn FormControl>) -> Self {
        self.options.control = Some(control);
        self
    }

    pub fn transition(mut self, driver: Arc<dyn TransitionDriver>) -> Self {
        self.options.transition = Some(driver);
        self
    }

    /// Enable the optimistic slot
    pub fn optimistic<U>(self, config: OptimisticConfig<U>) -> ActionFormBuilder<R, U>
    where
        U: Clone + Send + Sync + 'static,
    {
        ActionFormBuilder {
            submitter: self.submitter,
            options: self.options,
            optimistic: Some(config),
        }
    }

    /// Initialize the form: restore the snapshot, resolve the schema and
    /// mount plugins
    pub fn build(self) -> ActionForm<R, T> {
        let ActionFormBuilder {
            submitter,
            options,
            optimistic,
        } = self;
        let ActionFormOptions {
            default_values,
            mode,
            persist_key,
            persist_debounce,
            store,
            error_mapper,
            on_success,
            on_error,
            schema,
            validation_mode,
            plugins,
            control,
            transition,
        } = options;

        let persistence = match (&persist_key, store) {
            (Some(_), Some(store)) => Persistence::new(store),
            (Some(_), None) => Persistence::new(Arc::new(MemoryStore::session())),
            (None, _) => Persistence::disabled(),
        };

        let snapshot = persist_key.as_deref().and_then(|key| persistence.load(key));
        let restored = snapshot.is_some();

        let control = control
            .unwrap_or_else(|| Arc::new(InMemoryForm::default()) as Arc<dyn FormControl>);
        control.reset(merge_snapshot(default_values, snapshot));

        let schema = schema.or_else(|| submitter.schema());
        let saver = persist_key
            .as_ref()
            .map(|key| DebouncedSaver::new(key.clone(), persist_debounce, persistence.clone()));
        let transition = transition.unwrap_or_else(select_driver);

        let plugins = PluginRunner::new(plugins);
        plugins.mount();

        info!(
            submitter = submitter.name(),
            plugins = plugins.len(),
            has_schema = schema.is_some(),
            restored,
            transition = ?transition.kind(),
            "Action form ready"
        );

        ActionForm {
            inner: Arc::new(Inner {
                submitter,
                control,
                schema,
                mode,
                validation_mode,
                error_mapper: error_mapper
                    .unwrap_or_else(|| Arc::new(DefaultErrorMapper) as Arc<dyn ErrorMapper<R>>),
                on_success,
                on_error,
                persist_key,
                persistence,
                saver,
                optimistic: optimistic.map(|config| Mutex::new(OptimisticController::new(config))),
                speculating: AtomicUsize::new(0),
                state: Mutex::new(ActionFormState::default()),
                history: Mutex::new(SubmissionHistory::new()),
                plugins,
                transition,
                torn_down: AtomicBool::new(false),
            }),
        }
    }
}

impl<R, T> ActionForm<R, T>
where
    R: Clone + Serialize + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Run one submission attempt through the whole pipeline.
    ///
    /// Never fails: every terminal path is reported through state, history
    /// and callbacks. The returned outcome says which path ran.
    #[instrument(skip_all, fields(submitter = %self.inner.submitter.name()))]
    pub async fn execute_submit(&self, data: ValueBundle) -> SubmitOutcome {
        let inner = &self.inner;

        if inner.validation_mode == ValidationMode::OnSubmit {
            if let Some(errors) = self.check_client(&data) {
                return SubmitOutcome::Invalid(errors);
            }
        }

        if inner.plugins.gate(&data).await == SubmitGate::Abort {
            return SubmitOutcome::Vetoed;
        }

        if inner.is_live() {
            lock(&inner.state).begin();
        }

        let _speculating = self.apply_speculative(&data);

        let id = Uuid::new_v4();
        debug!(%id, fields = data.len(), "Submitting");

        let started = Instant::now();
        let outcome = inner.submitter.submit(&data).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(result) => self.resolve(id, data, result, elapsed),
            Err(err) => self.fail(id, data, err, elapsed),
        }
    }

    /// Submit the control's current values through the transition driver
    pub async fn handle_submit(&self) {
        self.handle_submit_with(|_| async {}).await
    }

    /// Like `handle_submit`, awaiting `on_valid` with the values first.
    ///
    /// Schema validation happens afterwards, inside the submit pipeline.
    pub async fn handle_submit_with<F, Fut>(&self, on_valid: F)
    where
        F: FnOnce(ValueBundle) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        let data = self.inner.control.values();
        on_valid(data.clone()).await;

        let form = self.clone();
        self.inner
            .transition
            .start(Box::pin(async move {
                form.execute_submit(data).await;
            }))
            .await;
    }

    /// Submit raw form-data pairs; repeated keys become arrays
    pub async fn submit_form_pairs<I, K, V>(&self, pairs: I) -> SubmitOutcome
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.execute_submit(form_pairs_to_values(pairs)).await
    }

    /// Client-side validation; applies the errors and the invalid state
    fn check_client(&self, data: &ValueBundle) -> Option<FieldErrorMap> {
        let inner = &self.inner;
        let errors = validation::validate(inner.schema.as_deref()?, data)?;

        info!(fields = errors.len(), "Client validation blocked submission");
        if inner.is_live() {
            inner.control.apply_server_errors(&errors);
            *lock(&inner.state) = ActionFormState::invalid(errors.clone());
        }
        Some(errors)
    }

    fn apply_speculative(&self, data: &ValueBundle) -> Option<Speculating<'_>> {
        let slot = self.inner.optimistic.as_ref()?;
        let guard = Speculating::enter(&self.inner.speculating);
        if self.inner.is_live() {
            lock(slot).apply_speculative(data);
        }
        Some(guard)
    }

    fn rollback_if_live(&self) {
        if !self.inner.is_live() {
            return;
        }
        if let Some(slot) = &self.inner.optimistic {
            lock(slot).rollback();
        }
    }

    fn resolve(&self, id: Uuid, data: ValueBundle, result: R, elapsed: Duration) -> SubmitOutcome {
        let inner = &self.inner;
        let errors = inner.error_mapper.map(&result).and_then(FieldErrorMap::normalize);

        let record = SubmissionRecord::resolved(id, data.clone(), result.clone(), errors.is_none())
            .with_duration(elapsed);
        if inner.is_live() {
            lock(&inner.history).append(record);
        }

        match errors {
            Some(errors) => {
                if inner.is_live() {
                    inner.control.apply_server_errors(&errors);
                }
                self.rollback_if_live();
                if inner.is_live() {
                    *lock(&inner.state) = ActionFormState::rejected(errors.clone(), result.clone());
                }

                info!(
                    %id,
                    fields = errors.len(),
                    duration_ms = elapsed.as_millis() as u64,
                    "Submission rejected with field errors"
                );

                let failure = SubmitFailure::Rejected {
                    result: &result,
                    errors: &errors,
                };
                inner.plugins.notify_error(&failure, &data);
                if let Some(callback) = &inner.on_error {
                    callback(&failure);
                }

                SubmitOutcome::Rejected(errors)
            }
            None => {
                if inner.is_live() {
                    if let Some(slot) = &inner.optimistic {
                        lock(slot).commit(&data);
                    }
                }

                if let Some(key) = &inner.persist_key {
                    if let Some(saver) = &inner.saver {
                        saver.discard();
                    }
                    if let Err(e) = inner.persistence.clear(key) {
                        warn!(%id, key = %key, error = %e, "Failed to clear persisted snapshot");
                    }
                }

                if inner.is_live() {
                    *lock(&inner.state) = ActionFormState::succeeded(result.clone());
                }

                info!(%id, duration_ms = elapsed.as_millis() as u64, "Submission succeeded");

                inner.plugins.notify_success(&result, &data);
                if let Some(callback) = &inner.on_success {
                    callback(&result);
                }

                SubmitOutcome::Succeeded
            }
        }
    }

    fn fail(&self, id: Uuid, data: ValueBundle, err: anyhow::Error, elapsed: Duration) -> SubmitOutcome {
        let inner = &self.inner;

        let record = SubmissionRecord::failed(id, data.clone(), &err).with_duration(elapsed);
        if inner.is_live() {
            lock(&inner.history).append(record);
        }

        self.rollback_if_live();
        if inner.is_live() {
            lock(&inner.state).fail();
        }

        error!(%id, error = %format!("{:#}", err), duration_ms = elapsed.as_millis() as u64, "Submission failed");

        let failure = SubmitFailure::Transport(&err);
        inner.plugins.notify_error(&failure, &data);
        if let Some(callback) = &inner.on_error {
            callback(&failure);
        }

        SubmitOutcome::Failed(format!("{:#}", err))
    }

    // ------------------------------------------------------------------
    // Field triggers
    // ------------------------------------------------------------------

    /// Change one value: schedules the debounced save and, in `OnChange`
    /// mode, validates the field
    pub fn set_value(&self, field: &str, value: Value) {
        let inner = &self.inner;
        inner.control.set_value(field, value);

        if let Some(saver) = &inner.saver {
            saver.schedule(inner.control.values());
        }

        if inner.validation_mode == ValidationMode::OnChange {
            self.validate_field(field);
        }
    }

    /// Field lost focus; validates it in `OnBlur` mode
    pub fn blur(&self, field: &str) {
        if self.inner.validation_mode == ValidationMode::OnBlur {
            self.validate_field(field);
        }
    }

    /// Run the schema and update one field's error. Returns the message set.
    pub fn validate_field(&self, field: &str) -> Option<String> {
        let inner = &self.inner;
        let schema = inner.schema.as_deref()?;
        let values = inner.control.values();

        match validation::validate_field(schema, &values, field) {
            Some(message) => {
                inner.control.set_error(field, FieldError::validation(message.clone()));
                Some(message)
            }
            None => {
                inner.control.clear_errors(field);
                None
            }
        }
    }

    /// Set a server error on one field by hand
    pub fn set_submit_error(&self, field: &str, message: impl Into<String>) {
        self.inner.control.set_error(field, FieldError::server(message));
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Write the current values to the snapshot immediately
    pub fn persist(&self) -> Result<(), PersistError> {
        let Some(key) = &self.inner.persist_key else {
            return Ok(());
        };
        self.inner.persistence.save(key, &self.inner.control.values())
    }

    /// Remove the snapshot and drop any pending debounced write
    pub fn clear_persisted_data(&self) -> Result<(), PersistError> {
        let Some(key) = &self.inner.persist_key else {
            return Ok(());
        };
        if let Some(saver) = &self.inner.saver {
            saver.discard();
        }
        self.inner.persistence.clear(key)
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// Form-control state merged with the submission status
    pub fn form_state(&self) -> FormState<R> {
        let inner = &self.inner;
        let state = lock(&inner.state).clone();

        FormState {
            errors: inner.control.errors(),
            is_dirty: inner.control.is_dirty(),
            is_submitting: state.is_submitting,
            is_pending: state.is_pending || inner.transition.is_pending(),
            is_submit_successful: state.is_submit_successful,
            submit_errors: state.submit_errors,
            action_result: state.action_result,
        }
    }

    pub fn action_state(&self) -> ActionFormState<R> {
        lock(&self.inner.state).clone()
    }

    /// Optimistic slot; `None` when no optimistic config was given
    pub fn optimistic(&self) -> Option<OptimisticState<T>> {
        let inner = &self.inner;
        let slot = inner.optimistic.as_ref()?;
        let controller = lock(slot);

        Some(OptimisticState {
            key: controller.key().to_string(),
            data: controller.current().clone(),
            confirmed: controller.confirmed().clone(),
            is_pending: inner.speculating.load(Ordering::SeqCst) > 0,
        })
    }

    /// Reset the speculative value to the confirmed one
    pub fn rollback_optimistic(&self) {
        if let Some(slot) = &self.inner.optimistic {
            lock(slot).rollback();
        }
    }

    /// Attempt log, oldest first
    pub fn history(&self) -> Vec<SubmissionRecord<R>> {
        lock(&self.inner.history).to_vec()
    }

    pub fn clear_history(&self) {
        lock(&self.inner.history).clear();
    }

    /// Devtools view: state, history, counts and the optimistic key
    pub fn inspect(&self) -> InspectorSnapshot<R> {
        let optimistic_key = self
            .inner
            .optimistic
            .as_ref()
            .map(|slot| lock(slot).key().to_string());
        let state = lock(&self.inner.state).clone();
        let history = lock(&self.inner.history);
        InspectorSnapshot::capture(&state, &history, optimistic_key)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// The form-state handle this form drives.
    ///
    /// Writes made here go straight to the control: no debounced save and no
    /// on-change validation. Use [`ActionForm::set_value`] for watched edits.
    /// Debug tooling that only holds the control handle reaches submission
    /// metadata through the owning form's [`ActionForm::inspect`].
    pub fn control(&self) -> Arc<dyn FormControl> {
        Arc::clone(&self.inner.control)
    }

    pub fn values(&self) -> ValueBundle {
        self.inner.control.values()
    }

    pub fn mode(&self) -> ValidationMode {
        self.inner.mode
    }

    pub fn validation_mode(&self) -> ValidationMode {
        self.inner.validation_mode
    }

    pub fn schema(&self) -> Option<Arc<dyn Schema>> {
        self.inner.schema.clone()
    }

    pub fn submitter_name(&self) -> &str {
        self.inner.submitter.name()
    }

    pub fn persist_key(&self) -> Option<&str> {
        self.inner.persist_key.as_deref()
    }

    pub fn transition_kind(&self) -> TransitionKind {
        self.inner.transition.kind()
    }

    /// Wait for every submission started by `handle_submit`
    pub async fn settle(&self) {
        self.inner.transition.settle().await;
    }

    /// Run plugin cleanups and cancel the pending save, once.
    ///
    /// In-flight attempts still call plugins and callbacks but stop
    /// touching shared state.
    pub fn teardown(&self) {
        if self.inner.teardown() {
            info!(submitter = self.inner.submitter.name(), "Action form torn down");
        }
    }

    pub fn is_torn_down(&self) -> bool {
        !self.inner.is_live()
    }
}
