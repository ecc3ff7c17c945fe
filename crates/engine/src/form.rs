use std::cell::RefCell;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use formstate_core::{FieldPath, FieldValue, FormId, ValidationOutcome};
use formstate_store::{Deliveries, FormStore, MemoryStore};
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::{Callbacks, FormOptions, FormSettings};
use crate::controlled::ControlledFields;
use crate::error::EngineError;
use crate::scope::Scope;
use crate::submission::{
    SubmissionState, SubmitHandle, SubmitOutcome, SubmitStatus, Transport,
};
use crate::validation::{
    FieldEvent, ValidationOrchestrator, ValidationReport, ValidationRun, Validator,
};

/// Mutable state of one form instance.
pub(crate) struct FormState {
    pub(crate) store: MemoryStore,
    pub(crate) defaults: FieldValue,
    pub(crate) hydrated: bool,
    pub(crate) controlled: ControlledFields,
    pub(crate) orchestrator: ValidationOrchestrator,
    pub(crate) submission: SubmissionState,
}

pub(crate) struct FormInner<O> {
    pub(crate) id: FormId,
    pub(crate) state: RefCell<FormState>,
    validator: Rc<dyn Validator<O>>,
    transport: Option<Rc<dyn Transport<O>>>,
    settings: FormSettings,
    callbacks: Callbacks<O>,
    in_flight: RefCell<Option<SubmitHandle>>,
}

/// Read-only summary of form-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    pub submit_status: SubmitStatus,
    pub is_submitting: bool,
    pub has_been_submitted: bool,
    pub submit_count: u32,
    pub is_dirty: bool,
    pub is_touched: bool,
    pub is_valid: bool,
    pub is_hydrated: bool,
}

/// One form instance.
///
/// Dereferences to the root [`Scope`], so every field operation is available
/// directly on the form.
pub struct Form<O = FieldValue> {
    inner: Rc<FormInner<O>>,
    root: Scope<O>,
}

impl<O: 'static> Form<O> {
    pub fn new(options: FormOptions<O>) -> Self {
        let FormOptions {
            defaults,
            validator,
            transport,
            settings,
            server_errors,
            callbacks,
        } = options;

        let mut store = MemoryStore::new(defaults.clone());
        for (path, message) in server_errors.iter() {
            let _ = store.set_error(path, Some(message.to_string()));
        }

        let id = FormId::new();
        debug!(form_id = %id, "form created");
        let inner = Rc::new(FormInner {
            id,
            state: RefCell::new(FormState {
                store,
                defaults,
                hydrated: false,
                controlled: ControlledFields::new(),
                orchestrator: ValidationOrchestrator::new(settings.validation_behavior),
                submission: SubmissionState::default(),
            }),
            validator,
            transport,
            settings,
            callbacks,
            in_flight: RefCell::new(None),
        });
        let root = Scope::new(FieldPath::root(), Rc::downgrade(&inner));
        Self { inner, root }
    }

    pub fn id(&self) -> FormId {
        self.inner.id
    }

    pub fn settings(&self) -> &FormSettings {
        &self.inner.settings
    }

    /// Signal that default values are established and mounted controlled
    /// fields may hydrate. Only the first call has an effect.
    pub fn mark_hydrated(&self) -> Result<(), EngineError> {
        let pending = {
            let mut state = self.inner.state.borrow_mut();
            if state.hydrated {
                return Ok(());
            }
            state.hydrated = true;
            state.controlled.unhydrated()
        };
        debug!(form_id = %self.inner.id, controlled = pending.len(), "form hydrated");
        for path in pending {
            self.inner.hydrate_field(&path)?;
        }
        Ok(())
    }

    pub fn is_hydrated(&self) -> bool {
        self.inner.state.borrow().hydrated
    }

    pub fn snapshot(&self) -> FormSnapshot {
        let state = self.inner.state.borrow();
        let root = FieldPath::root();
        FormSnapshot {
            submit_status: state.submission.status(),
            is_submitting: state.submission.is_submitting(),
            has_been_submitted: state.submission.has_been_submitted(),
            submit_count: state.submission.submit_count(),
            is_dirty: state.store.any_dirty(&root),
            is_touched: state.store.any_touched(&root),
            is_valid: state.store.first_error(&root).is_none(),
            is_hydrated: state.hydrated,
        }
    }

    pub fn submit_status(&self) -> SubmitStatus {
        self.inner.state.borrow().submission.status()
    }
}

impl<O> Deref for Form<O> {
    type Target = Scope<O>;

    fn deref(&self) -> &Scope<O> {
        &self.root
    }
}

impl<O: 'static> FormInner<O> {
    pub(crate) fn weak(self: &Rc<Self>) -> Weak<Self> {
        Rc::downgrade(self)
    }

    /// Whether `event` at `path` should start a validation run, judged on the
    /// field state before the event is applied.
    pub(crate) fn should_validate(&self, path: &FieldPath, event: FieldEvent) -> bool {
        let state = self.state.borrow();
        state.orchestrator.should_validate(
            event,
            state.store.any_touched(path),
            state.submission.has_been_submitted(),
        )
    }

    /// Stamp a new run, call the validator on the current tree and return the
    /// run that applies its results.
    pub(crate) fn start_validation(self: &Rc<Self>) -> ValidationRun<O> {
        let (seq, values) = {
            let mut state = self.state.borrow_mut();
            (state.orchestrator.begin(), state.store.values().clone())
        };
        debug!(form_id = %self.id, seq, "validation started");

        let pending = self.validator.validate(values.clone());
        let form = self.weak();
        ValidationRun::new(
            seq,
            async move {
                let outcome = pending.await;
                let applied = match form.upgrade() {
                    Some(inner) => inner.apply_validation(seq, &values, &outcome),
                    None => false,
                };
                ValidationReport {
                    seq,
                    applied,
                    outcome,
                }
            }
            .boxed_local(),
        )
    }

    /// Write the results of run `seq` unless a later run has started.
    ///
    /// Errors are written at every reported path; existing errors at paths the
    /// validated tree covers but the report omits are cleared.
    pub(crate) fn apply_validation(
        &self,
        seq: u64,
        values: &FieldValue,
        outcome: &ValidationOutcome<O>,
    ) -> bool {
        let deliveries = {
            let mut state = self.state.borrow_mut();
            if !state.orchestrator.is_current(seq) {
                trace!(form_id = %self.id, seq, "discarding stale validation result");
                return false;
            }

            let errors = outcome.errors();
            let mut out = Deliveries::default();
            for path in state.store.error_paths() {
                let reported = errors.is_some_and(|e| e.contains(&path));
                if !reported && values.get(&path).is_some() {
                    out.extend(state.store.set_error(&path, None));
                }
            }
            if let Some(errors) = errors {
                for (path, message) in errors.iter() {
                    out.extend(state.store.set_error(path, Some(message.to_string())));
                }
            }
            debug!(
                form_id = %self.id,
                seq,
                errors = errors.map_or(0, |e| e.len()),
                "validation applied"
            );
            out
        };
        deliveries.deliver();
        true
    }

    pub(crate) fn submit(self: &Rc<Self>) -> Result<SubmitHandle, EngineError> {
        if let Some(handle) = self.in_flight.borrow().as_ref() {
            if self.state.borrow().submission.is_submitting() {
                trace!(form_id = %self.id, "joining in-flight submit");
                return Ok(handle.clone());
            }
        }
        let transport = self.transport.clone().ok_or(EngineError::MissingTransport)?;

        let (generation, seq, values) = {
            let mut state = self.state.borrow_mut();
            let generation = state.submission.begin();
            let seq = state.orchestrator.begin();
            (generation, seq, state.store.values().clone())
        };
        debug!(form_id = %self.id, generation, seq, "submit started");

        let validation = self.validator.validate(values.clone());
        let form = self.weak();
        let handle = async move {
            let outcome = validation.await;
            let Some(inner) = form.upgrade() else {
                return SubmitOutcome::Superseded;
            };
            inner.apply_validation(seq, &values, &outcome);

            let output = match outcome {
                ValidationOutcome::Valid(output) => output,
                ValidationOutcome::Invalid(errors) => {
                    if !inner.finish_submit(generation, SubmitStatus::Error) {
                        return SubmitOutcome::Superseded;
                    }
                    debug!(form_id = %inner.id, errors = errors.len(), "submit rejected by validation");
                    if let Some(on_invalid) = &inner.callbacks.on_invalid_submit {
                        on_invalid(&errors);
                    }
                    if !inner.settings.disable_focus_on_error {
                        if let (Some(focus), Some((path, _))) =
                            (&inner.callbacks.on_focus_error, errors.first())
                        {
                            focus(path);
                        }
                    }
                    return SubmitOutcome::Invalid(errors);
                }
            };

            if let Some(before) = &inner.callbacks.on_before_submit {
                if !before(&output) {
                    inner.finish_submit(generation, SubmitStatus::Idle);
                    return SubmitOutcome::Cancelled;
                }
            }
            drop(inner);

            let result = transport.submit(values.clone(), output).await;
            let Some(inner) = form.upgrade() else {
                return SubmitOutcome::Superseded;
            };
            match result {
                Ok(()) => {
                    if !inner.finish_submit(generation, SubmitStatus::Success) {
                        return SubmitOutcome::Superseded;
                    }
                    debug!(form_id = %inner.id, "submit succeeded");
                    if let Some(on_success) = &inner.callbacks.on_submit_success {
                        on_success();
                    }
                    if inner.settings.reset_after_submit {
                        inner.reset(Some(values));
                    }
                    SubmitOutcome::Submitted
                }
                Err(err) => {
                    if !inner.finish_submit(generation, SubmitStatus::Error) {
                        return SubmitOutcome::Superseded;
                    }
                    let message = err.to_string();
                    warn!(form_id = %inner.id, error = %message, "submit failed");
                    if let Some(on_failure) = &inner.callbacks.on_submit_failure {
                        on_failure(err);
                    }
                    SubmitOutcome::Failed(message)
                }
            }
        }
        .boxed_local()
        .shared();

        *self.in_flight.borrow_mut() = Some(handle.clone());
        Ok(handle)
    }

    fn finish_submit(&self, generation: u64, status: SubmitStatus) -> bool {
        let finished = self.state.borrow_mut().submission.finish(generation, status);
        if finished {
            self.in_flight.borrow_mut().take();
        }
        finished
    }

    /// Restore defaults (optionally replacing them) and forget all metadata,
    /// item tokens and submit history. In-flight validation and submit results
    /// become stale.
    pub(crate) fn reset(&self, new_defaults: Option<FieldValue>) {
        let deliveries = {
            let mut state = self.state.borrow_mut();
            if let Some(defaults) = new_defaults {
                state.defaults = defaults;
            }
            let defaults = state.defaults.clone();
            state.submission.reset();
            state.orchestrator.invalidate();
            state.controlled.forget_hydrated_values();
            state.store.reset(defaults)
        };
        self.in_flight.borrow_mut().take();
        debug!(form_id = %self.id, "form reset");
        deliveries.deliver();
    }

    /// Hydrate one mounted controlled field. The default is copied in only
    /// when the store holds nothing at `path`; defaults are addressed by index
    /// and do not follow array edits, so a live value always wins.
    pub(crate) fn hydrate_field(&self, path: &FieldPath) -> Result<(), EngineError> {
        let deliveries = {
            let mut state = self.state.borrow_mut();
            if !state.hydrated || state.controlled.is_hydrated(path) != Some(false) {
                return Ok(());
            }
            let first_time = state.controlled.mark_hydrated(path);
            let default = match state.store.get(path) {
                Some(_) => None,
                None => state.defaults.get(path).cloned(),
            };
            match default {
                Some(default) if first_time => {
                    trace!(form_id = %self.id, %path, "hydrating controlled field");
                    state.store.set(path, default)?
                }
                _ => Deliveries::default(),
            }
        };
        deliveries.deliver();
        Ok(())
    }
}
