use std::rc::{Rc, Weak};

use formstate_core::{FieldPath, FieldValue, IntoFieldPath};
use formstate_store::{
    Deliveries, FormStore, MemoryStore, Notification, SubscriptionId, SubscriptionTarget,
};
use tracing::trace;

use crate::array::ArrayField;
use crate::controlled::ControlledField;
use crate::error::EngineError;
use crate::form::FormInner;
use crate::submission::SubmitHandle;
use crate::validation::{FieldEvent, ValidationRun};

/// A view of a form rooted at a path.
///
/// Every path argument is relative to the scope root; `""` addresses the root
/// itself. Scopes hold a weak reference and fail with
/// [`EngineError::FormReleased`] once the form is dropped.
pub struct Scope<O> {
    root: FieldPath,
    form: Weak<FormInner<O>>,
}

impl<O> Clone for Scope<O> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            form: self.form.clone(),
        }
    }
}

impl<O> std::fmt::Debug for Scope<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope").field("root", &self.root).finish()
    }
}

impl<O> Scope<O> {
    pub(crate) fn new(root: FieldPath, form: Weak<FormInner<O>>) -> Self {
        Self { root, form }
    }

    pub(crate) fn inner(&self) -> Result<Rc<FormInner<O>>, EngineError> {
        self.form.upgrade().ok_or(EngineError::FormReleased)
    }

    pub fn path(&self) -> &FieldPath {
        &self.root
    }
}

impl<O: 'static> Scope<O> {
    fn resolve(&self, path: impl IntoFieldPath) -> Result<FieldPath, EngineError> {
        Ok(self.root.join(&path.into_field_path()?))
    }

    /// Narrow to a sub-path.
    pub fn scope(&self, path: impl IntoFieldPath) -> Result<Scope<O>, EngineError> {
        Ok(Scope::new(self.resolve(path)?, self.form.clone()))
    }

    pub fn array(&self, path: impl IntoFieldPath) -> Result<ArrayField<O>, EngineError> {
        Ok(ArrayField::new(self.scope(path)?))
    }

    /// Mount a store-backed field at `path`.
    pub fn controlled(&self, path: impl IntoFieldPath) -> Result<ControlledField<O>, EngineError> {
        ControlledField::mount(self.scope(path)?)
    }

    // --- values ---

    pub fn value(&self, path: impl IntoFieldPath) -> Result<Option<FieldValue>, EngineError> {
        let path = self.resolve(path)?;
        let inner = self.inner()?;
        let state = inner.state.borrow();
        Ok(state.store.get(&path).cloned())
    }

    pub fn default_value(&self, path: impl IntoFieldPath) -> Result<Option<FieldValue>, EngineError> {
        let path = self.resolve(path)?;
        let inner = self.inner()?;
        let state = inner.state.borrow();
        Ok(state.defaults.get(&path).cloned())
    }

    /// Write a value and recompute dirty against the default. Does not
    /// validate; see [`Scope::change`].
    pub fn set_value(
        &self,
        path: impl IntoFieldPath,
        value: impl Into<FieldValue>,
    ) -> Result<(), EngineError> {
        let path = self.resolve(path)?;
        let inner = self.inner()?;
        write_value(&inner, &path, value.into())
    }

    /// A user edit: write, mark dirty, and validate if the configured
    /// behavior asks for it.
    pub fn change(
        &self,
        path: impl IntoFieldPath,
        value: impl Into<FieldValue>,
    ) -> Result<Option<ValidationRun<O>>, EngineError> {
        let path = self.resolve(path)?;
        let inner = self.inner()?;
        let validate = inner.should_validate(&path, FieldEvent::Change);
        write_value(&inner, &path, value.into())?;
        Ok(validate.then(|| inner.start_validation()))
    }

    /// The field lost focus: mark touched and validate if the configured
    /// behavior asks for it. Behavior is chosen from the state before the blur.
    pub fn blur(&self, path: impl IntoFieldPath) -> Result<Option<ValidationRun<O>>, EngineError> {
        let path = self.resolve(path)?;
        let inner = self.inner()?;
        let validate = inner.should_validate(&path, FieldEvent::Blur);
        let deliveries = inner.state.borrow_mut().store.set_touched(&path, true);
        deliveries.deliver();
        Ok(validate.then(|| inner.start_validation()))
    }

    /// Validate the whole form now, regardless of the configured behavior.
    pub fn validate(&self) -> Result<ValidationRun<O>, EngineError> {
        Ok(self.inner()?.start_validation())
    }

    // --- metadata ---

    pub fn error(&self, path: impl IntoFieldPath) -> Result<Option<String>, EngineError> {
        let path = self.resolve(path)?;
        let inner = self.inner()?;
        let state = inner.state.borrow();
        Ok(state.store.meta(&path).error)
    }

    pub fn set_error(
        &self,
        path: impl IntoFieldPath,
        message: impl Into<String>,
    ) -> Result<(), EngineError> {
        let path = self.resolve(path)?;
        let message = message.into();
        self.update_meta(|store| store.set_error(&path, Some(message)))
    }

    /// Remove the error; afterwards the path has no error at all, which is
    /// distinct from an empty message.
    pub fn clear_error(&self, path: impl IntoFieldPath) -> Result<(), EngineError> {
        let path = self.resolve(path)?;
        self.update_meta(|store| store.set_error(&path, None))
    }

    /// First error at or below `path`, in path order.
    pub fn first_error(
        &self,
        path: impl IntoFieldPath,
    ) -> Result<Option<(FieldPath, String)>, EngineError> {
        let path = self.resolve(path)?;
        let inner = self.inner()?;
        let state = inner.state.borrow();
        Ok(state.store.first_error(&path))
    }

    pub fn is_valid(&self, path: impl IntoFieldPath) -> Result<bool, EngineError> {
        Ok(self.first_error(path)?.is_none())
    }

    /// Whether `path` or anything below it is dirty.
    pub fn dirty(&self, path: impl IntoFieldPath) -> Result<bool, EngineError> {
        let path = self.resolve(path)?;
        let inner = self.inner()?;
        let state = inner.state.borrow();
        Ok(state.store.any_dirty(&path))
    }

    pub fn set_dirty(&self, path: impl IntoFieldPath, dirty: bool) -> Result<(), EngineError> {
        let path = self.resolve(path)?;
        self.update_meta(|store| store.set_dirty(&path, dirty))
    }

    /// Whether `path` or anything below it is touched.
    pub fn touched(&self, path: impl IntoFieldPath) -> Result<bool, EngineError> {
        let path = self.resolve(path)?;
        let inner = self.inner()?;
        let state = inner.state.borrow();
        Ok(state.store.any_touched(&path))
    }

    pub fn set_touched(&self, path: impl IntoFieldPath, touched: bool) -> Result<(), EngineError> {
        let path = self.resolve(path)?;
        self.update_meta(|store| store.set_touched(&path, touched))
    }

    fn update_meta(
        &self,
        update: impl FnOnce(&mut MemoryStore) -> Deliveries,
    ) -> Result<(), EngineError> {
        let inner = self.inner()?;
        let deliveries = update(&mut inner.state.borrow_mut().store);
        deliveries.deliver();
        Ok(())
    }

    // --- form-level ---

    /// Reset the whole form. New defaults given through a sub-scope replace
    /// only that subtree of the current defaults.
    pub fn reset_form(&self, new_defaults: Option<FieldValue>) -> Result<(), EngineError> {
        let inner = self.inner()?;
        let defaults = match new_defaults {
            None => None,
            Some(value) if self.root.is_root() => Some(value),
            Some(value) => {
                let mut defaults = inner.state.borrow().defaults.clone();
                defaults.set(&self.root, value)?;
                Some(defaults)
            }
        };
        inner.reset(defaults);
        Ok(())
    }

    /// Start a submit attempt, or join the one already in flight.
    pub fn submit(&self) -> Result<SubmitHandle, EngineError> {
        self.inner()?.submit()
    }

    // --- subscriptions ---

    /// Watch `path` and everything below it. The callback runs synchronously
    /// after each mutation, with no form borrow held.
    pub fn subscribe(
        &self,
        path: impl IntoFieldPath,
        callback: impl Fn(&Notification) + 'static,
    ) -> Result<SubscriptionId, EngineError> {
        let path = self.resolve(path)?;
        self.subscribe_to(SubscriptionTarget::Path(path), callback)
    }

    pub(crate) fn subscribe_to(
        &self,
        target: SubscriptionTarget,
        callback: impl Fn(&Notification) + 'static,
    ) -> Result<SubscriptionId, EngineError> {
        let inner = self.inner()?;
        let id = inner.state.borrow_mut().store.subscribe(target, callback);
        Ok(id)
    }

    /// Idempotent; returns whether the subscription was still active.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, EngineError> {
        let inner = self.inner()?;
        let removed = inner.state.borrow_mut().store.unsubscribe(id);
        Ok(removed)
    }
}

/// Write `value` at `path` unless a mounted controlled field there has not
/// hydrated yet, then recompute dirty against the default.
fn write_value<O: 'static>(
    inner: &FormInner<O>,
    path: &FieldPath,
    value: FieldValue,
) -> Result<(), EngineError> {
    let deliveries = {
        let mut state = inner.state.borrow_mut();
        if state.controlled.is_hydrated(path) == Some(false) {
            return Err(EngineError::NotHydrated(path.to_string()));
        }
        let dirty = state.defaults.get(path) != Some(&value);
        trace!(form_id = %inner.id, %path, dirty, "write");
        let mut deliveries = state.store.set(path, value)?;
        deliveries.extend(state.store.set_dirty(path, dirty));
        deliveries
    };
    deliveries.deliver();
    Ok(())
}
