use std::collections::{BTreeMap, BTreeSet};

use formstate_core::{FieldPath, FieldValue};
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use tracing::trace;

use crate::error::EngineError;
use crate::scope::Scope;
use crate::validation::ValidationRun;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlledStatus {
    Unhydrated,
    Hydrated,
}

impl ControlledStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unhydrated => "unhydrated",
            Self::Hydrated => "hydrated",
        }
    }
}

struct ControlledRecord {
    mount: u64,
    status: ControlledStatus,
    /// Waiters for the next render after a set.
    waiters: Vec<oneshot::Sender<()>>,
    pending_update: bool,
}

/// Registry of mounted controlled fields for one form instance.
#[derive(Default)]
pub(crate) struct ControlledFields {
    records: BTreeMap<FieldPath, ControlledRecord>,
    /// Paths whose default has already been copied into the store since the
    /// last reset. A remount of one of these keeps the live value.
    seeded: BTreeSet<FieldPath>,
    next_mount: u64,
}

impl ControlledFields {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a mount at `path`, replacing any earlier mount there.
    pub(crate) fn register(&mut self, path: FieldPath) -> u64 {
        self.next_mount += 1;
        let mount = self.next_mount;
        self.records.insert(
            path,
            ControlledRecord {
                mount,
                status: ControlledStatus::Unhydrated,
                waiters: Vec::new(),
                pending_update: false,
            },
        );
        mount
    }

    /// Drop the registration if it still belongs to `mount`. Pending waiters
    /// are cancelled.
    pub(crate) fn unregister(&mut self, path: &FieldPath, mount: u64) -> bool {
        if self.records.get(path).is_some_and(|r| r.mount == mount) {
            self.records.remove(path);
            true
        } else {
            false
        }
    }

    pub(crate) fn status(&self, path: &FieldPath, mount: u64) -> Option<ControlledStatus> {
        self.records
            .get(path)
            .filter(|r| r.mount == mount)
            .map(|r| r.status)
    }

    /// `None` when nothing is mounted at `path`.
    pub(crate) fn is_hydrated(&self, path: &FieldPath) -> Option<bool> {
        self.records
            .get(path)
            .map(|r| r.status == ControlledStatus::Hydrated)
    }

    pub(crate) fn unhydrated(&self) -> Vec<FieldPath> {
        self.records
            .iter()
            .filter(|(_, r)| r.status == ControlledStatus::Unhydrated)
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Flip the mounted field to hydrated. Returns whether its default still
    /// needs to be copied into the store.
    pub(crate) fn mark_hydrated(&mut self, path: &FieldPath) -> bool {
        if let Some(record) = self.records.get_mut(path) {
            record.status = ControlledStatus::Hydrated;
        }
        self.seeded.insert(path.clone())
    }

    pub(crate) fn forget_hydrated_values(&mut self) {
        self.seeded.clear();
    }

    pub(crate) fn record_update(&mut self, path: &FieldPath) {
        if let Some(record) = self.records.get_mut(path) {
            record.pending_update = true;
        }
    }

    /// Wait for the next render of `path`, or `None` if no set is pending.
    pub(crate) fn wait(&mut self, path: &FieldPath) -> Option<oneshot::Receiver<()>> {
        let record = self.records.get_mut(path)?;
        if !record.pending_update {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        record.waiters.push(tx);
        Some(rx)
    }

    /// A render pass saw the latest value; release everyone waiting on it.
    pub(crate) fn acknowledge(&mut self, path: &FieldPath) -> Vec<oneshot::Sender<()>> {
        match self.records.get_mut(path) {
            Some(record) => {
                record.pending_update = false;
                std::mem::take(&mut record.waiters)
            }
            None => Vec::new(),
        }
    }
}

/// A mounted store-backed field.
///
/// The store holds the authoritative value. Until the form is hydrated, reads
/// return the default value and writes fail with [`EngineError::NotHydrated`].
/// Dropping the handle does not unmount; call [`ControlledField::unmount`].
pub struct ControlledField<O> {
    scope: Scope<O>,
    mount: u64,
}

impl<O: 'static> ControlledField<O> {
    pub(crate) fn mount(scope: Scope<O>) -> Result<Self, EngineError> {
        let inner = scope.inner()?;
        let mount = inner
            .state
            .borrow_mut()
            .controlled
            .register(scope.path().clone());
        trace!(form_id = %inner.id, path = %scope.path(), mount, "controlled field mounted");
        inner.hydrate_field(scope.path())?;
        Ok(Self { scope, mount })
    }

    pub fn path(&self) -> &FieldPath {
        self.scope.path()
    }

    pub fn status(&self) -> Result<ControlledStatus, EngineError> {
        let inner = self.scope.inner()?;
        let state = inner.state.borrow();
        state
            .controlled
            .status(self.path(), self.mount)
            .ok_or_else(|| EngineError::NotMounted(self.path().to_string()))
    }

    pub fn is_hydrated(&self) -> Result<bool, EngineError> {
        Ok(self.status()? == ControlledStatus::Hydrated)
    }

    /// The default value until hydrated, the live store value after.
    pub fn value(&self) -> Result<Option<FieldValue>, EngineError> {
        if self.is_hydrated()? {
            self.scope.value("")
        } else {
            self.scope.default_value("")
        }
    }

    pub fn default_value(&self) -> Result<Option<FieldValue>, EngineError> {
        self.scope.default_value("")
    }

    /// Write the store and recompute dirty against the default.
    pub fn set_value(
        &self,
        value: impl Into<FieldValue>,
    ) -> Result<Option<ValidationRun<O>>, EngineError> {
        if !self.is_hydrated()? {
            return Err(EngineError::NotHydrated(self.path().to_string()));
        }
        let run = self.scope.change("", value)?;
        self.scope
            .inner()?
            .state
            .borrow_mut()
            .controlled
            .record_update(self.path());
        Ok(run)
    }

    /// A render pass of the field: hydrate if the form is ready, then release
    /// anyone awaiting the latest set.
    pub fn render(&self) -> Result<Option<FieldValue>, EngineError> {
        let inner = self.scope.inner()?;
        self.status()?;
        inner.hydrate_field(self.path())?;
        let waiters = inner.state.borrow_mut().controlled.acknowledge(self.path());
        for waiter in waiters {
            let _ = waiter.send(());
        }
        self.value()
    }

    /// Resolves with the live value once a render has acknowledged the most
    /// recent `set_value`; immediately if none is pending.
    pub fn await_value(&self) -> LocalBoxFuture<'static, Result<Option<FieldValue>, EngineError>> {
        let scope = self.scope.clone();
        let waiting = match scope.inner() {
            Ok(inner) => {
                let rx = inner.state.borrow_mut().controlled.wait(scope.path());
                Ok(rx)
            }
            Err(err) => Err(err),
        };
        async move {
            if let Some(rx) = waiting? {
                rx.await
                    .map_err(|_| EngineError::NotMounted(scope.path().to_string()))?;
            }
            scope.value("")
        }
        .boxed_local()
    }

    pub fn unmount(self) -> Result<(), EngineError> {
        let inner = self.scope.inner()?;
        let removed = inner
            .state
            .borrow_mut()
            .controlled
            .unregister(self.path(), self.mount);
        if removed {
            trace!(form_id = %inner.id, path = %self.path(), "controlled field unmounted");
        }
        Ok(())
    }
}

impl<O> std::fmt::Debug for ControlledField<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlledField")
            .field("path", self.scope.path())
            .field("mount", &self.mount)
            .finish()
    }
}
