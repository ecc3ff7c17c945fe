use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use formstate_core::{
    FieldErrors, FieldValue, ValidationBehavior, ValidationBehaviorConfig, ValidationOutcome,
};
use futures::FutureExt;
use futures::future::LocalBoxFuture;

/// Validates the whole value tree.
///
/// Implementations must be free of side effects: the form may run a
/// validator more than once for the same values.
pub trait Validator<O> {
    fn validate(&self, values: FieldValue) -> LocalBoxFuture<'static, ValidationOutcome<O>>;
}

impl<O, F, Fut> Validator<O> for F
where
    F: Fn(FieldValue) -> Fut,
    Fut: Future<Output = ValidationOutcome<O>> + 'static,
{
    fn validate(&self, values: FieldValue) -> LocalBoxFuture<'static, ValidationOutcome<O>> {
        self(values).boxed_local()
    }
}

/// A field interaction that may trigger validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEvent {
    Change,
    Blur,
    Submit,
}

/// Decides when to validate and which validation results are still current.
///
/// Every run takes the next sequence number when it starts. Only the most
/// recently started run may write its results; anything older is stale.
#[derive(Debug, Default)]
pub struct ValidationOrchestrator {
    config: ValidationBehaviorConfig,
    latest: u64,
}

impl ValidationOrchestrator {
    pub fn new(config: ValidationBehaviorConfig) -> Self {
        Self { config, latest: 0 }
    }

    pub fn config(&self) -> &ValidationBehaviorConfig {
        &self.config
    }

    pub fn behavior_for(&self, touched: bool, submitted: bool) -> ValidationBehavior {
        if submitted {
            self.config.when_submitted
        } else if touched {
            self.config.when_touched
        } else {
            self.config.initial
        }
    }

    /// `touched` and `submitted` describe the field before the event is applied.
    pub fn should_validate(&self, event: FieldEvent, touched: bool, submitted: bool) -> bool {
        match (event, self.behavior_for(touched, submitted)) {
            (FieldEvent::Submit, _) => true,
            (_, ValidationBehavior::OnSubmit) => false,
            (_, ValidationBehavior::OnChange) => true,
            (FieldEvent::Blur, ValidationBehavior::OnBlur) => true,
            (FieldEvent::Change, ValidationBehavior::OnBlur) => false,
        }
    }

    pub fn begin(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn is_current(&self, seq: u64) -> bool {
        seq == self.latest
    }

    /// Make every run started so far stale.
    pub fn invalidate(&mut self) {
        self.latest += 1;
    }
}

/// What a finished validation run produced.
#[derive(Debug)]
pub struct ValidationReport<O> {
    pub seq: u64,
    /// False when a later run had started, so the results were discarded.
    pub applied: bool,
    pub outcome: ValidationOutcome<O>,
}

impl<O> ValidationReport<O> {
    pub fn errors(&self) -> Option<&FieldErrors> {
        self.outcome.errors()
    }
}

/// An in-flight validation run. The validator has already been called; the
/// results are written to the form when this future completes.
#[must_use = "validation results are only applied when the run is awaited"]
pub struct ValidationRun<O> {
    seq: u64,
    future: LocalBoxFuture<'static, ValidationReport<O>>,
}

impl<O> ValidationRun<O> {
    pub(crate) fn new(seq: u64, future: LocalBoxFuture<'static, ValidationReport<O>>) -> Self {
        Self { seq, future }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl<O> Future for ValidationRun<O> {
    type Output = ValidationReport<O>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}
