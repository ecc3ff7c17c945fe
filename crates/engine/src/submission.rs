use std::future::Future;

use formstate_core::{FieldErrors, FieldValue};
use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use serde::Serialize;

/// Implementation-defined transport failure, handed to the failure callback as-is.
pub type TransportError = Box<dyn std::error::Error>;

/// Sends validated form data somewhere.
pub trait Transport<O> {
    fn submit(&self, values: FieldValue, output: O) -> LocalBoxFuture<'static, Result<(), TransportError>>;
}

impl<O, F, Fut> Transport<O> for F
where
    F: Fn(FieldValue, O) -> Fut,
    Fut: Future<Output = Result<(), TransportError>> + 'static,
{
    fn submit(&self, values: FieldValue, output: O) -> LocalBoxFuture<'static, Result<(), TransportError>> {
        self(values, output).boxed_local()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubmitStatus {
    #[default]
    Idle,
    Submitting,
    Error,
    Success,
}

impl SubmitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Error => "error",
            Self::Success => "success",
        }
    }
}

/// How one submit attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The transport accepted the data.
    Submitted,
    /// Validation failed; the transport was not called.
    Invalid(FieldErrors),
    /// The transport rejected the data.
    Failed(String),
    /// The before-submit hook declined.
    Cancelled,
    /// The form was reset or dropped while the attempt was in flight.
    Superseded,
}

/// Handle to the in-flight submit attempt. Clones share one attempt.
pub type SubmitHandle = Shared<LocalBoxFuture<'static, SubmitOutcome>>;

/// Submit status plus history for one form instance.
#[derive(Debug, Clone, Default)]
pub struct SubmissionState {
    status: SubmitStatus,
    has_been_submitted: bool,
    submit_count: u32,
    // Bumped on reset so attempts started before it cannot finish.
    generation: u64,
}

impl SubmissionState {
    pub fn status(&self) -> SubmitStatus {
        self.status
    }

    pub fn has_been_submitted(&self) -> bool {
        self.has_been_submitted
    }

    pub fn submit_count(&self) -> u32 {
        self.submit_count
    }

    pub fn is_submitting(&self) -> bool {
        self.status == SubmitStatus::Submitting
    }

    /// Start an attempt; returns the generation it belongs to.
    pub fn begin(&mut self) -> u64 {
        self.has_been_submitted = true;
        self.submit_count += 1;
        self.status = SubmitStatus::Submitting;
        self.generation
    }

    /// Record the end of an attempt. Returns false if the attempt was superseded by a reset.
    pub fn finish(&mut self, generation: u64, status: SubmitStatus) -> bool {
        if generation != self.generation || self.status != SubmitStatus::Submitting {
            return false;
        }
        self.status = status;
        true
    }

    pub fn reset(&mut self) {
        *self = Self {
            generation: self.generation + 1,
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_marks_history() {
        let mut state = SubmissionState::default();
        assert_eq!(state.status(), SubmitStatus::Idle);
        let generation = state.begin();
        assert!(state.has_been_submitted());
        assert_eq!(state.submit_count(), 1);
        assert!(state.finish(generation, SubmitStatus::Error));

        let generation = state.begin();
        assert_eq!(state.status(), SubmitStatus::Submitting);
        assert_eq!(state.submit_count(), 2);
        assert!(state.finish(generation, SubmitStatus::Success));
        assert!(state.has_been_submitted());
    }

    #[test]
    fn reset_supersedes_in_flight_attempt() {
        let mut state = SubmissionState::default();
        let generation = state.begin();
        state.reset();
        assert!(!state.has_been_submitted());
        assert_eq!(state.submit_count(), 0);
        assert!(!state.finish(generation, SubmitStatus::Success));
        assert_eq!(state.status(), SubmitStatus::Idle);
    }
}
