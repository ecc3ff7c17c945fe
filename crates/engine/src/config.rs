use std::rc::Rc;

use formstate_core::{FieldErrors, FieldPath, FieldValue, ValidationBehaviorConfig};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::submission::{Transport, TransportError};
use crate::validation::Validator;

/// Plain-data form settings, loadable from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormSettings {
    pub validation_behavior: ValidationBehaviorConfig,
    /// After a successful submit, make the submitted values the new defaults.
    pub reset_after_submit: bool,
    /// Skip the focus callback on an invalid submit.
    pub disable_focus_on_error: bool,
}

impl FormSettings {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }
}

pub(crate) struct Callbacks<O> {
    pub(crate) on_before_submit: Option<Box<dyn Fn(&O) -> bool>>,
    pub(crate) on_submit_success: Option<Box<dyn Fn()>>,
    pub(crate) on_submit_failure: Option<Box<dyn Fn(TransportError)>>,
    pub(crate) on_invalid_submit: Option<Box<dyn Fn(&FieldErrors)>>,
    pub(crate) on_focus_error: Option<Box<dyn Fn(&FieldPath)>>,
}

impl<O> Default for Callbacks<O> {
    fn default() -> Self {
        Self {
            on_before_submit: None,
            on_submit_success: None,
            on_submit_failure: None,
            on_invalid_submit: None,
            on_focus_error: None,
        }
    }
}

/// Everything needed to create a [`Form`](crate::Form).
pub struct FormOptions<O> {
    pub(crate) defaults: FieldValue,
    pub(crate) validator: Rc<dyn Validator<O>>,
    pub(crate) transport: Option<Rc<dyn Transport<O>>>,
    pub(crate) settings: FormSettings,
    pub(crate) server_errors: FieldErrors,
    pub(crate) callbacks: Callbacks<O>,
}

impl<O: 'static> FormOptions<O> {
    pub fn new(defaults: FieldValue, validator: impl Validator<O> + 'static) -> Self {
        Self {
            defaults,
            validator: Rc::new(validator),
            transport: None,
            settings: FormSettings::default(),
            server_errors: FieldErrors::new(),
            callbacks: Callbacks::default(),
        }
    }

    pub fn transport(mut self, transport: impl Transport<O> + 'static) -> Self {
        self.transport = Some(Rc::new(transport));
        self
    }

    pub fn settings(mut self, settings: FormSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn validation_behavior(mut self, config: ValidationBehaviorConfig) -> Self {
        self.settings.validation_behavior = config;
        self
    }

    pub fn reset_after_submit(mut self, reset: bool) -> Self {
        self.settings.reset_after_submit = reset;
        self
    }

    /// Errors reported by a previous server round-trip, shown until the next validation clears them.
    pub fn server_errors(mut self, errors: FieldErrors) -> Self {
        self.server_errors = errors;
        self
    }

    /// Runs after successful validation; returning `false` cancels the submit.
    pub fn on_before_submit(mut self, f: impl Fn(&O) -> bool + 'static) -> Self {
        self.callbacks.on_before_submit = Some(Box::new(f));
        self
    }

    pub fn on_submit_success(mut self, f: impl Fn() + 'static) -> Self {
        self.callbacks.on_submit_success = Some(Box::new(f));
        self
    }

    pub fn on_submit_failure(mut self, f: impl Fn(TransportError) + 'static) -> Self {
        self.callbacks.on_submit_failure = Some(Box::new(f));
        self
    }

    pub fn on_invalid_submit(mut self, f: impl Fn(&FieldErrors) + 'static) -> Self {
        self.callbacks.on_invalid_submit = Some(Box::new(f));
        self
    }

    pub fn on_focus_error(mut self, f: impl Fn(&FieldPath) + 'static) -> Self {
        self.callbacks.on_focus_error = Some(Box::new(f));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formstate_core::ValidationBehavior;

    #[test]
    fn settings_from_json() {
        let settings = FormSettings::from_json(
            r#"{"validationBehavior": {"initial": "onBlur"}, "resetAfterSubmit": true}"#,
        )
        .unwrap();
        assert_eq!(settings.validation_behavior.initial, ValidationBehavior::OnBlur);
        assert_eq!(
            settings.validation_behavior.when_touched,
            ValidationBehavior::OnChange
        );
        assert!(settings.reset_after_submit);
        assert!(!settings.disable_focus_on_error);
    }

    #[test]
    fn malformed_settings_are_rejected() {
        let err = FormSettings::from_json(r#"{"resetAfterSubmit": "yes"}"#).unwrap_err();
        assert!(matches!(err, EngineError::Settings(_)));
    }
}
