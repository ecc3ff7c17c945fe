use std::cell::RefCell;
use std::rc::Rc;

use formstate_core::FieldValue;
use formstate_engine::{Form, FormOptions, Validator};

use crate::transport::RecordingTransport;

/// Ordered record of form callbacks, for asserting what fired and when.
#[derive(Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<String>>>);

impl EventLog {
    pub fn record(&self, event: impl Into<String>) {
        self.0.borrow_mut().push(event.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.borrow().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

/// Defaults for the todo form: `{todos: [{id: "a", title}]}`.
pub fn todo_defaults(title: &str) -> FieldValue {
    FieldValue::object([(
        "todos",
        FieldValue::list([FieldValue::object([
            ("id", FieldValue::from("a")),
            ("title", FieldValue::from(title)),
        ])]),
    )])
}

/// A form wired to a [`RecordingTransport`] with every outcome callback
/// logged to an [`EventLog`].
pub struct TestForm {
    pub form: Form<FieldValue>,
    pub transport: RecordingTransport,
    pub events: EventLog,
}

impl TestForm {
    pub fn new(defaults: FieldValue, validator: impl Validator<FieldValue> + 'static) -> Self {
        Self::with_options(defaults, validator, |options| options)
    }

    /// Like [`TestForm::new`], with a hook to adjust the options last.
    pub fn with_options(
        defaults: FieldValue,
        validator: impl Validator<FieldValue> + 'static,
        configure: impl FnOnce(FormOptions<FieldValue>) -> FormOptions<FieldValue>,
    ) -> Self {
        let transport = RecordingTransport::new();
        let events = EventLog::default();

        let success = events.clone();
        let failure = events.clone();
        let invalid = events.clone();
        let focus = events.clone();
        let options = FormOptions::new(defaults, validator)
            .transport(transport.clone())
            .on_submit_success(move || success.record("success"))
            .on_submit_failure(move |err| failure.record(format!("failure: {err}")))
            .on_invalid_submit(move |errors| invalid.record(format!("invalid: {}", errors.len())))
            .on_focus_error(move |path| focus.record(format!("focus: {path}")));

        Self {
            form: Form::new(configure(options)),
            transport,
            events,
        }
    }
}
