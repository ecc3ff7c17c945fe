use std::cell::RefCell;
use std::rc::Rc;

use formstate_core::{CoreError, FieldErrors, FieldPath, FieldValue, ValidationOutcome};
use formstate_engine::Validator;
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{LocalBoxFuture, Ready, ready};

/// Build a [`FieldErrors`] map from `(path, message)` pairs.
pub fn errors(entries: &[(&str, &str)]) -> Result<FieldErrors, CoreError> {
    let mut out = FieldErrors::new();
    for (path, message) in entries {
        out.insert(FieldPath::parse(path)?, *message);
    }
    Ok(out)
}

fn is_blank(value: Option<&FieldValue>) -> bool {
    match value {
        None | Some(FieldValue::Null) => true,
        Some(FieldValue::Text(text)) => text.trim().is_empty(),
        Some(_) => false,
    }
}

/// Validator that reports `"required"` at each listed path whose value is
/// missing, null or blank text. The output is the validated tree itself.
pub fn required(
    paths: &[&str],
) -> Result<impl Fn(FieldValue) -> Ready<ValidationOutcome<FieldValue>> + 'static, CoreError> {
    let paths = paths
        .iter()
        .map(|p| FieldPath::parse(p))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(move |values: FieldValue| {
        let errors: FieldErrors = paths
            .iter()
            .filter(|path| is_blank(values.get(path)))
            .map(|path| (path.clone(), "required".to_string()))
            .collect();
        ready(if errors.is_empty() {
            ValidationOutcome::Valid(values)
        } else {
            ValidationOutcome::Invalid(errors)
        })
    })
}

/// Requires a non-blank `title` on every element of `todos`.
pub fn require_titles(values: FieldValue) -> Ready<ValidationOutcome<FieldValue>> {
    let todos = FieldPath::root().child("todos");
    let count = values.get(&todos).and_then(FieldValue::as_list).map_or(0, <[_]>::len);
    let errors: FieldErrors = (0..count)
        .map(|i| todos.child(i).child("title"))
        .filter(|path| is_blank(values.get(path)))
        .map(|path| (path, "title is required".to_string()))
        .collect();
    ready(if errors.is_empty() {
        ValidationOutcome::Valid(values)
    } else {
        ValidationOutcome::Invalid(errors)
    })
}

type Pending = Vec<Option<oneshot::Sender<ValidationOutcome<FieldValue>>>>;

/// Validator whose runs stay pending until the test resolves them, in any
/// order. Clones share the same queue.
#[derive(Clone, Default)]
pub struct DeferredValidator {
    pending: Rc<RefCell<Pending>>,
    inputs: Rc<RefCell<Vec<FieldValue>>>,
}

impl DeferredValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the validator has been called.
    pub fn calls(&self) -> usize {
        self.inputs.borrow().len()
    }

    /// Tree passed to call number `call`.
    pub fn input(&self, call: usize) -> Option<FieldValue> {
        self.inputs.borrow().get(call).cloned()
    }

    /// Complete call number `call`. Returns false if it was already resolved
    /// or never made.
    pub fn resolve(&self, call: usize, outcome: ValidationOutcome<FieldValue>) -> bool {
        let sender = self
            .pending
            .borrow_mut()
            .get_mut(call)
            .and_then(Option::take);
        match sender {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Complete call number `call` as valid, echoing its input as output.
    pub fn pass(&self, call: usize) -> bool {
        let values = self.input(call).unwrap_or_default();
        self.resolve(call, ValidationOutcome::Valid(values))
    }
}

impl Validator<FieldValue> for DeferredValidator {
    fn validate(&self, values: FieldValue) -> LocalBoxFuture<'static, ValidationOutcome<FieldValue>> {
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().push(Some(tx));
        self.inputs.borrow_mut().push(values.clone());
        async move {
            // A dropped sender means the test abandoned the run.
            rx.await.unwrap_or(ValidationOutcome::Valid(values))
        }
        .boxed_local()
    }
}
