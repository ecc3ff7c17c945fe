mod form;
mod transport;
mod validators;

pub use form::{EventLog, TestForm, todo_defaults};
pub use transport::RecordingTransport;
pub use validators::{DeferredValidator, errors, require_titles, required};
