pub mod array;
pub mod config;
pub mod controlled;
pub mod error;
pub mod form;
pub mod scope;
pub mod submission;
pub mod validation;

pub use array::{ArrayField, ArrayItem};
pub use config::{FormOptions, FormSettings};
pub use controlled::{ControlledField, ControlledStatus};
pub use error::EngineError;
pub use form::{Form, FormSnapshot};
pub use scope::Scope;
pub use submission::{SubmitHandle, SubmitOutcome, SubmitStatus, Transport, TransportError};
pub use validation::{FieldEvent, ValidationReport, ValidationRun, Validator};

pub use formstate_core::{
    FieldErrors, FieldPath, FieldValue, ItemToken, ValidationBehavior, ValidationBehaviorConfig,
    ValidationOutcome,
};
pub use formstate_store::{ChangeKind, Notification, SubscriptionId};
