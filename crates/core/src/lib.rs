pub mod error;
pub mod field_value;
pub mod ids;
pub mod path;
pub mod validation;

pub use error::CoreError;
pub use field_value::{FieldValue, MAX_LIST_PADDING};
pub use ids::*;
pub use path::{FieldPath, IntoFieldPath, PathKey};
pub use validation::*;
