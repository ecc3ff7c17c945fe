use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::path::FieldPath;

/// When a field event should cause the form to be re-validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationBehavior {
    /// Only an explicit submit validates.
    OnSubmit,
    /// Every change (and blur) validates.
    OnChange,
    /// Only blur validates.
    OnBlur,
}

impl ValidationBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnSubmit => "onSubmit",
            Self::OnChange => "onChange",
            Self::OnBlur => "onBlur",
        }
    }
}

/// Validation timing per lifecycle stage of a field.
///
/// Defaults: `initial = OnSubmit`, `when_touched = OnChange`,
/// `when_submitted = OnChange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationBehaviorConfig {
    /// Before the field is touched and before the first submit attempt.
    pub initial: ValidationBehavior,
    /// Once the field has been touched.
    pub when_touched: ValidationBehavior,
    /// Once the form has been submitted at least once.
    pub when_submitted: ValidationBehavior,
}

impl Default for ValidationBehaviorConfig {
    fn default() -> Self {
        Self {
            initial: ValidationBehavior::OnSubmit,
            when_touched: ValidationBehavior::OnChange,
            when_submitted: ValidationBehavior::OnChange,
        }
    }
}

/// Path-keyed validation messages, iterated in path order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<FieldPath, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: FieldPath, message: impl Into<String>) {
        self.0.insert(path, message.into());
    }

    pub fn get(&self, path: &FieldPath) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &FieldPath) -> bool {
        self.0.contains_key(path)
    }

    pub fn first(&self) -> Option<(&FieldPath, &str)> {
        self.0.iter().next().map(|(p, m)| (p, m.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &str)> {
        self.0.iter().map(|(p, m)| (p, m.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(FieldPath, String)> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = (FieldPath, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Result of running a validator over the whole value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome<O> {
    Valid(O),
    Invalid(FieldErrors),
}

impl<O> ValidationOutcome<O> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid(errors) => Some(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ValidationBehaviorConfig =
            serde_json::from_str(r#"{"whenTouched": "onBlur"}"#).unwrap();
        assert_eq!(config.initial, ValidationBehavior::OnSubmit);
        assert_eq!(config.when_touched, ValidationBehavior::OnBlur);
        assert_eq!(config.when_submitted, ValidationBehavior::OnChange);
    }

    #[test]
    fn errors_iterate_in_path_order() {
        let errors: FieldErrors = [
            (FieldPath::parse("todos[1].title").unwrap(), "b".to_string()),
            (FieldPath::parse("todos[0].title").unwrap(), "a".to_string()),
        ]
        .into_iter()
        .collect();
        let (path, message) = errors.first().unwrap();
        assert_eq!(path.to_string(), "todos[0].title");
        assert_eq!(message, "a");
    }
}
