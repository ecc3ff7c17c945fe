use formstate_core::{FieldPath, FieldValue, ItemToken};

use crate::error::StoreError;
use crate::subscribers::Deliveries;

/// Interaction metadata for one field path.
///
/// Paths without a record are implicitly `FieldMeta::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMeta {
    pub dirty: bool,
    pub touched: bool,
    pub error: Option<String>,
}

impl FieldMeta {
    pub fn is_default(&self) -> bool {
        !self.dirty && !self.touched && self.error.is_none()
    }
}

/// State of one form instance: the value tree, per-path metadata and list
/// item identity.
///
/// Every mutation returns the [`Deliveries`] it produced; nothing is sent to
/// subscribers until the caller delivers them.
pub trait FormStore {
    fn values(&self) -> &FieldValue;

    fn get(&self, path: &FieldPath) -> Option<&FieldValue>;

    fn set(&mut self, path: &FieldPath, value: FieldValue) -> Result<Deliveries, StoreError>;

    fn insert_at(
        &mut self,
        list: &FieldPath,
        index: usize,
        value: FieldValue,
    ) -> Result<(ItemToken, Deliveries), StoreError>;

    fn remove_at(
        &mut self,
        list: &FieldPath,
        index: usize,
    ) -> Result<(FieldValue, Deliveries), StoreError>;

    fn move_item(
        &mut self,
        list: &FieldPath,
        from: usize,
        to: usize,
    ) -> Result<Deliveries, StoreError>;

    fn swap_items(&mut self, list: &FieldPath, a: usize, b: usize)
        -> Result<Deliveries, StoreError>;

    /// Identity tokens of the list at `list`, in index order.
    fn tokens(&mut self, list: &FieldPath) -> Result<Vec<ItemToken>, StoreError>;

    fn meta(&self, path: &FieldPath) -> FieldMeta;

    fn set_dirty(&mut self, path: &FieldPath, dirty: bool) -> Deliveries;

    fn set_touched(&mut self, path: &FieldPath, touched: bool) -> Deliveries;

    /// `None` clears the error; `Some("")` is a distinct, empty error.
    fn set_error(&mut self, path: &FieldPath, error: Option<String>) -> Deliveries;

    fn any_dirty(&self, path: &FieldPath) -> bool;

    fn any_touched(&self, path: &FieldPath) -> bool;

    /// First error at or below `path`, in path order.
    fn first_error(&self, path: &FieldPath) -> Option<(FieldPath, String)>;

    fn error_paths(&self) -> Vec<FieldPath>;

    /// Replace the value tree and drop all metadata and item tokens.
    fn reset(&mut self, values: FieldValue) -> Deliveries;
}
