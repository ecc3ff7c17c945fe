use formstate_core::{FieldPath, FieldValue, ItemToken};
use formstate_store::{
    Deliveries, FormStore, MemoryStore, Notification, StoreError, SubscriptionId,
    SubscriptionTarget,
};
use tracing::debug;

use crate::error::EngineError;
use crate::scope::Scope;

/// One list element for keyed rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayItem {
    pub token: ItemToken,
    pub index: usize,
    pub value: FieldValue,
}

/// List operations on the array at one path.
///
/// Every element carries an [`ItemToken`] that follows it through inserts,
/// removals and moves. Edits mark the list dirty against its default; they
/// never trigger validation.
pub struct ArrayField<O> {
    scope: Scope<O>,
}

impl<O> Clone for ArrayField<O> {
    fn clone(&self) -> Self {
        Self {
            scope: self.scope.clone(),
        }
    }
}

impl<O: 'static> ArrayField<O> {
    pub(crate) fn new(scope: Scope<O>) -> Self {
        Self { scope }
    }

    pub fn path(&self) -> &FieldPath {
        self.scope.path()
    }

    pub fn len(&self) -> Result<usize, EngineError> {
        Ok(self.tokens()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, EngineError> {
        Ok(self.len()? == 0)
    }

    pub fn tokens(&self) -> Result<Vec<ItemToken>, EngineError> {
        let inner = self.scope.inner()?;
        let tokens = inner.state.borrow_mut().store.tokens(self.path())?;
        Ok(tokens)
    }

    pub fn items(&self) -> Result<Vec<ArrayItem>, EngineError> {
        let inner = self.scope.inner()?;
        let mut state = inner.state.borrow_mut();
        let tokens = state.store.tokens(self.path())?;
        let items = state
            .store
            .get(self.path())
            .and_then(FieldValue::as_list)
            .unwrap_or_default();
        let items = tokens
            .into_iter()
            .zip(items.iter().cloned())
            .enumerate()
            .map(|(index, (token, value))| ArrayItem {
                token,
                index,
                value,
            })
            .collect();
        Ok(items)
    }

    /// Scope rooted at the element currently at `index`.
    pub fn item_scope(&self, index: usize) -> Result<Scope<O>, EngineError> {
        self.scope.scope(FieldPath::root().child(index))
    }

    /// Index of the element carrying `token`, if it is still in the list.
    pub fn position(&self, token: ItemToken) -> Result<Option<usize>, EngineError> {
        Ok(self.tokens()?.iter().position(|t| *t == token))
    }

    pub fn push(&self, value: impl Into<FieldValue>) -> Result<ItemToken, EngineError> {
        let index = self.len()?;
        self.insert(index, value)
    }

    pub fn insert(&self, index: usize, value: impl Into<FieldValue>) -> Result<ItemToken, EngineError> {
        let value = value.into();
        self.edit("insert", |store, list| store.insert_at(list, index, value))
    }

    pub fn remove(&self, index: usize) -> Result<FieldValue, EngineError> {
        self.edit("remove", |store, list| store.remove_at(list, index))
    }

    pub fn swap(&self, a: usize, b: usize) -> Result<(), EngineError> {
        self.edit("swap", |store, list| Ok(((), store.swap_items(list, a, b)?)))
    }

    pub fn move_item(&self, from: usize, to: usize) -> Result<(), EngineError> {
        self.edit("move", |store, list| Ok(((), store.move_item(list, from, to)?)))
    }

    /// Follow one element by identity. Moves arrive as
    /// [`ChangeKind::Moved`](formstate_store::ChangeKind::Moved), removal as
    /// [`ChangeKind::Removed`](formstate_store::ChangeKind::Removed).
    pub fn subscribe_item(
        &self,
        token: ItemToken,
        callback: impl Fn(&Notification) + 'static,
    ) -> Result<SubscriptionId, EngineError> {
        self.scope.subscribe_to(
            SubscriptionTarget::Item {
                list: self.path().clone(),
                token,
            },
            callback,
        )
    }

    fn edit<R>(
        &self,
        op: &'static str,
        edit: impl FnOnce(&mut MemoryStore, &FieldPath) -> Result<(R, Deliveries), StoreError>,
    ) -> Result<R, EngineError> {
        let inner = self.scope.inner()?;
        let list = self.path();
        let (result, deliveries) = {
            let mut state = inner.state.borrow_mut();
            let (result, mut deliveries) = edit(&mut state.store, list)?;
            let dirty = state.store.get(list) != state.defaults.get(list);
            deliveries.extend(state.store.set_dirty(list, dirty));
            (result, deliveries)
        };
        debug!(form_id = %inner.id, %list, op, "array edited");
        deliveries.deliver();
        Ok(result)
    }
}
