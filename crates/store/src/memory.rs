use std::collections::BTreeMap;
use std::mem;
use std::rc::Rc;

use formstate_core::{CoreError, FieldPath, FieldValue, ItemToken};
use tracing::trace;

use crate::error::StoreError;
use crate::subscribers::{
    ChangeKind, Deliveries, Notification, SubscriptionId, SubscriptionTarget, Subscribers,
};
use crate::traits::{FieldMeta, FormStore};

type TokenMap = BTreeMap<FieldPath, Vec<ItemToken>>;

fn same(a: Option<&FieldValue>, b: Option<&FieldValue>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.same_ref(b),
        _ => false,
    }
}

fn position(tokens: &TokenMap, list: &FieldPath, token: &ItemToken) -> Option<usize> {
    tokens.get(list)?.iter().position(|t| t == token)
}

/// Move every entry keyed inside an element of `list` to the element index
/// given by `remap`; entries mapped to `None` are dropped.
fn rekey<T>(map: &mut BTreeMap<FieldPath, T>, list: &FieldPath, remap: impl Fn(usize) -> Option<usize>) {
    let affected: Vec<FieldPath> = map
        .range(list.clone()..)
        .take_while(|(key, _)| list.is_ancestor_of(key))
        .filter(|(key, _)| key.index_under(list).is_some())
        .map(|(key, _)| key.clone())
        .collect();

    let mut moved = Vec::with_capacity(affected.len());
    for key in affected {
        let Some(entry) = map.remove(&key) else {
            continue;
        };
        let Some(index) = key.index_under(list) else {
            continue;
        };
        if let Some(new_index) = remap(index) {
            moved.push((key.reindex_under(list, new_index), entry));
        }
    }
    map.extend(moved);
}

/// In-memory store for one form instance.
pub struct MemoryStore {
    values: FieldValue,
    meta: BTreeMap<FieldPath, FieldMeta>,
    tokens: TokenMap,
    subscribers: Subscribers,
}

impl MemoryStore {
    pub fn new(values: FieldValue) -> Self {
        Self {
            values,
            meta: BTreeMap::new(),
            tokens: BTreeMap::new(),
            subscribers: Subscribers::default(),
        }
    }

    pub fn subscribe(
        &mut self,
        target: SubscriptionTarget,
        callback: impl Fn(&Notification) + 'static,
    ) -> SubscriptionId {
        self.subscribers.add(target, Rc::new(callback))
    }

    /// Idempotent: returns `false` if the subscription was already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn list_len(&self, list: &FieldPath) -> Result<usize, StoreError> {
        match self.values.get(list) {
            None | Some(FieldValue::Null) => Ok(0),
            Some(FieldValue::List(items)) => Ok(items.len()),
            Some(other) => Err(CoreError::NotAContainer {
                path: list.to_string(),
                kind: other.kind(),
            }
            .into()),
        }
    }

    fn check_index(&self, list: &FieldPath, index: usize, len: usize) -> Result<(), StoreError> {
        if index >= len {
            return Err(StoreError::IndexOutOfBounds {
                path: list.to_string(),
                index,
                len,
            });
        }
        Ok(())
    }

    /// Apply a list edit to a copy of the tree and swap it in, returning the
    /// previous tree and token map for diffing.
    fn edit_list<R>(
        &mut self,
        list: &FieldPath,
        edit: impl FnOnce(&mut Vec<FieldValue>, &mut Vec<ItemToken>) -> R,
    ) -> Result<(R, FieldValue, TokenMap), StoreError> {
        self.tokens(list)?;
        let before_tokens = self.tokens.clone();

        let mut next = self.values.clone();
        let items = next.list_mut(list)?;
        let tokens = self.tokens.entry(list.clone()).or_default();
        let result = edit(items, tokens);

        let before = mem::replace(&mut self.values, next);
        Ok((result, before, before_tokens))
    }

    /// Bring materialized token lists in line with list lengths after `path` was replaced.
    fn reconcile_tokens(&mut self, path: &FieldPath) {
        let affected: Vec<FieldPath> = self
            .tokens
            .keys()
            .filter(|list| list.is_ancestor_of(path) || path.is_ancestor_of(list))
            .cloned()
            .collect();

        for list in affected {
            match self.values.get(&list).and_then(FieldValue::as_list) {
                Some(items) => {
                    let len = items.len();
                    if let Some(tokens) = self.tokens.get_mut(&list) {
                        tokens.resize_with(len, ItemToken::new);
                    }
                }
                None => {
                    self.tokens.remove(&list);
                }
            }
        }
    }

    /// Drop metadata below `path` whose location the new value no longer has.
    fn prune_meta(&mut self, path: &FieldPath) -> Vec<FieldPath> {
        let stale: Vec<FieldPath> = self
            .descendants(path)
            .filter(|(key, _)| *key != path && self.values.get(key).is_none())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            self.meta.remove(key);
        }
        stale
    }

    fn value_deliveries(&self, before: &FieldValue, before_tokens: &TokenMap) -> Deliveries {
        let mut out = Deliveries::default();
        for sub in self.subscribers.iter() {
            match &sub.target {
                SubscriptionTarget::Path(path) => {
                    let current = self.values.get(path);
                    if !same(before.get(path), current) {
                        out.push(sub.deliver(Notification {
                            path: path.clone(),
                            kind: ChangeKind::Value,
                            value: current.cloned(),
                        }));
                    }
                }
                SubscriptionTarget::Item { list, token } => {
                    let old = position(before_tokens, list, token);
                    let new = position(&self.tokens, list, token);
                    match (old, new) {
                        (Some(from), Some(to)) => {
                            let path = list.child(to);
                            let current = self.values.get(&path);
                            if !same(before.get(&list.child(from)), current) {
                                out.push(sub.deliver(Notification {
                                    path,
                                    kind: ChangeKind::Value,
                                    value: current.cloned(),
                                }));
                            } else if from != to {
                                out.push(sub.deliver(Notification {
                                    path,
                                    kind: ChangeKind::Moved { from, to },
                                    value: current.cloned(),
                                }));
                            }
                        }
                        (Some(from), None) => out.push(sub.deliver(Notification {
                            path: list.child(from),
                            kind: ChangeKind::Removed,
                            value: None,
                        })),
                        (None, Some(to)) => {
                            let path = list.child(to);
                            let value = self.values.get(&path).cloned();
                            out.push(sub.deliver(Notification {
                                path,
                                kind: ChangeKind::Value,
                                value,
                            }));
                        }
                        (None, None) => {}
                    }
                }
            }
        }
        out
    }

    fn meta_deliveries(&self, changed: &[FieldPath]) -> Deliveries {
        let mut out = Deliveries::default();
        for sub in self.subscribers.iter() {
            let watched = match &sub.target {
                SubscriptionTarget::Path(path) => Some(path.clone()),
                SubscriptionTarget::Item { list, token } => {
                    position(&self.tokens, list, token).map(|i| list.child(i))
                }
            };
            let Some(watched) = watched else {
                continue;
            };
            if changed.iter().any(|path| watched.is_ancestor_of(path)) {
                let value = self.values.get(&watched).cloned();
                out.push(sub.deliver(Notification {
                    path: watched,
                    kind: ChangeKind::Meta,
                    value,
                }));
            }
        }
        out
    }

    fn update_meta(&mut self, path: &FieldPath, update: impl FnOnce(&mut FieldMeta)) -> Deliveries {
        let before = self.meta.get(path).cloned().unwrap_or_default();
        let mut record = before.clone();
        update(&mut record);
        if record == before {
            return Deliveries::default();
        }

        trace!(%path, dirty = record.dirty, touched = record.touched, error = ?record.error, "field metadata updated");
        if record.is_default() {
            self.meta.remove(path);
        } else {
            self.meta.insert(path.clone(), record);
        }
        self.meta_deliveries(std::slice::from_ref(path))
    }

    fn descendants<'a>(
        &'a self,
        path: &'a FieldPath,
    ) -> impl Iterator<Item = (&'a FieldPath, &'a FieldMeta)> + 'a {
        self.meta
            .range(path.clone()..)
            .take_while(move |(key, _)| path.is_ancestor_of(key))
    }
}

impl FormStore for MemoryStore {
    fn values(&self) -> &FieldValue {
        &self.values
    }

    fn get(&self, path: &FieldPath) -> Option<&FieldValue> {
        self.values.get(path)
    }

    fn set(&mut self, path: &FieldPath, value: FieldValue) -> Result<Deliveries, StoreError> {
        let mut next = self.values.clone();
        next.set(path, value)?;
        let before = mem::replace(&mut self.values, next);
        let before_tokens = self.tokens.clone();
        self.reconcile_tokens(path);
        let pruned = self.prune_meta(path);

        trace!(%path, pruned = pruned.len(), "value set");
        let mut out = self.value_deliveries(&before, &before_tokens);
        if !pruned.is_empty() {
            out.extend(self.meta_deliveries(&pruned));
        }
        Ok(out)
    }

    fn insert_at(
        &mut self,
        list: &FieldPath,
        index: usize,
        value: FieldValue,
    ) -> Result<(ItemToken, Deliveries), StoreError> {
        let len = self.list_len(list)?;
        if index > len {
            return Err(StoreError::IndexOutOfBounds {
                path: list.to_string(),
                index,
                len,
            });
        }

        let (token, before, before_tokens) = self.edit_list(list, |items, tokens| {
            let token = ItemToken::new();
            items.insert(index, value);
            tokens.insert(index, token);
            token
        })?;
        let shift = |i: usize| Some(if i >= index { i + 1 } else { i });
        rekey(&mut self.meta, list, shift);
        rekey(&mut self.tokens, list, shift);

        trace!(%list, index, %token, "list item inserted");
        Ok((token, self.value_deliveries(&before, &before_tokens)))
    }

    fn remove_at(
        &mut self,
        list: &FieldPath,
        index: usize,
    ) -> Result<(FieldValue, Deliveries), StoreError> {
        let len = self.list_len(list)?;
        self.check_index(list, index, len)?;

        let (removed, before, before_tokens) = self.edit_list(list, |items, tokens| {
            tokens.remove(index);
            items.remove(index)
        })?;
        let close_gap = |i: usize| match i.cmp(&index) {
            std::cmp::Ordering::Less => Some(i),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(i - 1),
        };
        rekey(&mut self.meta, list, close_gap);
        rekey(&mut self.tokens, list, close_gap);

        trace!(%list, index, "list item removed");
        Ok((removed, self.value_deliveries(&before, &before_tokens)))
    }

    fn move_item(
        &mut self,
        list: &FieldPath,
        from: usize,
        to: usize,
    ) -> Result<Deliveries, StoreError> {
        let len = self.list_len(list)?;
        self.check_index(list, from, len)?;
        self.check_index(list, to, len)?;
        if from == to {
            return Ok(Deliveries::default());
        }

        let ((), before, before_tokens) = self.edit_list(list, |items, tokens| {
            let item = items.remove(from);
            items.insert(to, item);
            let token = tokens.remove(from);
            tokens.insert(to, token);
        })?;
        let relocate = |i: usize| {
            Some(if i == from {
                to
            } else if from < to && i > from && i <= to {
                i - 1
            } else if to < from && i >= to && i < from {
                i + 1
            } else {
                i
            })
        };
        rekey(&mut self.meta, list, relocate);
        rekey(&mut self.tokens, list, relocate);

        trace!(%list, from, to, "list item moved");
        Ok(self.value_deliveries(&before, &before_tokens))
    }

    fn swap_items(
        &mut self,
        list: &FieldPath,
        a: usize,
        b: usize,
    ) -> Result<Deliveries, StoreError> {
        let len = self.list_len(list)?;
        self.check_index(list, a, len)?;
        self.check_index(list, b, len)?;
        if a == b {
            return Ok(Deliveries::default());
        }

        let ((), before, before_tokens) = self.edit_list(list, |items, tokens| {
            items.swap(a, b);
            tokens.swap(a, b);
        })?;
        let exchange = |i: usize| {
            Some(if i == a {
                b
            } else if i == b {
                a
            } else {
                i
            })
        };
        rekey(&mut self.meta, list, exchange);
        rekey(&mut self.tokens, list, exchange);

        trace!(%list, a, b, "list items swapped");
        Ok(self.value_deliveries(&before, &before_tokens))
    }

    fn tokens(&mut self, list: &FieldPath) -> Result<Vec<ItemToken>, StoreError> {
        let len = self.list_len(list)?;
        let tokens = self.tokens.entry(list.clone()).or_default();
        tokens.resize_with(len, ItemToken::new);
        Ok(tokens.clone())
    }

    fn meta(&self, path: &FieldPath) -> FieldMeta {
        self.meta.get(path).cloned().unwrap_or_default()
    }

    fn set_dirty(&mut self, path: &FieldPath, dirty: bool) -> Deliveries {
        self.update_meta(path, |m| m.dirty = dirty)
    }

    fn set_touched(&mut self, path: &FieldPath, touched: bool) -> Deliveries {
        self.update_meta(path, |m| m.touched = touched)
    }

    fn set_error(&mut self, path: &FieldPath, error: Option<String>) -> Deliveries {
        self.update_meta(path, |m| m.error = error)
    }

    fn any_dirty(&self, path: &FieldPath) -> bool {
        self.descendants(path).any(|(_, m)| m.dirty)
    }

    fn any_touched(&self, path: &FieldPath) -> bool {
        self.descendants(path).any(|(_, m)| m.touched)
    }

    fn first_error(&self, path: &FieldPath) -> Option<(FieldPath, String)> {
        self.descendants(path)
            .find_map(|(p, m)| m.error.as_ref().map(|e| (p.clone(), e.clone())))
    }

    fn error_paths(&self) -> Vec<FieldPath> {
        self.meta
            .iter()
            .filter(|(_, m)| m.error.is_some())
            .map(|(p, _)| p.clone())
            .collect()
    }

    fn reset(&mut self, values: FieldValue) -> Deliveries {
        let before = mem::replace(&mut self.values, values);
        let before_tokens = mem::take(&mut self.tokens);
        let cleared: Vec<FieldPath> = mem::take(&mut self.meta).into_keys().collect();

        trace!(cleared = cleared.len(), "store reset");
        let mut out = self.value_deliveries(&before, &before_tokens);
        if !cleared.is_empty() {
            out.extend(self.meta_deliveries(&cleared));
        }
        out
    }
}
