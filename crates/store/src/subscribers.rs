use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use formstate_core::{FieldPath, FieldValue, ItemToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// What a subscriber is watching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionTarget {
    /// A path and everything below it.
    Path(FieldPath),
    /// One list element, followed by identity rather than by index.
    Item { list: FieldPath, token: ItemToken },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// The value at (or below) the watched path changed.
    Value,
    /// Dirty/touched/error metadata at (or below) the watched path changed.
    Meta,
    /// The watched list element changed position; its value did not change.
    Moved { from: usize, to: usize },
    /// The watched list element no longer exists.
    Removed,
}

#[derive(Debug, Clone)]
pub struct Notification {
    /// Current location of the watched value.
    pub path: FieldPath,
    pub kind: ChangeKind,
    pub value: Option<FieldValue>,
}

pub(crate) type Callback = Rc<dyn Fn(&Notification)>;

pub(crate) struct Subscriber {
    pub(crate) target: SubscriptionTarget,
    callback: Callback,
    active: Rc<Cell<bool>>,
}

/// Registry of subscribers for one store.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    entries: BTreeMap<SubscriptionId, Subscriber>,
}

impl Subscribers {
    pub(crate) fn add(&mut self, target: SubscriptionTarget, callback: Callback) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.entries.insert(
            id,
            Subscriber {
                target,
                callback,
                active: Rc::new(Cell::new(true)),
            },
        );
        id
    }

    /// Returns whether the subscription was still registered.
    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        match self.entries.remove(&id) {
            Some(sub) => {
                sub.active.set(false);
                true
            }
            None => false,
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Subscriber> {
        self.entries.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Subscriber {
    pub(crate) fn deliver(&self, notification: Notification) -> Delivery {
        Delivery {
            callback: self.callback.clone(),
            active: self.active.clone(),
            notification,
        }
    }
}

pub(crate) struct Delivery {
    callback: Callback,
    active: Rc<Cell<bool>>,
    notification: Notification,
}

/// Pending notifications produced by one store mutation.
///
/// Callbacks are only invoked by [`Deliveries::deliver`], so a caller holding
/// the store behind a `RefCell` can release its borrow first and let
/// subscribers read or mutate the store again. A subscription removed while a
/// batch is being delivered is skipped for the rest of the batch.
#[must_use = "notifications are only sent by `deliver`"]
#[derive(Default)]
pub struct Deliveries(Vec<Delivery>);

impl Deliveries {
    pub(crate) fn push(&mut self, delivery: Delivery) {
        self.0.push(delivery);
    }

    pub fn extend(&mut self, other: Deliveries) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn deliver(self) {
        for delivery in self.0 {
            if delivery.active.get() {
                (delivery.callback)(&delivery.notification);
            }
        }
    }
}

impl fmt::Debug for Deliveries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|d| &d.notification))
            .finish()
    }
}
