use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use formstate_core::FieldValue;
use formstate_engine::{Transport, TransportError};
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;

#[derive(Debug)]
struct Rejected(String);

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Rejected {}

#[derive(Default)]
struct Recording {
    payloads: Vec<FieldValue>,
    failure: Option<String>,
    hold: bool,
    held: Vec<oneshot::Sender<()>>,
}

/// Transport that records every payload. It can be told to reject
/// submissions or to hold them until released. Clones share one recording.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    inner: Rc<RefCell<Recording>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every later submission with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        self.inner.borrow_mut().failure = Some(message.into());
    }

    /// Keep later submissions pending until [`RecordingTransport::release`].
    pub fn hold(&self) {
        self.inner.borrow_mut().hold = true;
    }

    /// Let every held submission finish and stop holding new ones.
    pub fn release(&self) {
        let held = {
            let mut inner = self.inner.borrow_mut();
            inner.hold = false;
            std::mem::take(&mut inner.held)
        };
        for tx in held {
            let _ = tx.send(());
        }
    }

    pub fn calls(&self) -> usize {
        self.inner.borrow().payloads.len()
    }

    pub fn payloads(&self) -> Vec<FieldValue> {
        self.inner.borrow().payloads.clone()
    }
}

impl<O> Transport<O> for RecordingTransport {
    fn submit(&self, values: FieldValue, _output: O) -> LocalBoxFuture<'static, Result<(), TransportError>> {
        let gate = {
            let mut inner = self.inner.borrow_mut();
            inner.payloads.push(values);
            if inner.hold {
                let (tx, rx) = oneshot::channel();
                inner.held.push(tx);
                Some(rx)
            } else {
                None
            }
        };
        let recording = Rc::clone(&self.inner);
        async move {
            if let Some(rx) = gate {
                let _ = rx.await;
            }
            let failure = recording.borrow().failure.clone();
            match failure {
                Some(message) => Err(Box::new(Rejected(message)) as TransportError),
                None => Ok(()),
            }
        }
        .boxed_local()
    }
}
