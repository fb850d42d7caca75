//! In-tab change signals.
//!
//! A payload-free broadcast used to tell same-tab observers "state changed,
//! recompute derived views". Publishing is synchronous: every handler has run
//! by the time [`SignalBus::publish`] returns.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Things that can change within a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// The cart's lines or quantities changed.
    CartChanged,
    /// The current user may have changed.
    SessionChanged,
}

type SignalHandler = Rc<dyn Fn()>;

/// Same-tab publish/subscribe bus.
///
/// Cheaply cloneable; clones share subscribers.
#[derive(Clone, Default)]
pub struct SignalBus {
    inner: Rc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    handlers: RefCell<HashMap<Topic, Vec<(u64, SignalHandler)>>>,
    next_id: Cell<u64>,
}

impl fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.inner.handlers.borrow();
        f.debug_struct("SignalBus")
            .field(
                "subscribers",
                &handlers.iter().map(|(t, h)| (*t, h.len())).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl SignalBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`.
    ///
    /// The handler stays registered until the returned [`Subscription`] is
    /// dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn on(&self, topic: Topic, handler: impl Fn() + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .handlers
            .borrow_mut()
            .entry(topic)
            .or_default()
            .push((id, Rc::new(handler)));

        let bus: Weak<BusInner> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            let Some(bus) = bus.upgrade() else {
                return;
            };
            let mut handlers = bus.handlers.borrow_mut();
            if let Some(list) = handlers.get_mut(&topic) {
                list.retain(|(handler_id, _)| *handler_id != id);
            }
        })
    }

    /// Run every handler registered for `topic`.
    ///
    /// Handlers may publish or subscribe themselves; subscriptions made while
    /// publishing take effect from the next publish.
    pub fn publish(&self, topic: Topic) {
        let handlers: Vec<SignalHandler> = self
            .inner
            .handlers
            .borrow()
            .get(&topic)
            .map(|handlers| handlers.iter().map(|(_, h)| Rc::clone(h)).collect())
            .unwrap_or_default();

        tracing::trace!(?topic, subscribers = handlers.len(), "Publishing signal");
        for handler in handlers {
            handler();
        }
    }

    /// Number of handlers registered for `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner
            .handlers
            .borrow()
            .get(&topic)
            .map_or(0, Vec::len)
    }
}

/// Guard that keeps a handler registered.
///
/// Dropping it unregisters the handler.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
