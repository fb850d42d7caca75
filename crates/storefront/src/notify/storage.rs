//! Cross-tab storage notifications.
//!
//! Each tab owns one [`CrossTabNotifier`] fed by the profile's per-tab inbox.
//! Handlers subscribe by storage key and receive the new raw value (or `None`
//! when the key was removed). Events reach handlers only when the tab drains
//! its inbox, which models the browser delivering `storage` events on the
//! tab's own event loop rather than inside another tab's write.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tokio::sync::{Mutex, mpsc};

use super::signals::Subscription;
use crate::store::StorageEvent;

type StorageHandler = Rc<dyn Fn(Option<&str>)>;

/// Per-tab, per-key subscription point for changes made by other tabs.
///
/// Cheaply cloneable; clones share the inbox and subscribers.
#[derive(Clone)]
pub struct CrossTabNotifier {
    inner: Rc<NotifierInner>,
}

struct NotifierInner {
    inbox: Mutex<mpsc::UnboundedReceiver<StorageEvent>>,
    handlers: RefCell<HashMap<String, Vec<(u64, StorageHandler)>>>,
    next_id: Cell<u64>,
}

impl fmt::Debug for CrossTabNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.inner.handlers.borrow();
        f.debug_struct("CrossTabNotifier")
            .field("keys", &handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl CrossTabNotifier {
    /// Create a notifier draining `inbox`.
    #[must_use]
    pub fn new(inbox: mpsc::UnboundedReceiver<StorageEvent>) -> Self {
        Self {
            inner: Rc::new(NotifierInner {
                inbox: Mutex::new(inbox),
                handlers: RefCell::new(HashMap::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Call `handler` with the new raw value whenever another tab changes `key`.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(
        &self,
        key: impl Into<String>,
        handler: impl Fn(Option<&str>) + 'static,
    ) -> Subscription {
        let key = key.into();
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .handlers
            .borrow_mut()
            .entry(key.clone())
            .or_default()
            .push((id, Rc::new(handler)));

        let notifier: Weak<NotifierInner> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            let Some(notifier) = notifier.upgrade() else {
                return;
            };
            let mut handlers = notifier.handlers.borrow_mut();
            if let Some(list) = handlers.get_mut(&key) {
                list.retain(|(handler_id, _)| *handler_id != id);
            }
        })
    }

    /// Deliver one event to the handlers subscribed to its key.
    pub fn dispatch(&self, event: &StorageEvent) {
        let handlers: Vec<StorageHandler> = self
            .inner
            .handlers
            .borrow()
            .get(&event.key)
            .map(|handlers| handlers.iter().map(|(_, h)| Rc::clone(h)).collect())
            .unwrap_or_default();

        tracing::debug!(
            key = %event.key,
            source = %event.source,
            removed = event.new_value.is_none(),
            subscribers = handlers.len(),
            "Dispatching storage event"
        );
        for handler in handlers {
            handler(event.new_value.as_deref());
        }
    }

    /// Deliver every event already waiting in the inbox.
    ///
    /// Returns the number of events delivered. Returns 0 without draining if
    /// an async [`Self::dispatch_next`] currently holds the inbox.
    pub fn dispatch_pending(&self) -> usize {
        let events: Vec<StorageEvent> = match self.inner.inbox.try_lock() {
            Ok(mut inbox) => std::iter::from_fn(|| inbox.try_recv().ok()).collect(),
            Err(_) => return 0,
        };

        for event in &events {
            self.dispatch(event);
        }
        events.len()
    }

    /// Wait for the next event and deliver it.
    ///
    /// Returns `false` once the profile has gone away and no more events can
    /// arrive.
    pub async fn dispatch_next(&self) -> bool {
        let event = {
            let mut inbox = self.inner.inbox.lock().await;
            inbox.recv().await
        };

        match event {
            Some(event) => {
                self.dispatch(&event);
                true
            }
            None => false,
        }
    }

    /// Number of handlers subscribed to `key`.
    #[must_use]
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner.handlers.borrow().get(key).map_or(0, Vec::len)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::store::{BrowserProfile, PersistedStore};

    fn recorder() -> (Rc<RefCell<Vec<Option<String>>>>, impl Fn(Option<&str>)) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |value: Option<&str>| {
            sink.borrow_mut().push(value.map(str::to_owned));
        })
    }

    #[test]
    fn test_pending_events_reach_key_subscribers() {
        let profile = BrowserProfile::in_memory(&StorageConfig::default());
        let (a_store, _a_inbox) = profile.open_tab().into_parts();
        let (_b_store, b_inbox) = profile.open_tab().into_parts();
        let notifier = CrossTabNotifier::new(b_inbox);

        let (cart_seen, handler) = recorder();
        let _cart = notifier.subscribe("cart", handler);
        let (session_seen, handler) = recorder();
        let _session = notifier.subscribe("session", handler);

        a_store.write("cart", "[1]").unwrap();
        a_store.write("cart", "[2]").unwrap();
        a_store.remove("cart").unwrap();

        // Nothing is delivered until the tab drains its inbox.
        assert!(cart_seen.borrow().is_empty());

        assert_eq!(notifier.dispatch_pending(), 3);
        assert_eq!(
            *cart_seen.borrow(),
            [Some("[1]".to_string()), Some("[2]".to_string()), None]
        );
        assert!(session_seen.borrow().is_empty());
    }

    #[test]
    fn test_unsubscribe_on_drop() {
        let profile = BrowserProfile::in_memory(&StorageConfig::default());
        let (a_store, _a_inbox) = profile.open_tab().into_parts();
        let (_b_store, b_inbox) = profile.open_tab().into_parts();
        let notifier = CrossTabNotifier::new(b_inbox);

        let (seen, handler) = recorder();
        let sub = notifier.subscribe("cart", handler);
        drop(sub);
        assert_eq!(notifier.subscriber_count("cart"), 0);

        a_store.write("cart", "[]").unwrap();
        notifier.dispatch_pending();
        assert!(seen.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_next_waits_for_event() {
        let profile = BrowserProfile::in_memory(&StorageConfig::default());
        let (a_store, _a_inbox) = profile.open_tab().into_parts();
        let (_b_store, b_inbox) = profile.open_tab().into_parts();
        let notifier = CrossTabNotifier::new(b_inbox);

        let (seen, handler) = recorder();
        let _sub = notifier.subscribe("cart", handler);

        a_store.write("cart", "[9]").unwrap();
        assert!(notifier.dispatch_next().await);
        assert_eq!(*seen.borrow(), [Some("[9]".to_string())]);
    }

    #[tokio::test]
    async fn test_dispatch_next_ends_when_profile_dropped() {
        let profile = BrowserProfile::in_memory(&StorageConfig::default());
        let (store, inbox) = profile.open_tab().into_parts();
        let notifier = CrossTabNotifier::new(inbox);

        drop(store);
        drop(profile);
        assert!(!notifier.dispatch_next().await);
    }
}
